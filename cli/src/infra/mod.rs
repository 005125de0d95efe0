//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: the vSphere REST adapter,
//! the HTTP transfer client, TLS client construction, and the host-vars
//! sources.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod hosts;
pub mod tls;
pub mod transfer;
pub mod vsphere;
