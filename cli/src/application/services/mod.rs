//! Application services: use-case orchestration.
//!
//! Each service module implements a single component by composing domain
//! logic with port trait calls. Services import only from `crate::domain`
//! and `crate::application::ports`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

pub mod connection;
pub mod credentials;
pub mod locator;
pub mod runner;
pub mod session;
pub mod transfer;

use crate::domain::{GuestAuthToken, GuestHandle};

/// The resolved guest plus the validated credentials every guest operation needs.
pub struct GuestTarget<'a, S> {
    pub api: &'a S,
    pub vm: &'a GuestHandle,
    pub auth: &'a GuestAuthToken,
}

impl<S> Clone for GuestTarget<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for GuestTarget<'_, S> {}
