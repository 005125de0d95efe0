//! Application layer: port trait definitions and use-case orchestration.
//!
//! This module depends only on `crate::domain`, never on `crate::infra`,
//! `crate::commands`, or `crate::output`.

pub mod ports;
pub mod services;

pub use ports::{
    GuestAuthManager, GuestFileManager, GuestInfo, GuestProcessManager, HypervisorConnector,
    HypervisorSession, InventorySearch, SessionControl, TransferClient,
};
pub use services::connection::GuestConnection;
