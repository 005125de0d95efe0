//! Domain layer: protocol types, command building, and the error taxonomy.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod error;
pub mod guest;
pub mod process;
pub mod transfer;

pub use error::GuestOpsError;
pub use guest::{GuestAuthToken, GuestFamily, GuestFileAttributes, GuestHandle};
pub use process::{
    ExecOutput, GuestCommand, PollPolicy, RemoteProcessHandle, RemoteProcessSpec, TempFileRole,
};
pub use transfer::{TransferDescriptor, TransferDirection};
