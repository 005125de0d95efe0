//! One-time transfer descriptors.

use crate::domain::guest::GuestFileAttributes;

/// Direction of a guest file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    ToGuest,
    FromGuest,
}

/// A single-use URL issued by the hypervisor for exactly one HTTP request.
///
/// Not `Clone`: the data-plane client takes it by value, so a descriptor
/// cannot be replayed.
#[derive(Debug, PartialEq, Eq)]
pub struct TransferDescriptor {
    pub url: String,
    pub direction: TransferDirection,
    /// Guest-side path, kept for error messages.
    pub guest_path: String,
    /// Expected size in bytes (uploads only).
    pub size: Option<u64>,
    /// Overwrite an existing guest file (uploads only).
    pub overwrite: Option<bool>,
}

impl TransferDescriptor {
    #[must_use]
    pub fn from_guest(url: impl Into<String>, guest_path: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            direction: TransferDirection::FromGuest,
            guest_path: guest_path.into(),
            size: None,
            overwrite: None,
        }
    }

    #[must_use]
    pub fn to_guest(
        url: impl Into<String>,
        guest_path: impl Into<String>,
        attributes: &GuestFileAttributes,
    ) -> Self {
        Self {
            url: url.into(),
            direction: TransferDirection::ToGuest,
            guest_path: guest_path.into(),
            size: Some(attributes.size()),
            overwrite: Some(attributes.overwrite()),
        }
    }
}
