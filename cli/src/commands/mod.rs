//! Command implementations
//!
//! Each command receives the [`AppContext`](crate::app::AppContext) and an
//! already connected [`GuestConnection`](crate::application::GuestConnection).

pub mod check;
pub mod exec;
pub mod fetch;
pub mod put;
