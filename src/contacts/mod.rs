//! Contact management.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial module structure

pub mod registry;

pub use registry::{ContactRegistry, RefreshOutcome};
