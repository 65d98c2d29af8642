//! away-responder library
//!
//! Auto-replies to direct messages from known contacts, at most once per
//! sender per cooldown window. Exposes modules for use by the daemon binary
//! and tests.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial library structure

pub mod config;
pub mod contacts;
pub mod daemon;
pub mod gateway;
pub mod logging;
