//! Daemon: response ledger, auto-responder engine and the runner that wires
//! them to the gateway.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial module structure

pub mod engine;
pub mod ledger;
pub mod pidfile;
pub mod runner;
pub mod shutdown;

pub use engine::{AutoResponder, DropReason, Outcome};
pub use ledger::ResponseLedger;
pub use runner::{dispatch, run, RunStats};
pub use shutdown::{Shutdown, ShutdownTrigger};
