//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (bootstrap.rs):
//!     Bootstrap::create → register listeners → start(settings)
//!
//! Shutdown (shutdown.rs):
//!     Signal received → stop accepting → drain connections → worker_stop → shutdown
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Trigger worker reload
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown is state-based so late subscribers still see it
//! - Reload restarts workers without dropping connections

pub mod bootstrap;
pub mod shutdown;
pub mod signals;

pub use bootstrap::Bootstrap;
pub use shutdown::{Reload, Shutdown};
