//! Event router.
//!
//! # Data Flow
//! ```text
//! Setup:
//!     Router::on(key, listener)
//!         → hooks registry (append)
//!         → first registration for the descriptor?
//!               yes → Runtime::on(descriptor.name(), callback)   (exactly once)
//!
//! Firing (runtime invokes callback in some worker):
//!     raw Payload
//!         → Event::from_raw
//!         → builtin.before → user before → primary → builtin.after → user after
//!         → first error ends the firing and goes back to the runtime
//!
//! Start:
//!     bind pending descriptors → ready listeners → merge settings
//!         → Runtime::set → Runtime::start (blocks)
//! ```
//!
//! # Design Decisions
//! - Binding is lazy: descriptors nobody listens to never reach the runtime
//! - Listener tables are swapped atomically; a firing works on a snapshot
//! - Registration is expected to finish before `start`; late registrations
//!   are visible from the next firing on

mod pipeline;
#[allow(clippy::module_inception)]
mod router;

pub use router::Router;
