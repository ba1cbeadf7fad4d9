//! Hook registry and built-in hooks.
//!
//! # Data Flow
//! ```text
//! Router::on(key, listener)
//!     → registry.rs (append to ordered sequence for key)
//!
//! Router::install_builtin(hook)
//!     → builtin.rs (static slot per descriptor)
//!
//! Firing:
//!     builtin.before → registry[before] → registry[primary]
//!         → builtin.after → registry[after]
//! ```
//!
//! # Design Decisions
//! - Registration is additive; there is no unregister
//! - Delivery order is registration order
//! - Built-in hooks run ahead of user hooks structurally, not by position
//! - Dispatch is fail-fast: the first error ends the dispatch

pub mod builtin;
pub mod process_name;
pub mod registry;

pub use builtin::{BuiltinHook, BuiltinTable};
pub use process_name::ProcessNaming;
pub use registry::{HookRegistry, Listener};
