//! Lifecycle event identities and instances.
//!
//! # Data Flow
//! ```text
//! Descriptor (closed set, one per lifecycle moment)
//!     → HookKey { descriptor, phase }   (registry key: before / primary / after)
//!     → runtime fires descriptor.name() with a raw Payload
//!     → Event::from_raw(descriptor, payload)   (fresh per firing)
//!     → passed by reference through before → primary → after
//! ```
//!
//! # Design Decisions
//! - Descriptors are an enum; no dynamic event creation
//! - Phases are an explicit field, never a string suffix
//! - Before/after keys exist only in the registry, never in the runtime

pub mod descriptor;
pub mod event;

pub use descriptor::{Descriptor, HookKey, Phase};
pub use event::{Event, Payload, WorkerInfo};
