//! Controller subsystem for gamepad input
//!
//! Splits into a hardware-facing part and a pure signal part:
//!
//! 1. [`event_collector`] - gilrs polling on a dedicated thread, raw edges and samples
//! 2. [`controller_handle`] - Unified API and lifecycle management
//! 3. [`axis`] - radial deadzone and trigger hysteresis used by the mapping engine
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► Collector thread ──[SourceEvent]──► MappingEngine runtime
//!             (edges + 60 Hz samples)
//! ```
//!
//! Sticks and triggers are forwarded unfiltered; conditioning happens in the engine
//! so that it always uses the active configuration.

pub mod axis;
pub mod controller_handle;
pub mod event_collector;

pub use controller_handle::{ControllerError, ControllerHandle, ControllerSettings};
pub use event_collector::{InputElement, SourceEvent, StickId, TriggerId};
