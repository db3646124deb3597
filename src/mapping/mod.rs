//! Translation of controller input into synthetic keyboard, mouse and text events.
//!
//! The pure [`MappingEngine`] decides what to emit; [`MappingEngineHandle`] runs it in
//! a tokio task and connects it to a controller source, an [`EventSink`] and an
//! observer channel.
//!
//! - [`bindings`] - resolved (layer, element) → action table and the built-in defaults
//! - [`repeat`] - hold-to-repeat scheduling
//! - [`stick`] - arrow, scroll, cursor and app-switch emulation per stick
//! - [`sink`] - sink trait, observer events, clipboard probe
//! - [`keyboard`] - key and modifier vocabulary

pub mod bindings;
pub mod engine;
pub mod error;
pub mod keyboard;
pub mod mapping_handle;
pub mod mapping_types;
pub mod repeat;
pub mod sink;
pub mod stick;

// Re-exports for easier access
pub use bindings::{default_bindings, resolve, BindingEntry, BindingOverride, BindingTable};
pub use engine::{EngineState, MappingEngine};
pub use error::MappingError;
pub use keyboard::{Key, Modifier};
pub use mapping_handle::MappingEngineHandle;
pub use mapping_types::{Action, InputElement, Layer, MouseButton, RepeatPolicy, TriggerMode};
pub use sink::{
    ClipboardProbe, EngineOutput, EventSink, LogSink, NoImageClipboard, ObserverEvent,
    RecordingSink, SinkCommand, SystemClipboard,
};
pub use stick::{StickBehavior, StickConfig, StickLayout};
