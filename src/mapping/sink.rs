//! Output side of the engine: synthetic-event sink, observer events, clipboard probe
//!
//! The engine never talks to the platform directly. It returns [`EngineOutput`]
//! values; the runtime dispatches [`SinkCommand`]s into an [`EventSink`] and forwards
//! [`ObserverEvent`]s to whoever renders feedback.

use crate::mapping::keyboard::{chord_label, keystrokes_for_text, Key, Modifier};
use crate::mapping::mapping_types::{Action, InputElement, MouseButton};
use std::fmt;
use tokio::runtime::RuntimeFlavor;
use tracing::{debug, info};

/// Receiver of synthetic input events. Calls are fire-and-forget.
pub trait EventSink {
    fn post_keystroke(&mut self, key: Key, modifiers: &[Modifier]);
    fn hold_modifier(&mut self, modifier: Modifier);
    fn release_modifier(&mut self, modifier: Modifier);
    fn type_text(&mut self, text: &str);
    fn post_mouse_click(&mut self, button: MouseButton);
    fn post_scroll(&mut self, dx: i32, dy: i32);
    fn post_cursor_move(&mut self, dx: f32, dy: f32);
}

/// A single call into an [`EventSink`]
#[derive(Clone, Debug, PartialEq)]
pub enum SinkCommand {
    Keystroke { key: Key, modifiers: Vec<Modifier> },
    HoldModifier(Modifier),
    ReleaseModifier(Modifier),
    TypeText(String),
    MouseClick(MouseButton),
    Scroll { dx: i32, dy: i32 },
    CursorMove { dx: f32, dy: f32 },
}

impl SinkCommand {
    pub fn keystroke(key: Key, modifiers: &[Modifier]) -> Self {
        SinkCommand::Keystroke {
            key,
            modifiers: modifiers.to_vec(),
        }
    }

    pub fn dispatch(&self, sink: &mut dyn EventSink) {
        match self {
            SinkCommand::Keystroke { key, modifiers } => sink.post_keystroke(*key, modifiers),
            SinkCommand::HoldModifier(modifier) => sink.hold_modifier(*modifier),
            SinkCommand::ReleaseModifier(modifier) => sink.release_modifier(*modifier),
            SinkCommand::TypeText(text) => sink.type_text(text),
            SinkCommand::MouseClick(button) => sink.post_mouse_click(*button),
            SinkCommand::Scroll { dx, dy } => sink.post_scroll(*dx, *dy),
            SinkCommand::CursorMove { dx, dy } => sink.post_cursor_move(*dx, *dy),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = match self {
            ScrollDirection::Up => "↑",
            ScrollDirection::Down => "↓",
            ScrollDirection::Left => "←",
            ScrollDirection::Right => "→",
        };
        f.write_str(arrow)
    }
}

/// Feedback for a HUD or log
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObserverEvent {
    /// An action fired; `element` is None for stick gestures
    Fired {
        element: Option<InputElement>,
        action: Action,
        description: Option<String>,
    },
    ScrollDirection(ScrollDirection),
    CursorActive,
    /// The modifier layer has no binding for this element
    NotCustomizable { element: InputElement },
}

impl ObserverEvent {
    /// Short text for a heads-up display
    pub fn label(&self) -> String {
        match self {
            ObserverEvent::Fired {
                description: Some(description),
                ..
            } => description.clone(),
            ObserverEvent::Fired { action, .. } => action.to_string(),
            ObserverEvent::ScrollDirection(direction) => format!("Scroll {}", direction),
            ObserverEvent::CursorActive => "Mouse Cursor".to_string(),
            ObserverEvent::NotCustomizable { .. } => "Customizable, coming soon".to_string(),
        }
    }
}

/// One result of an engine handler
#[derive(Clone, Debug, PartialEq)]
pub enum EngineOutput {
    Sink(SinkCommand),
    Notify(ObserverEvent),
}

impl EngineOutput {
    pub fn as_command(&self) -> Option<&SinkCommand> {
        match self {
            EngineOutput::Sink(command) => Some(command),
            EngineOutput::Notify(_) => None,
        }
    }

    pub fn as_event(&self) -> Option<&ObserverEvent> {
        match self {
            EngineOutput::Sink(_) => None,
            EngineOutput::Notify(event) => Some(event),
        }
    }
}

/// Sink that only logs; the default when no platform injector is available
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn post_keystroke(&mut self, key: Key, modifiers: &[Modifier]) {
        info!(
            "Keystroke {} (0x{:02x})",
            chord_label(key, modifiers),
            key.code()
        );
    }

    fn hold_modifier(&mut self, modifier: Modifier) {
        info!("Hold {} (0x{:02x})", modifier, modifier.code());
    }

    fn release_modifier(&mut self, modifier: Modifier) {
        info!("Release {} (0x{:02x})", modifier, modifier.code());
    }

    fn type_text(&mut self, text: &str) {
        let keys: Vec<&str> = keystrokes_for_text(text).iter().map(|k| k.name()).collect();
        info!("Type {:?}", text);
        debug!("Typed as keys: {}", keys.join(" "));
    }

    fn post_mouse_click(&mut self, button: MouseButton) {
        info!("Mouse {} click", button);
    }

    fn post_scroll(&mut self, dx: i32, dy: i32) {
        debug!("Scroll dx={} dy={}", dx, dy);
    }

    fn post_cursor_move(&mut self, dx: f32, dy: f32) {
        debug!("Cursor move dx={:.2} dy={:.2}", dx, dy);
    }
}

/// Sink that keeps every command, for tests and dry runs
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub commands: Vec<SinkCommand>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&mut self) -> Vec<SinkCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl EventSink for RecordingSink {
    fn post_keystroke(&mut self, key: Key, modifiers: &[Modifier]) {
        self.commands.push(SinkCommand::keystroke(key, modifiers));
    }

    fn hold_modifier(&mut self, modifier: Modifier) {
        self.commands.push(SinkCommand::HoldModifier(modifier));
    }

    fn release_modifier(&mut self, modifier: Modifier) {
        self.commands.push(SinkCommand::ReleaseModifier(modifier));
    }

    fn type_text(&mut self, text: &str) {
        self.commands.push(SinkCommand::TypeText(text.to_string()));
    }

    fn post_mouse_click(&mut self, button: MouseButton) {
        self.commands.push(SinkCommand::MouseClick(button));
    }

    fn post_scroll(&mut self, dx: i32, dy: i32) {
        self.commands.push(SinkCommand::Scroll { dx, dy });
    }

    fn post_cursor_move(&mut self, dx: f32, dy: f32) {
        self.commands.push(SinkCommand::CursorMove { dx, dy });
    }
}

/// Answers whether the clipboard currently holds an image
pub trait ClipboardProbe {
    fn has_image(&self) -> bool;
}

/// Probe backed by the system clipboard
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl ClipboardProbe for SystemClipboard {
    fn has_image(&self) -> bool {
        off_async_worker(|| {
            // a clipboard that cannot be opened counts as holding no image
            match arboard::Clipboard::new() {
                Ok(mut clipboard) => clipboard.get_image().is_ok(),
                Err(e) => {
                    debug!("Clipboard unavailable: {}", e);
                    false
                }
            }
        })
    }
}

/// Runs blocking platform IPC without stalling a multi-thread tokio worker.
///
/// On a current-thread runtime or outside tokio the call runs inline.
fn off_async_worker<T>(call: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(call)
        }
        _ => call(),
    }
}

#[derive(Debug, Default)]
pub struct NoImageClipboard;

impl ClipboardProbe for NoImageClipboard {
    fn has_image(&self) -> bool {
        false
    }
}
