use chrono::{DateTime, Local};
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use serde::{Deserialize, Serialize};
use statum::{machine, state};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Physical control on the pad that produces discrete edges.
///
/// Analog triggers appear here as well: their samples are digitized by the engine
/// and then travel the same path as real buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputElement {
    ButtonA,
    ButtonB,
    ButtonX,
    ButtonY,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    LeftShoulder,
    RightShoulder,
    LeftTrigger,
    RightTrigger,
    LeftThumbstickButton,
    RightThumbstickButton,
    ButtonMenu,
    ButtonOptions,
}

impl InputElement {
    pub const ALL: [InputElement; 16] = [
        InputElement::ButtonA,
        InputElement::ButtonB,
        InputElement::ButtonX,
        InputElement::ButtonY,
        InputElement::DpadUp,
        InputElement::DpadDown,
        InputElement::DpadLeft,
        InputElement::DpadRight,
        InputElement::LeftShoulder,
        InputElement::RightShoulder,
        InputElement::LeftTrigger,
        InputElement::RightTrigger,
        InputElement::LeftThumbstickButton,
        InputElement::RightThumbstickButton,
        InputElement::ButtonMenu,
        InputElement::ButtonOptions,
    ];

    /// Configuration name of the element
    pub fn name(self) -> &'static str {
        match self {
            InputElement::ButtonA => "button_a",
            InputElement::ButtonB => "button_b",
            InputElement::ButtonX => "button_x",
            InputElement::ButtonY => "button_y",
            InputElement::DpadUp => "dpad_up",
            InputElement::DpadDown => "dpad_down",
            InputElement::DpadLeft => "dpad_left",
            InputElement::DpadRight => "dpad_right",
            InputElement::LeftShoulder => "left_shoulder",
            InputElement::RightShoulder => "right_shoulder",
            InputElement::LeftTrigger => "left_trigger",
            InputElement::RightTrigger => "right_trigger",
            InputElement::LeftThumbstickButton => "left_thumbstick_button",
            InputElement::RightThumbstickButton => "right_thumbstick_button",
            InputElement::ButtonMenu => "button_menu",
            InputElement::ButtonOptions => "button_options",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|element| element.name() == name)
    }
}

impl fmt::Display for InputElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Stick identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StickId {
    Left,
    Right,
}

// Trigger identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerId {
    Left,
    Right,
}

impl TriggerId {
    /// Element that receives the digitized edges of this trigger
    pub fn element(self) -> InputElement {
        match self {
            TriggerId::Left => InputElement::LeftTrigger,
            TriggerId::Right => InputElement::RightTrigger,
        }
    }
}

/// Event delivered by the controller source to the mapping engine.
///
/// Stick and trigger values are raw: deadzones and hysteresis are applied by the
/// engine with its own configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Button {
        element: InputElement,
        pressed: bool,
        at: Instant,
    },
    Stick {
        stick: StickId,
        x: f32,
        y: f32,
        at: Instant,
    },
    Trigger {
        trigger: TriggerId,
        value: f32,
        at: Instant,
    },
    Connected {
        name: String,
    },
    Disconnected,
}

// Collector settings
#[derive(Clone, Debug)]
pub struct CollectorSettings {
    /// Rate at which stick and trigger values are sampled
    pub poll_rate_hz: u32,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self { poll_rate_hz: 60 }
    }
}

impl CollectorSettings {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.poll_rate_hz.max(1)))
    }
}

// Collector errors
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to initialize collector: {0}")]
    InitializationError(String),

    #[error("Failed to send event: {0}")]
    EventSendError(String),

    #[error("Failed to spawn collector thread: {0}")]
    ThreadError(String),
}

#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

#[machine]
pub struct EventCollector<S: CollectionState> {
    // Gilrs context
    gilrs: Gilrs,

    // Active gamepad
    active_gamepad: Option<GamepadId>,

    settings: CollectorSettings,

    // Channel towards the mapping engine
    event_sender: mpsc::Sender<SourceEvent>,

    // Set by the handle to end the loop
    shutdown: Arc<AtomicBool>,
}

impl<S: CollectionState> EventCollector<S> {
    fn send(&self, event: SourceEvent) -> Result<(), CollectorError> {
        self.event_sender.blocking_send(event).map_err(|e| {
            error!("Failed to send event to mapping engine: {}", e);
            CollectorError::EventSendError(e.to_string())
        })
    }
}

impl EventCollector<Initializing> {
    pub fn create(
        settings: Option<CollectorSettings>,
        event_sender: mpsc::Sender<SourceEvent>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self, CollectorError> {
        let settings = settings.unwrap_or_default();
        debug!("Creating Event Collector with settings: {:?}", settings);

        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(CollectorError::InitializationError(e.to_string()));
            }
        };

        Ok(Self::new(gilrs, None, settings, event_sender, shutdown))
    }

    /// Picks the first connected gamepad and transitions to Collecting
    pub fn initialize(mut self) -> Result<EventCollector<Collecting>, CollectorError> {
        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();

        if gamepads.is_empty() {
            warn!("No gamepad connected, waiting for one to appear");
        } else {
            info!("Found {} gamepads:", gamepads.len());
            for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
                info!("  [{}] ID: {}, Name: {}", idx, id, gamepad.name());
            }
            let (id, gamepad) = &gamepads[0];
            let name = gamepad.name().to_string();
            let id = *id;
            info!("Selected gamepad: {} ({})", name, id);
            self.active_gamepad = Some(id);
            self.send(SourceEvent::Connected { name })?;
        }

        info!("Event Collector initialized, transitioning to Collecting state");
        Ok(self.transition())
    }
}

impl EventCollector<Collecting> {
    /// Drains the gilrs queue, forwarding button edges and connection changes
    pub fn collect_pending_events(&mut self) -> Result<usize, CollectorError> {
        let mut forwarded = 0;

        while let Some(Event { id, event, time, .. }) = self.gilrs.next_event() {
            debug!("Processing gilrs event: {:?} at time: {:?}", event, time);

            match event {
                EventType::Connected => {
                    if self.active_gamepad.is_none() {
                        let name = self.gilrs.gamepad(id).name().to_string();
                        info!("Controller connected: {} ({})", name, id);
                        self.active_gamepad = Some(id);
                        self.send(SourceEvent::Connected { name })?;
                        forwarded += 1;
                    }
                    continue;
                }
                EventType::Disconnected => {
                    if self.active_gamepad == Some(id) {
                        warn!("Active controller disconnected: {}", id);
                        self.active_gamepad = None;
                        self.send(SourceEvent::Disconnected)?;
                        forwarded += 1;
                    }
                    continue;
                }
                _ => {}
            }

            if self.active_gamepad != Some(id) {
                debug!("Skipping event from non-active gamepad: {:?}", id);
                continue;
            }

            if let Some(raw_event) = convert_gilrs_event(event, Local::now()) {
                self.send(raw_event)?;
                forwarded += 1;
            }
        }

        Ok(forwarded)
    }

    /// Samples both sticks and both analog triggers of the active gamepad
    pub fn sample_axes(&mut self) -> Result<(), CollectorError> {
        let Some(id) = self.active_gamepad else {
            return Ok(());
        };

        let at = Instant::now();
        let gamepad = self.gilrs.gamepad(id);
        let trigger_value = |button: Button| {
            gamepad
                .button_data(button)
                .map(|data| data.value())
                .unwrap_or(0.0)
        };

        let samples = [
            SourceEvent::Stick {
                stick: StickId::Left,
                x: gamepad.value(Axis::LeftStickX),
                y: gamepad.value(Axis::LeftStickY),
                at,
            },
            SourceEvent::Stick {
                stick: StickId::Right,
                x: gamepad.value(Axis::RightStickX),
                y: gamepad.value(Axis::RightStickY),
                at,
            },
            SourceEvent::Trigger {
                trigger: TriggerId::Left,
                value: trigger_value(Button::LeftTrigger2),
                at,
            },
            SourceEvent::Trigger {
                trigger: TriggerId::Right,
                value: trigger_value(Button::RightTrigger2),
                at,
            },
        ];

        for sample in samples {
            self.send(sample)?;
        }
        Ok(())
    }

    /// Runs until the shutdown flag is set or the engine side hangs up
    pub fn run_collection_loop(&mut self) -> Result<(), CollectorError> {
        info!("Starting Event Collector loop");

        let sample_interval = self.settings.sample_interval();
        let mut next_sample = Instant::now();

        let mut event_count = 0usize;
        let mut last_log_time: DateTime<Local> = Local::now();
        let log_interval = chrono::Duration::seconds(10);

        while !self.shutdown.load(Ordering::Relaxed) {
            event_count += self.collect_pending_events()?;

            let now = Instant::now();
            if now >= next_sample {
                self.sample_axes()?;
                next_sample += sample_interval;
                if next_sample < now {
                    next_sample = now + sample_interval;
                }
            }

            let wall_clock = Local::now();
            if wall_clock - last_log_time > log_interval {
                info!(
                    "Event Collector stats: forwarded {} button events in last {} seconds",
                    event_count,
                    log_interval.num_seconds()
                );
                event_count = 0;
                last_log_time = wall_clock;
            }

            // Small sleep to prevent 100% CPU usage
            std::thread::sleep(Duration::from_micros(500));
        }

        info!("Event Collector loop stopped");
        Ok(())
    }
}

// Converts a gilrs event into a button edge, if it is one we care about
fn convert_gilrs_event(event: EventType, now: DateTime<Local>) -> Option<SourceEvent> {
    let (button, pressed) = match event {
        EventType::ButtonPressed(button, _) => (button, true),
        EventType::ButtonReleased(button, _) => (button, false),
        EventType::ButtonRepeated(button, _) => {
            debug!("Button repeat ignored: {:?}", button);
            return None;
        }
        _ => return None,
    };

    let element = map_button(button)?;
    info!(
        "Button {}: {} at {}",
        if pressed { "pressed" } else { "released" },
        element,
        now.format("%H:%M:%S.%3f")
    );
    Some(SourceEvent::Button {
        element,
        pressed,
        at: Instant::now(),
    })
}

// Helper function to map gilrs Button to our InputElement.
// Analog triggers are sampled separately and never reported as edges here.
fn map_button(button: Button) -> Option<InputElement> {
    match button {
        Button::South => Some(InputElement::ButtonA),
        Button::East => Some(InputElement::ButtonB),
        Button::West => Some(InputElement::ButtonX),
        Button::North => Some(InputElement::ButtonY),
        Button::Start => Some(InputElement::ButtonMenu),
        Button::Select => Some(InputElement::ButtonOptions),
        Button::LeftTrigger => Some(InputElement::LeftShoulder),
        Button::RightTrigger => Some(InputElement::RightShoulder),
        Button::LeftThumb => Some(InputElement::LeftThumbstickButton),
        Button::RightThumb => Some(InputElement::RightThumbstickButton),
        Button::DPadUp => Some(InputElement::DpadUp),
        Button::DPadDown => Some(InputElement::DpadDown),
        Button::DPadLeft => Some(InputElement::DpadLeft),
        Button::DPadRight => Some(InputElement::DpadRight),
        _ => None,
    }
}

/// Owns the collector thread
pub struct CollectorHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CollectorHandle {
    /// Creates the collector and moves it onto a dedicated OS thread.
    ///
    /// gilrs polling is blocking, so it stays off the tokio worker threads.
    pub fn spawn(
        settings: Option<CollectorSettings>,
        event_sender: mpsc::Sender<SourceEvent>,
    ) -> Result<Self, CollectorError> {
        info!("Spawning Event Collector with settings: {:?}", settings);

        let shutdown = Arc::new(AtomicBool::new(false));
        let collector = EventCollector::create(settings, event_sender, shutdown.clone())?;

        let thread = std::thread::Builder::new()
            .name("padmapper-collector".to_string())
            .spawn(move || match collector.initialize() {
                Ok(mut collecting) => {
                    if let Err(e) = collecting.run_collection_loop() {
                        error!("Collector thread terminated with error: {}", e);
                    }
                }
                Err(e) => error!("Failed to initialize Event Collector: {}", e),
            })
            .map_err(|e| CollectorError::ThreadError(e.to_string()))?;

        info!("Event Collector successfully started");
        Ok(Self {
            shutdown,
            thread: Some(thread),
        })
    }

    /// Signals the thread to stop and waits for it
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Collector thread panicked");
            }
        }
    }
}

impl Drop for CollectorHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_names_round_trip() {
        for element in InputElement::ALL {
            assert_eq!(InputElement::from_name(element.name()), Some(element));
        }
        assert_eq!(InputElement::from_name("turbo_button"), None);
    }

    #[test]
    fn bumpers_map_to_shoulders() {
        assert_eq!(map_button(Button::LeftTrigger), Some(InputElement::LeftShoulder));
        assert_eq!(map_button(Button::RightTrigger), Some(InputElement::RightShoulder));
        assert_eq!(map_button(Button::LeftTrigger2), None);
        assert_eq!(map_button(Button::Mode), None);
    }

    #[test]
    fn sample_interval_follows_poll_rate() {
        let settings = CollectorSettings { poll_rate_hz: 50 };
        assert_eq!(settings.sample_interval(), Duration::from_millis(20));
    }
}
