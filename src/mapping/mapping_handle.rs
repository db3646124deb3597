//! Async runtime around the mapping engine
//!
//! The synchronous [`MappingEngine`] is owned by a single tokio task, which
//! serializes everything that can touch it: controller events, the repeat timer and
//! the shutdown signal. The task follows a statum lifecycle so that only a configured
//! runtime can be activated and only an active one can run.
//!
//! # State Machine
//!
//! ```text
//! Initializing ──► Configured ──► Active ──► Deactivated
//!                                   │             ▲
//!                                   └─ shutdown ──┘
//! ```

use crate::controller::event_collector::SourceEvent;
use crate::mapping::engine::MappingEngine;
use crate::mapping::error::MappingError;
use crate::mapping::mapping_types::Layer;
use crate::mapping::sink::{EngineOutput, EventSink, ObserverEvent};
use statum::{machine, state};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Period of the button repeat timer (50 Hz)
pub const REPEAT_TICK: Duration = Duration::from_millis(20);

#[state]
#[derive(Debug, Clone)]
pub enum RuntimeState {
    Initializing,
    Configured,
    Active,
    Deactivated,
}

#[machine]
pub struct EngineRuntime<S: RuntimeState> {
    name: String,
    source: mpsc::Receiver<SourceEvent>,
    sink: Box<dyn EventSink + Send>,
    observer: Option<mpsc::Sender<ObserverEvent>>,
    engine: Option<MappingEngine>,
}

impl<S: RuntimeState> EngineRuntime<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sends commands to the sink and events to the observer, in order
    fn dispatch(&mut self, outputs: Vec<EngineOutput>) {
        for output in outputs {
            match output {
                EngineOutput::Sink(command) => command.dispatch(self.sink.as_mut()),
                EngineOutput::Notify(event) => {
                    let Some(observer) = &self.observer else {
                        continue;
                    };
                    if let Err(e) = observer.try_send(event) {
                        warn!("Dropping observer event: {}", e);
                    }
                }
            }
        }
    }
}

impl EngineRuntime<Initializing> {
    pub fn create(
        name: String,
        source: mpsc::Receiver<SourceEvent>,
        sink: Box<dyn EventSink + Send>,
        observer: Option<mpsc::Sender<ObserverEvent>>,
    ) -> Self {
        info!("Initializing mapping runtime: {}", name);
        Self::new(name, source, sink, observer, None)
    }

    /// Installs the engine; an engine without a single base binding is rejected
    pub fn configure(
        mut self,
        engine: MappingEngine,
    ) -> Result<EngineRuntime<Configured>, MappingError> {
        if engine.bindings().len(Layer::Base) == 0 {
            error!("Refusing to configure {}: empty base layer", self.name);
            return Err(MappingError::InitializationError(
                "binding table has no base layer entries".to_string(),
            ));
        }

        self.engine = Some(engine);
        info!("Mapping runtime configured: {}", self.name);
        Ok(self.transition())
    }
}

impl EngineRuntime<Configured> {
    pub fn activate(self) -> EngineRuntime<Active> {
        info!("Activating mapping runtime: {}", self.name);
        self.transition()
    }
}

impl EngineRuntime<Active> {
    /// Main loop; returns once shutdown is signalled or the source channel closes
    pub async fn run_until_shutdown(
        mut self,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> Result<EngineRuntime<Deactivated>, MappingError> {
        let Some(mut engine) = self.engine.take() else {
            return Err(MappingError::InitializationError(
                "active runtime without engine".to_string(),
            ));
        };
        info!("Starting event loop for: {}", self.name);

        let mut repeat_timer: Option<Interval> = None;

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Shutdown signal received for: {}", self.name);
                    break;
                }

                event = self.source.recv() => {
                    let Some(event) = event else {
                        warn!("Controller source closed for: {}", self.name);
                        break;
                    };
                    let outputs = handle_source_event(&mut engine, event);
                    self.dispatch(outputs);
                }

                now = next_repeat_tick(&mut repeat_timer) => {
                    let outputs = engine.on_repeat_tick(now);
                    self.dispatch(outputs);
                }
            }

            // the timer only exists while a repeat is registered
            match (engine.needs_repeat_tick(), repeat_timer.is_some()) {
                (true, false) => {
                    debug!("Arming repeat timer");
                    let mut timer =
                        interval_at(tokio::time::Instant::now() + REPEAT_TICK, REPEAT_TICK);
                    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    repeat_timer = Some(timer);
                }
                (false, true) => {
                    debug!("Disarming repeat timer");
                    repeat_timer = None;
                }
                _ => {}
            }
        }

        let outputs = engine.stop();
        self.dispatch(outputs);
        self.engine = Some(engine);

        info!("Transitioning to Deactivated state: {}", self.name);
        Ok(self.transition())
    }
}

impl EngineRuntime<Deactivated> {
    /// Gives the stopped engine back, e.g. for inspection
    pub fn into_engine(self) -> Option<MappingEngine> {
        self.engine
    }
}

fn handle_source_event(engine: &mut MappingEngine, event: SourceEvent) -> Vec<EngineOutput> {
    match event {
        SourceEvent::Button {
            element,
            pressed,
            at,
        } => engine.on_button_edge(element, pressed, at),
        SourceEvent::Stick { stick, x, y, at } => engine.on_stick_sample(stick, x, y, at),
        SourceEvent::Trigger { trigger, value, at } => {
            engine.on_trigger_sample(trigger, value, at)
        }
        SourceEvent::Connected { name } => {
            info!("Controller connected: {}", name);
            Vec::new()
        }
        SourceEvent::Disconnected => {
            warn!("Controller disconnected, resetting engine");
            engine.stop()
        }
    }
}

async fn next_repeat_tick(timer: &mut Option<Interval>) -> Instant {
    match timer {
        Some(timer) => timer.tick().await.into_std(),
        None => std::future::pending().await,
    }
}

/// Handle for the mapping runtime task
///
/// Spawns the runtime, hands out the channels and performs a graceful shutdown that
/// releases every held modifier before the task ends.
#[derive(Debug)]
pub struct MappingEngineHandle {
    pub name: String,

    task_handle: Option<JoinHandle<Result<(), MappingError>>>,

    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MappingEngineHandle {
    pub fn new(name: String) -> Self {
        Self {
            name,
            task_handle: None,
            shutdown_tx: None,
        }
    }

    /// Starts the runtime in a tokio task
    ///
    /// # Returns
    ///
    /// * Sender the controller source feeds
    /// * Receiver of observer events
    pub fn start(
        &mut self,
        engine: MappingEngine,
        sink: Box<dyn EventSink + Send>,
    ) -> Result<(mpsc::Sender<SourceEvent>, mpsc::Receiver<ObserverEvent>), MappingError> {
        if self.task_handle.is_some() {
            return Err(MappingError::InitializationError(format!(
                "runtime {} already started",
                self.name
            )));
        }

        let (source_sender, source_receiver) = mpsc::channel(1000);
        let (observer_sender, observer_receiver) = mpsc::channel(100);

        let runtime = EngineRuntime::create(
            self.name.clone(),
            source_receiver,
            sink,
            Some(observer_sender),
        )
        .configure(engine)?
        .activate();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let name = self.name.clone();
        let task_handle = tokio::spawn(async move {
            info!("Spawning mapping runtime: {}", name);
            match runtime.run_until_shutdown(shutdown_rx).await {
                Ok(_) => {
                    info!("Mapping runtime deactivated: {}", name);
                    Ok(())
                }
                Err(e) => {
                    error!("Error running mapping runtime: {} - {}", name, e);
                    Err(e)
                }
            }
        });
        self.task_handle = Some(task_handle);

        info!("Mapping runtime activated: {}", self.name);
        Ok((source_sender, observer_receiver))
    }

    /// Signals shutdown and waits for the task to finish
    pub async fn shutdown(&mut self) -> Result<(), MappingError> {
        debug!("Sending shutdown signal to runtime: {}", self.name);

        if let Some(tx) = self.shutdown_tx.take() {
            if tx.send(()).is_err() {
                warn!("Runtime task already terminated: {}", self.name);
            }
        }

        if let Some(handle) = self.task_handle.take() {
            match handle.await {
                Ok(result) => {
                    debug!("Runtime task completed: {}", self.name);
                    result
                }
                Err(e) => {
                    error!("Runtime task panicked: {} - {}", self.name, e);
                    Err(MappingError::ThreadError(format!(
                        "Runtime task panicked: {}",
                        e
                    )))
                }
            }
        } else {
            debug!("Runtime already shut down: {}", self.name);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::event_collector::InputElement;
    use crate::mapping::bindings::{default_bindings, BindingTable};
    use crate::mapping::keyboard::{builtin_key, Modifier};
    use crate::mapping::sink::{NoImageClipboard, SinkCommand};
    use crate::mapping::stick::StickConfig;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<SinkCommand>>>);

    impl SharedSink {
        fn commands(&self) -> Vec<SinkCommand> {
            self.0.lock().expect("sink lock").clone()
        }

        fn push(&self, command: SinkCommand) {
            self.0.lock().expect("sink lock").push(command);
        }
    }

    impl EventSink for SharedSink {
        fn post_keystroke(&mut self, key: crate::mapping::keyboard::Key, modifiers: &[Modifier]) {
            self.push(SinkCommand::keystroke(key, modifiers));
        }
        fn hold_modifier(&mut self, modifier: Modifier) {
            self.push(SinkCommand::HoldModifier(modifier));
        }
        fn release_modifier(&mut self, modifier: Modifier) {
            self.push(SinkCommand::ReleaseModifier(modifier));
        }
        fn type_text(&mut self, text: &str) {
            self.push(SinkCommand::TypeText(text.to_string()));
        }
        fn post_mouse_click(&mut self, button: crate::mapping::mapping_types::MouseButton) {
            self.push(SinkCommand::MouseClick(button));
        }
        fn post_scroll(&mut self, dx: i32, dy: i32) {
            self.push(SinkCommand::Scroll { dx, dy });
        }
        fn post_cursor_move(&mut self, dx: f32, dy: f32) {
            self.push(SinkCommand::CursorMove { dx, dy });
        }
    }

    fn engine() -> MappingEngine {
        MappingEngine::new(
            default_bindings(),
            StickConfig::default(),
            Box::new(NoImageClipboard),
        )
    }

    fn button(element: InputElement, pressed: bool) -> SourceEvent {
        SourceEvent::Button {
            element,
            pressed,
            at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn button_press_reaches_sink_and_observer() {
        let sink = SharedSink::default();
        let mut handle = MappingEngineHandle::new("test".to_string());
        let (source, mut observer) = handle
            .start(engine(), Box::new(sink.clone()))
            .expect("runtime starts");

        source
            .send(button(InputElement::ButtonA, true))
            .await
            .expect("send press");
        source
            .send(button(InputElement::ButtonA, false))
            .await
            .expect("send release");

        let event = observer.recv().await.expect("observer event");
        assert_eq!(event.label(), "Accept");

        handle.shutdown().await.expect("clean shutdown");
        assert_eq!(
            sink.commands(),
            vec![SinkCommand::keystroke(builtin_key("return"), &[])]
        );
    }

    #[tokio::test]
    async fn shutdown_releases_sticky_modifiers() {
        let sink = SharedSink::default();
        let mut handle = MappingEngineHandle::new("test".to_string());
        let (source, mut observer) = handle
            .start(engine(), Box::new(sink.clone()))
            .expect("runtime starts");

        source
            .send(button(InputElement::LeftShoulder, true))
            .await
            .expect("send modifier");
        source
            .send(button(InputElement::DpadRight, true))
            .await
            .expect("send dpad");
        observer.recv().await.expect("next app event");

        handle.shutdown().await.expect("clean shutdown");
        assert_eq!(
            sink.commands().last(),
            Some(&SinkCommand::ReleaseModifier(Modifier::Command))
        );
    }

    #[tokio::test]
    async fn held_dpad_repeats_on_timer() {
        let sink = SharedSink::default();
        let mut handle = MappingEngineHandle::new("test".to_string());
        let (source, _observer) = handle
            .start(engine(), Box::new(sink.clone()))
            .expect("runtime starts");

        source
            .send(button(InputElement::DpadDown, true))
            .await
            .expect("send press");
        tokio::time::sleep(Duration::from_millis(650)).await;
        source
            .send(button(InputElement::DpadDown, false))
            .await
            .expect("send release");

        handle.shutdown().await.expect("clean shutdown");
        assert!(sink.commands().len() >= 2, "initial keystroke plus repeats");
    }

    #[tokio::test]
    async fn disconnect_resets_engine() {
        let sink = SharedSink::default();
        let mut handle = MappingEngineHandle::new("test".to_string());
        let (source, mut observer) = handle
            .start(engine(), Box::new(sink.clone()))
            .expect("runtime starts");

        source
            .send(button(InputElement::LeftShoulder, true))
            .await
            .expect("send modifier");
        source
            .send(button(InputElement::DpadLeft, true))
            .await
            .expect("send dpad");
        observer.recv().await.expect("prev app event");
        source
            .send(SourceEvent::Disconnected)
            .await
            .expect("send disconnect");
        // after the reset the engine is back in the base layer
        source
            .send(button(InputElement::ButtonA, true))
            .await
            .expect("send press");
        let event = observer.recv().await.expect("accept event");
        assert_eq!(event.label(), "Accept");

        handle.shutdown().await.expect("clean shutdown");
        let released = sink
            .commands()
            .iter()
            .filter(|c| **c == SinkCommand::ReleaseModifier(Modifier::Command))
            .count();
        assert_eq!(released, 1);
    }

    #[tokio::test]
    async fn empty_table_is_rejected() {
        let mut handle = MappingEngineHandle::new("test".to_string());
        let empty = MappingEngine::new(
            BindingTable::empty(),
            StickConfig::default(),
            Box::new(NoImageClipboard),
        );
        let result = handle.start(empty, Box::new(SharedSink::default()));
        assert!(matches!(result, Err(MappingError::InitializationError(_))));
        assert!(handle.shutdown().await.is_ok());
    }
}
