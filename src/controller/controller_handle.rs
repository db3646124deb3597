//! Controller Handle - Unified API for gamepad input
//!
//! Wraps the collector thread and exposes a single spawn/stop pair to the binary.

use tokio::sync::mpsc;
use tracing::{debug, info};

pub use super::event_collector::{
    CollectorError, CollectorHandle, CollectorSettings, InputElement, SourceEvent, StickId,
    TriggerId,
};

/// Configuration settings for the controller subsystem
#[derive(Clone, Debug)]
pub struct ControllerSettings {
    /// Stick and trigger sampling rate in Hz
    ///
    /// The arrow repeat timing is driven by this clock, so values well below 50 Hz
    /// make arrow repeats visibly coarse.
    pub poll_rate_hz: u32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self { poll_rate_hz: 60 }
    }
}

/// Errors that can occur during controller initialization or operation
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Gamepad backend or collector thread failure
    #[error("Collector error: {0}")]
    CollectorError(#[from] CollectorError),

    #[error("Initialization error: {0}")]
    InitializationError(String),
}

/// Handle for the controller subsystem lifecycle
///
/// Dropping the handle signals the collector thread to stop; [`ControllerHandle::stop`]
/// additionally waits for it.
pub struct ControllerHandle {
    collector: CollectorHandle,
}

impl ControllerHandle {
    /// Spawns the collector with the given settings
    ///
    /// # Arguments
    ///
    /// * `settings` - Optional configuration; uses defaults if None
    /// * `sender` - Channel that receives every [`SourceEvent`]
    ///
    /// # Errors
    ///
    /// * [`ControllerError::CollectorError`] - gilrs could not be initialized or the
    ///   thread could not be started
    /// * [`ControllerError::InitializationError`] - the settings are unusable
    pub fn spawn(
        settings: Option<ControllerSettings>,
        sender: mpsc::Sender<SourceEvent>,
    ) -> Result<Self, ControllerError> {
        info!(
            "Initializing Controller system with settings: {:?}",
            settings
        );

        let settings = settings.unwrap_or_default();
        if settings.poll_rate_hz == 0 || settings.poll_rate_hz > 1000 {
            return Err(ControllerError::InitializationError(format!(
                "poll rate must be within 1..=1000 Hz, got {}",
                settings.poll_rate_hz
            )));
        }

        let collector_settings = CollectorSettings {
            poll_rate_hz: settings.poll_rate_hz,
        };
        debug!("Collector settings: {:?}", collector_settings);

        let collector = CollectorHandle::spawn(Some(collector_settings), sender)?;

        info!("Controller system initialized successfully");
        Ok(Self { collector })
    }

    /// Stops the collector thread and waits for it to finish
    pub fn stop(mut self) {
        info!("Stopping Controller system");
        self.collector.stop();
    }
}
