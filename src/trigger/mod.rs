//! Wake-word trigger detection and lifecycle
//!
//! A [`TriggerHandle`] is created once at startup and paused/unpaused
//! across cycles; the engine behind it runs on its own worker and emits
//! wake events over a bounded channel. Engines are selected by name
//! through the [`TriggerRegistry`].

mod energy;
mod hotword;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::config::TriggerConfig;
use crate::stt::Transcriber;
use crate::{Error, Result};

pub use energy::EnergyEngineSettings;
pub use hotword::HotwordEngineSettings;

/// Orchestrator-facing half of a running trigger
///
/// Owns the armed flag and the wake-event receiver. The engine worker
/// holds the matching [`TriggerPort`] and exits when the handle is
/// dropped or stopped.
#[derive(Debug)]
pub struct TriggerHandle {
    name: String,
    armed: watch::Sender<bool>,
    wake_rx: mpsc::Receiver<()>,
}

/// Engine-facing half of a trigger
///
/// Real engines consume this on their worker thread; tests hold one
/// directly to play the engine role.
pub struct TriggerPort {
    wake_tx: mpsc::Sender<()>,
    armed_rx: watch::Receiver<bool>,
}

impl TriggerHandle {
    /// Create a connected handle/port pair
    ///
    /// The handle starts paused; the first cycle unpauses it.
    #[must_use]
    pub fn channel(name: impl Into<String>) -> (Self, TriggerPort) {
        let (armed, armed_rx) = watch::channel(false);
        // Capacity 1: at most one wake per armed period is ever pending
        let (wake_tx, wake_rx) = mpsc::channel(1);

        (
            Self {
                name: name.into(),
                armed,
                wake_rx,
            },
            TriggerPort { wake_tx, armed_rx },
        )
    }

    /// Trigger name (from configuration)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Disarm the trigger; takes effect before returning
    pub fn pause(&self) {
        self.armed.send_replace(false);
        tracing::debug!(trigger = %self.name, "trigger paused");
    }

    /// Re-arm the trigger, dropping any stale wake events first
    ///
    /// A wake event delivered while the trigger was paused is a protocol
    /// violation; it is logged and discarded rather than carried into the
    /// next armed period.
    pub fn unpause(&mut self) {
        while self.wake_rx.try_recv().is_ok() {
            tracing::warn!(trigger = %self.name, "stale wake event dropped");
        }
        self.armed.send_replace(true);
        tracing::debug!(trigger = %self.name, "trigger unpaused");
    }

    /// Whether the trigger is currently armed
    #[must_use]
    pub fn is_armed(&self) -> bool {
        *self.armed.borrow()
    }

    /// Wait for the next wake event
    ///
    /// Returns `None` if the engine worker has gone away.
    pub async fn wake(&mut self) -> Option<()> {
        self.wake_rx.recv().await
    }

    /// Permanently stop the trigger
    ///
    /// Dropping the armed sender tells the engine worker to exit; the
    /// trigger cannot be restarted afterwards.
    pub fn stop(self) {
        self.armed.send_replace(false);
        drop(self.armed);
        tracing::debug!(name = %self.name, "trigger stopped");
    }
}

impl TriggerPort {
    /// Whether the orchestrator currently wants wake events
    #[must_use]
    pub fn is_armed(&self) -> bool {
        *self.armed_rx.borrow()
    }

    /// A dedicated receiver for armed-state changes
    #[must_use]
    pub fn armed_watch(&self) -> watch::Receiver<bool> {
        self.armed_rx.clone()
    }

    /// Whether the owning handle is gone (engine should exit)
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.armed_rx.has_changed().is_err()
    }

    /// Emit one wake event; a full channel means one is already pending
    pub fn send_wake(&self) {
        match self.wake_tx.try_send(()) {
            Ok(()) => tracing::info!("wake event emitted"),
            Err(mpsc::error::TrySendError::Full(())) => {
                tracing::debug!("wake event already pending, dropped");
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                tracing::debug!("wake channel closed, dropped");
            }
        }
    }
}

/// Factory producing a running trigger from its configuration
pub type TriggerFactory = Box<dyn Fn(&TriggerConfig) -> Result<TriggerHandle> + Send + Sync>;

/// Maps engine names to trigger factories, resolved once at startup
pub struct TriggerRegistry {
    factories: HashMap<String, TriggerFactory>,
}

impl TriggerRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in engines
    ///
    /// `energy` is always available; `hotword` requires a transcriber.
    #[must_use]
    pub fn with_builtins(transcriber: Option<Arc<Transcriber>>) -> Self {
        let mut registry = Self::new();

        registry.register("energy", Box::new(energy::build));

        if let Some(transcriber) = transcriber {
            registry.register(
                "hotword",
                Box::new(move |config| hotword::build(config, Arc::clone(&transcriber))),
            );
        }

        registry
    }

    /// Register an engine factory under a name
    pub fn register(&mut self, engine: impl Into<String>, factory: TriggerFactory) {
        self.factories.insert(engine.into(), factory);
    }

    /// Build a running trigger for the given configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an unknown engine, or the engine's own
    /// startup error (both fatal, reported once at startup).
    pub fn build(&self, config: &TriggerConfig) -> Result<TriggerHandle> {
        let factory = self.factories.get(&config.engine).ok_or_else(|| {
            Error::Config(format!(
                "trigger \"{}\" references unknown engine \"{}\"",
                config.name, config.engine
            ))
        })?;

        tracing::info!(trigger = %config.name, engine = %config.engine, "starting trigger");
        factory(config)
    }
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_starts_paused() {
        let (handle, port) = TriggerHandle::channel("hotword1");
        assert!(!handle.is_armed());
        assert!(!port.is_armed());
    }

    #[test]
    fn pause_unpause_flip_the_armed_flag_synchronously() {
        let (mut handle, port) = TriggerHandle::channel("hotword1");

        handle.unpause();
        assert!(port.is_armed());

        handle.pause();
        assert!(!port.is_armed());
    }

    #[tokio::test]
    async fn unpause_drains_stale_wake_events() {
        let (mut handle, port) = TriggerHandle::channel("hotword1");

        // Event lands while paused
        port.send_wake();
        handle.unpause();

        // The stale event must not be observable after re-arming
        let pending = tokio::time::timeout(std::time::Duration::from_millis(20), handle.wake());
        assert!(pending.await.is_err());
    }

    #[tokio::test]
    async fn wake_event_is_delivered_once() {
        let (mut handle, port) = TriggerHandle::channel("hotword1");
        handle.unpause();

        port.send_wake();
        // Second emission while one is pending is dropped, not queued
        port.send_wake();

        assert_eq!(handle.wake().await, Some(()));
        let extra = tokio::time::timeout(std::time::Duration::from_millis(20), handle.wake());
        assert!(extra.await.is_err());
    }

    #[test]
    fn stop_closes_the_engine_port() {
        let (handle, port) = TriggerHandle::channel("hotword1");
        handle.stop();
        assert!(port.is_closed());
    }

    #[test]
    fn unknown_engine_is_a_config_error() {
        let registry = TriggerRegistry::with_builtins(None);
        let config = TriggerConfig {
            name: "hotword1".to_string(),
            engine: "snowboy".to_string(),
            settings: toml::Table::new(),
        };

        let err = registry.build(&config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("snowboy"));
    }

    #[test]
    fn hotword_engine_requires_a_transcriber() {
        let registry = TriggerRegistry::with_builtins(None);
        let config = TriggerConfig {
            name: "hotword1".to_string(),
            engine: "hotword".to_string(),
            settings: toml::Table::new(),
        };
        assert!(registry.build(&config).is_err());
    }
}
