//! The orchestration cycle
//!
//! Sequences one conversation turn end to end: arm the trigger, play the
//! ready feedback, wait for a wake event, acknowledge it, capture one
//! order, dispatch it, re-arm. The trigger and the order listener are
//! never live at the same time; the trigger is paused before a listener
//! starts and only unpaused after the order is analysed.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::config::Settings;
use crate::dispatch::Dispatcher;
use crate::feedback::{Feedback, announce};
use crate::listener::OrderListenerHandle;
use crate::trigger::TriggerRegistry;
use crate::{Error, Result};

/// Where the cycle currently is
///
/// Published over a watch channel so the control surface can report it
/// without touching the cycle itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Not yet running
    Idle,
    /// Building the default trigger from its configuration
    TriggerStarting,
    /// Re-arming the trigger for a new cycle
    TriggerUnpausing,
    /// Playing the armed-and-listening feedback
    PlayingReadySound,
    /// Armed, waiting for a wake event
    AwaitingTrigger,
    /// Wake received, playing the acknowledgment
    PlayingWakeAnswer,
    /// Spawning a fresh order listener
    StartingOrderListener,
    /// Capturing and transcribing one order
    AwaitingOrder,
    /// Matching the recognized order against commands
    AnalysingOrder,
    /// Unrecoverable error; the cycle has stopped
    Faulted,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::TriggerStarting => "trigger_starting",
            Self::TriggerUnpausing => "trigger_unpausing",
            Self::PlayingReadySound => "playing_ready_sound",
            Self::AwaitingTrigger => "awaiting_trigger",
            Self::PlayingWakeAnswer => "playing_wake_answer",
            Self::StartingOrderListener => "starting_order_listener",
            Self::AwaitingOrder => "awaiting_order",
            Self::AnalysingOrder => "analysing_order",
            Self::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

/// Produces a fresh order listener for each cycle
pub type ListenerFactory = Box<dyn Fn() -> Result<OrderListenerHandle> + Send + Sync>;

/// Runs the wake/listen/dispatch cycle
pub struct Orchestrator {
    settings: Arc<Settings>,
    feedback: Arc<dyn Feedback>,
    dispatcher: Arc<Dispatcher>,
    registry: TriggerRegistry,
    listener_factory: ListenerFactory,
    phase: watch::Sender<Phase>,
}

impl Orchestrator {
    /// Wire up an orchestrator; nothing runs until [`run`](Self::run)
    #[must_use]
    pub fn new(
        settings: Arc<Settings>,
        feedback: Arc<dyn Feedback>,
        dispatcher: Arc<Dispatcher>,
        registry: TriggerRegistry,
        listener_factory: ListenerFactory,
    ) -> Self {
        let (phase, _) = watch::channel(Phase::Idle);

        Self {
            settings,
            feedback,
            dispatcher,
            registry,
            listener_factory,
            phase,
        }
    }

    /// Observe phase changes (for the control surface and tests)
    #[must_use]
    pub fn phase_watch(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Run the cycle until shutdown or an unrecoverable fault
    ///
    /// Consumes the orchestrator; a finished cycle cannot be restarted.
    /// A message on `shutdown` stops any live listener, stops the
    /// trigger, and returns cleanly.
    ///
    /// # Errors
    ///
    /// Returns the fatal error after publishing [`Phase::Faulted`]:
    /// unknown or missing default trigger, engine startup failure, or a
    /// trigger worker that died mid-flight.
    pub async fn run(self, mut shutdown: mpsc::Receiver<()>) -> Result<()> {
        match self.cycle(&mut shutdown).await {
            Ok(()) => {
                self.set_phase(Phase::Idle);
                tracing::info!("orchestrator shut down");
                Ok(())
            }
            Err(e) => {
                self.set_phase(Phase::Faulted);
                tracing::error!(error = %e, "orchestrator faulted");
                Err(e)
            }
        }
    }

    async fn cycle(&self, shutdown: &mut mpsc::Receiver<()>) -> Result<()> {
        self.set_phase(Phase::TriggerStarting);

        let config = self.settings.default_trigger_config().ok_or_else(|| {
            Error::Config(format!(
                "no configured trigger matches default_trigger \"{}\"",
                self.settings.default_trigger
            ))
        })?;
        let mut trigger = self.registry.build(config)?;

        loop {
            self.set_phase(Phase::TriggerUnpausing);
            trigger.unpause();

            self.set_phase(Phase::PlayingReadySound);
            if let Err(e) = self.announce(&self.settings.on_ready).await {
                tracing::warn!(error = %e, "ready feedback failed");
            }

            self.set_phase(Phase::AwaitingTrigger);
            let mut shutting_down = false;
            let wake = tokio::select! {
                wake = trigger.wake() => wake,
                _ = shutdown.recv() => {
                    shutting_down = true;
                    None
                }
            };

            if shutting_down {
                trigger.stop();
                return Ok(());
            }

            // The engine worker only goes away on an unrecoverable error
            if wake.is_none() {
                trigger.stop();
                return Err(Error::Trigger(format!(
                    "trigger \"{}\" worker exited unexpectedly",
                    self.settings.default_trigger
                )));
            }

            // Disarm before anything else so the listener never coexists
            // with an armed trigger
            trigger.pause();

            self.set_phase(Phase::PlayingWakeAnswer);
            if let Err(e) = self.announce(&self.settings.on_wake).await {
                tracing::warn!(error = %e, "wake answer failed");
            }

            self.set_phase(Phase::StartingOrderListener);
            let mut listener = match (self.listener_factory)() {
                Ok(listener) => listener,
                Err(e) => {
                    trigger.stop();
                    return Err(e);
                }
            };

            self.set_phase(Phase::AwaitingOrder);
            let mut shutting_down = false;
            let utterance = tokio::select! {
                utterance = Self::await_order(&mut listener, self.settings.order_timeout_secs) => {
                    utterance
                }
                _ = shutdown.recv() => {
                    shutting_down = true;
                    None
                }
            };

            if shutting_down {
                listener.stop();
                trigger.stop();
                return Ok(());
            }
            drop(listener);

            self.set_phase(Phase::AnalysingOrder);
            match utterance {
                Some(text) => {
                    tracing::info!(utterance = %text, "analysing order");
                    self.dispatcher.dispatch(&text);
                }
                None => tracing::info!("no order captured, re-arming"),
            }
        }
    }

    async fn announce(&self, set: &crate::config::FeedbackSet) -> Result<()> {
        announce(self.feedback.as_ref(), set, &self.settings.sound_dir).await
    }

    /// Wait for the recognition result, bounded by the configured timeout
    ///
    /// A timed-out capture is stopped and counts as a null order.
    async fn await_order(listener: &mut OrderListenerHandle, timeout_secs: u64) -> Option<String> {
        if timeout_secs == 0 {
            return listener.result().await;
        }

        let outcome =
            tokio::time::timeout(Duration::from_secs(timeout_secs), listener.result()).await;

        match outcome {
            Ok(utterance) => utterance,
            Err(_) => {
                tracing::info!(timeout_secs, "order capture timed out");
                listener.stop();
                None
            }
        }
    }

    fn set_phase(&self, phase: Phase) {
        tracing::debug!(%phase, "phase transition");
        self.phase.send_replace(phase);
    }
}
