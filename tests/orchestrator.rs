//! End-to-end cycle tests driven through mock engine ports
//!
//! The trigger engine and the order listener are replaced by their port
//! halves so the full wake/listen/dispatch cycle runs without audio
//! hardware or network access.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use lyrebird::config::{
    FeedbackSet, RestApiSettings, Settings, SttSettings, TriggerConfig, TtsSettings,
};
use lyrebird::dispatch::Dispatcher;
use lyrebird::feedback::Feedback;
use lyrebird::listener::{ListenerPort, OrderListenerHandle};
use lyrebird::orchestrator::{Orchestrator, Phase};
use lyrebird::trigger::{TriggerHandle, TriggerPort, TriggerRegistry};
use lyrebird::{Error, Result};

const STEP: Duration = Duration::from_millis(10);
const DEADLINE: Duration = Duration::from_secs(5);

/// Feedback provider that records instead of playing
#[derive(Default)]
struct RecordingFeedback {
    spoken: Mutex<Vec<String>>,
    played: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Feedback for RecordingFeedback {
    async fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn play_sound(&self, path: &std::path::Path) -> Result<()> {
        self.played.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

fn test_settings() -> Settings {
    Settings {
        default_trigger: "hotword1".to_string(),
        triggers: vec![TriggerConfig {
            name: "hotword1".to_string(),
            engine: "mock".to_string(),
            settings: toml::Table::new(),
        }],
        on_ready: FeedbackSet {
            answers: vec!["I am listening".to_string()],
            sounds: Vec::new(),
        },
        on_wake: FeedbackSet {
            answers: vec!["Yes?".to_string()],
            sounds: Vec::new(),
        },
        sound_dir: PathBuf::from("/tmp"),
        order_timeout_secs: 0,
        stt: SttSettings {
            engine: "whisper".to_string(),
            model: "whisper-1".to_string(),
            api_key: None,
        },
        tts: TtsSettings {
            engine: "openai".to_string(),
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            speed: 1.0,
            api_key: None,
        },
        rest_api: RestApiSettings {
            enabled: false,
            port: 5000,
            allowed_origin: "*".to_string(),
        },
        commands: Vec::new(),
    }
}

/// Everything a test needs to drive one orchestrator
struct Harness {
    trigger_port: Arc<Mutex<Option<TriggerPort>>>,
    listener_ports: Arc<Mutex<Vec<ListenerPort>>>,
    unpause_count: Arc<AtomicUsize>,
    dispatched: Arc<Mutex<Vec<String>>>,
    feedback: Arc<RecordingFeedback>,
    phase_rx: watch::Receiver<Phase>,
    shutdown_tx: mpsc::Sender<()>,
    run: tokio::task::JoinHandle<Result<()>>,
}

fn spawn_orchestrator(settings: Settings) -> Harness {
    let trigger_port: Arc<Mutex<Option<TriggerPort>>> = Arc::new(Mutex::new(None));
    let listener_ports: Arc<Mutex<Vec<ListenerPort>>> = Arc::new(Mutex::new(Vec::new()));
    let unpause_count = Arc::new(AtomicUsize::new(0));
    let dispatched = Arc::new(Mutex::new(Vec::new()));
    let feedback = Arc::new(RecordingFeedback::default());

    let mut registry = TriggerRegistry::new();
    let port_slot = Arc::clone(&trigger_port);
    registry.register(
        "mock",
        Box::new(move |config: &TriggerConfig| {
            let (handle, port) = TriggerHandle::channel(config.name.clone());
            *port_slot.lock().unwrap() = Some(port);
            Ok(handle)
        }),
    );

    let ports = Arc::clone(&listener_ports);
    let listener_factory: lyrebird::orchestrator::ListenerFactory = Box::new(move || {
        let (handle, port) = OrderListenerHandle::channel();
        ports.lock().unwrap().push(port);
        Ok(handle)
    });

    let mut dispatcher = Dispatcher::new();
    let seen = Arc::clone(&dispatched);
    dispatcher.register(
        "light",
        vec!["turn on the light".to_string()],
        Box::new(move |utterance| {
            seen.lock().unwrap().push(utterance.to_string());
            Ok(())
        }),
    );

    let orchestrator = Orchestrator::new(
        Arc::new(settings),
        Arc::clone(&feedback) as Arc<dyn Feedback>,
        Arc::new(dispatcher),
        registry,
        listener_factory,
    );

    let phase_rx = orchestrator.phase_watch();

    // Count re-arms from armed-flag change notifications
    let counter = Arc::clone(&unpause_count);
    let counting_port = Arc::clone(&trigger_port);
    tokio::spawn(async move {
        let mut armed_rx = loop {
            let rx = counting_port
                .lock()
                .unwrap()
                .as_ref()
                .map(TriggerPort::armed_watch);
            if let Some(rx) = rx {
                break rx;
            }
            tokio::time::sleep(STEP).await;
        };

        if *armed_rx.borrow_and_update() {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        while armed_rx.changed().await.is_ok() {
            if *armed_rx.borrow_and_update() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let run = tokio::spawn(orchestrator.run(shutdown_rx));

    Harness {
        trigger_port,
        listener_ports,
        unpause_count,
        dispatched,
        feedback,
        phase_rx,
        shutdown_tx,
        run,
    }
}

impl Harness {
    /// Wait until the cycle publishes the given phase
    async fn wait_for_phase(&mut self, phase: Phase) {
        let wait = async {
            loop {
                if *self.phase_rx.borrow_and_update() == phase {
                    return;
                }
                if self.phase_rx.changed().await.is_err() {
                    panic!("phase channel closed before reaching {phase}");
                }
            }
        };
        tokio::time::timeout(DEADLINE, wait)
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for phase {phase}"));
    }

    /// Wait until the mock trigger is armed
    async fn wait_for_armed(&self) {
        let wait = async {
            loop {
                let armed = self
                    .trigger_port
                    .lock()
                    .unwrap()
                    .as_ref()
                    .is_some_and(TriggerPort::is_armed);
                if armed {
                    return;
                }
                tokio::time::sleep(STEP).await;
            }
        };
        tokio::time::timeout(DEADLINE, wait)
            .await
            .expect("timed out waiting for the trigger to arm");
    }

    /// Emit one wake event from the mock engine
    fn send_wake(&self) {
        self.trigger_port
            .lock()
            .unwrap()
            .as_ref()
            .expect("trigger not built")
            .send_wake();
    }

    /// Wait for the next listener port and take it
    async fn take_listener(&self) -> ListenerPort {
        let wait = async {
            loop {
                if let Some(port) = self.listener_ports.lock().unwrap().pop() {
                    return port;
                }
                tokio::time::sleep(STEP).await;
            }
        };
        tokio::time::timeout(DEADLINE, wait)
            .await
            .expect("timed out waiting for an order listener")
    }

    fn trigger_armed(&self) -> bool {
        self.trigger_port
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(TriggerPort::is_armed)
    }

    async fn shutdown(self) -> Result<()> {
        self.shutdown_tx.send(()).await.expect("cycle already gone");
        tokio::time::timeout(DEADLINE, self.run)
            .await
            .expect("cycle did not stop")
            .expect("cycle task panicked")
    }
}

#[tokio::test]
async fn full_cycle_dispatches_and_rearms() {
    let mut h = spawn_orchestrator(test_settings());

    // First cycle arms the trigger and plays the ready feedback
    h.wait_for_phase(Phase::AwaitingTrigger).await;
    h.wait_for_armed().await;
    assert_eq!(
        *h.feedback.spoken.lock().unwrap(),
        vec!["I am listening".to_string()]
    );

    // Configured phrases take priority over sound files
    assert!(h.feedback.played.lock().unwrap().is_empty());

    h.send_wake();
    let listener = h.take_listener().await;

    // The wake answer played and the trigger is paused while listening
    h.wait_for_phase(Phase::AwaitingOrder).await;
    assert!(!h.trigger_armed());
    assert!(
        h.feedback
            .spoken
            .lock()
            .unwrap()
            .contains(&"Yes?".to_string())
    );

    listener
        .result_tx
        .send(Some("please turn on the light".to_string()))
        .expect("cycle dropped the listener");

    // Order dispatched exactly once, then the trigger re-arms
    h.wait_for_phase(Phase::AwaitingTrigger).await;
    h.wait_for_armed().await;
    assert_eq!(
        *h.dispatched.lock().unwrap(),
        vec!["please turn on the light".to_string()]
    );
    assert_eq!(h.unpause_count.load(Ordering::SeqCst), 2);

    h.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn null_order_completes_the_cycle_without_dispatch() {
    let mut h = spawn_orchestrator(test_settings());

    h.wait_for_phase(Phase::AwaitingTrigger).await;
    h.wait_for_armed().await;
    h.send_wake();

    let listener = h.take_listener().await;
    listener.result_tx.send(None).expect("cycle dropped the listener");

    h.wait_for_phase(Phase::AwaitingTrigger).await;
    h.wait_for_armed().await;
    assert!(h.dispatched.lock().unwrap().is_empty());

    h.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn trigger_and_listener_are_never_live_together() {
    let mut h = spawn_orchestrator(test_settings());

    h.wait_for_phase(Phase::AwaitingTrigger).await;
    h.wait_for_armed().await;
    h.send_wake();

    let listener = h.take_listener().await;
    h.wait_for_phase(Phase::AwaitingOrder).await;

    // While the listener lives, the trigger must stay disarmed
    for _ in 0..10 {
        assert!(!h.trigger_armed());
        tokio::time::sleep(STEP).await;
    }

    listener.result_tx.send(None).expect("cycle dropped the listener");
    h.wait_for_armed().await;

    h.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn stale_wake_during_listening_is_dropped() {
    let mut h = spawn_orchestrator(test_settings());

    h.wait_for_phase(Phase::AwaitingTrigger).await;
    h.wait_for_armed().await;
    h.send_wake();

    let listener = h.take_listener().await;
    h.wait_for_phase(Phase::AwaitingOrder).await;

    // A wake emitted while paused must not start another conversation
    h.send_wake();

    listener.result_tx.send(None).expect("cycle dropped the listener");
    h.wait_for_phase(Phase::AwaitingTrigger).await;
    h.wait_for_armed().await;

    // The cycle stays armed; the stale wake never advances it
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*h.phase_rx.borrow(), Phase::AwaitingTrigger);
    assert!(h.listener_ports.lock().unwrap().is_empty());

    h.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn order_timeout_counts_as_null() {
    let mut settings = test_settings();
    settings.order_timeout_secs = 1;
    let mut h = spawn_orchestrator(settings);

    h.wait_for_phase(Phase::AwaitingTrigger).await;
    h.wait_for_armed().await;
    h.send_wake();

    // Never resolve the listener; the timeout must stop it and re-arm
    let listener = h.take_listener().await;
    h.wait_for_phase(Phase::AwaitingTrigger).await;
    h.wait_for_armed().await;

    assert!(*listener.stop_rx.borrow());
    assert!(h.dispatched.lock().unwrap().is_empty());

    h.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn shutdown_while_listening_stops_the_listener() {
    let mut h = spawn_orchestrator(test_settings());

    h.wait_for_phase(Phase::AwaitingTrigger).await;
    h.wait_for_armed().await;
    h.send_wake();

    let listener = h.take_listener().await;
    h.wait_for_phase(Phase::AwaitingOrder).await;

    h.shutdown().await.expect("clean shutdown");
    assert!(*listener.stop_rx.borrow());
}

#[tokio::test]
async fn unknown_default_trigger_is_a_startup_error() {
    let mut settings = test_settings();
    settings.default_trigger = "missing".to_string();

    let h = spawn_orchestrator(settings);
    let result = tokio::time::timeout(DEADLINE, h.run)
        .await
        .expect("startup did not fail")
        .expect("cycle task panicked");

    assert!(matches!(result, Err(Error::Config(_))));
    assert_eq!(*h.phase_rx.borrow(), Phase::Faulted);
    assert!(h.trigger_port.lock().unwrap().is_none());
}
