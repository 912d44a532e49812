//! One-shot order capture
//!
//! An [`OrderListenerHandle`] is created fresh for every cycle: it
//! calibrates ambient noise once, captures a single utterance, runs it
//! through the configured transcriber, and resolves its result exactly
//! once. The handle is discarded after the result fires or `stop()`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};

use crate::audio::{
    AudioCapture, DetectorConfig, SAMPLE_RATE, SpeechDetector, SpeechEvent, rms_energy,
    samples_to_wav,
};
use crate::stt::Transcriber;
use crate::{Error, Result};

/// Audio processing chunk interval
const CHUNK_INTERVAL: Duration = Duration::from_millis(100);

/// Ambient-noise calibration window
const CALIBRATION_WINDOW: Duration = Duration::from_millis(500);

/// Builds order listeners around a shared transcriber
pub struct OrderListener {
    transcriber: Arc<Transcriber>,
}

/// Orchestrator-facing half of a running order capture
pub struct OrderListenerHandle {
    result_rx: oneshot::Receiver<Option<String>>,
    stop: watch::Sender<bool>,
}

/// Worker-facing half of an order capture
///
/// Real workers consume this; tests hold one directly to play the
/// listener role.
pub struct ListenerPort {
    /// Resolves the handle's result; consumed on first use
    pub result_tx: oneshot::Sender<Option<String>>,
    /// Flips to true on forced stop
    pub stop_rx: watch::Receiver<bool>,
}

impl OrderListenerHandle {
    /// Create a connected handle/port pair
    #[must_use]
    pub fn channel() -> (Self, ListenerPort) {
        let (result_tx, result_rx) = oneshot::channel();
        let (stop, stop_rx) = watch::channel(false);

        (
            Self { result_rx, stop },
            ListenerPort { result_tx, stop_rx },
        )
    }

    /// Wait for the recognition result
    ///
    /// Resolves exactly once; a worker that went away without reporting
    /// counts as a null result, as does polling again after the result
    /// already fired.
    pub async fn result(&mut self) -> Option<String> {
        (&mut self.result_rx).await.unwrap_or_default()
    }

    /// Force the capture to stop
    ///
    /// Safe to call concurrently with an in-flight capture; the worker
    /// unblocks immediately and resolves the result as null.
    pub fn stop(&self) {
        self.stop.send_replace(true);
        tracing::debug!("order listener stop requested");
    }
}

impl OrderListener {
    /// Create a listener factory over the given transcriber
    #[must_use]
    pub fn new(transcriber: Arc<Transcriber>) -> Self {
        Self { transcriber }
    }

    /// Start one order capture
    ///
    /// Spawns a capture worker (cpal streams are not Send, so capture
    /// runs on its own thread) and a transcription task; returns the
    /// handle immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the capture device cannot be opened.
    pub fn start(&self) -> Result<OrderListenerHandle> {
        let (handle, port) = OrderListenerHandle::channel();
        let stop_rx = port.stop_rx.clone();

        let (audio_tx, audio_rx) = oneshot::channel::<Option<Vec<u8>>>();
        let (startup_tx, startup_rx) = std::sync::mpsc::channel::<Result<()>>();

        std::thread::Builder::new()
            .name("order-listener".to_string())
            .spawn(move || {
                let capture = match AudioCapture::new() {
                    Ok(capture) => {
                        let _ = startup_tx.send(Ok(()));
                        capture
                    }
                    Err(e) => {
                        let _ = startup_tx.send(Err(e));
                        return;
                    }
                };

                let wav = capture_utterance(capture, &stop_rx);
                let _ = audio_tx.send(wav);
            })
            .map_err(|e| Error::Listener(format!("failed to spawn listener worker: {e}")))?;

        startup_rx
            .recv_timeout(Duration::from_secs(5))
            .map_err(|_| Error::Listener("listener worker did not start".to_string()))??;

        let transcriber = Arc::clone(&self.transcriber);
        tokio::spawn(async move {
            let result = match audio_rx.await {
                Ok(Some(wav)) => transcribe(&transcriber, &wav).await,
                Ok(None) | Err(_) => None,
            };

            // The handle may already be gone on forced shutdown
            let _ = port.result_tx.send(result);
        });

        Ok(handle)
    }
}

/// Capture one utterance, returning WAV bytes (None on stop or failure)
fn capture_utterance(
    mut capture: AudioCapture,
    stop_rx: &watch::Receiver<bool>,
) -> Option<Vec<u8>> {
    if let Err(e) = capture.start() {
        tracing::error!(error = %e, "order capture failed to start");
        return None;
    }

    // Calibrate once per handle before listening
    capture.clear_buffer();
    std::thread::sleep(CALIBRATION_WINDOW);
    let ambient = rms_energy(&capture.take_buffer());
    let config = DetectorConfig::calibrated(ambient);
    tracing::debug!(ambient, threshold = config.energy_threshold, "ambient noise calibrated");

    let mut detector = SpeechDetector::new(config);
    tracing::info!("listening for order");

    loop {
        if *stop_rx.borrow() {
            tracing::debug!("order capture stopped");
            capture.stop();
            return None;
        }

        std::thread::sleep(CHUNK_INTERVAL);
        let samples = capture.take_buffer();

        if detector.process(&samples) == SpeechEvent::SegmentComplete {
            capture.stop();
            let segment = detector.take_segment();

            return match samples_to_wav(&segment, SAMPLE_RATE) {
                Ok(wav) => Some(wav),
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode order audio");
                    None
                }
            };
        }
    }
}

/// Transcribe captured audio; failures and empty transcripts are null
async fn transcribe(transcriber: &Transcriber, wav: &[u8]) -> Option<String> {
    match transcriber.transcribe(wav).await {
        Ok(text) => {
            let text = text.trim();
            if text.is_empty() {
                tracing::debug!("empty transcript, treating as null order");
                None
            } else {
                Some(text.to_string())
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "order transcription failed");
            None
        }
    }
}
