//! Energy-based wake engine
//!
//! Wakes on any completed speech segment above the energy threshold. No
//! verification; suited to push-to-wake style setups or quiet rooms.

use std::time::Duration;

use serde::Deserialize;

use crate::audio::{AudioCapture, DetectorConfig, SpeechDetector, SpeechEvent};
use crate::config::TriggerConfig;
use crate::{Error, Result};

use super::{TriggerHandle, TriggerPort};

/// Audio processing chunk interval
const CHUNK_INTERVAL: Duration = Duration::from_millis(100);

/// Idle poll interval while paused
const PAUSED_INTERVAL: Duration = Duration::from_millis(50);

/// Engine-specific settings (from the trigger's `settings` table)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnergyEngineSettings {
    /// RMS energy threshold; defaults to the detector default
    pub threshold: Option<f32>,
}

/// Build a running energy trigger
///
/// # Errors
///
/// Returns an error if the settings table is malformed or the capture
/// device cannot be opened (fatal at startup, not retried).
pub fn build(config: &TriggerConfig) -> Result<TriggerHandle> {
    let settings: EnergyEngineSettings = config
        .settings
        .clone()
        .try_into()
        .map_err(|e| Error::Config(format!("trigger \"{}\": {e}", config.name)))?;

    let (handle, port) = TriggerHandle::channel(&config.name);

    // The capture stream lives on a dedicated thread (cpal streams are
    // not Send); startup failures are reported back synchronously.
    let (startup_tx, startup_rx) = std::sync::mpsc::channel::<Result<()>>();
    let name = config.name.clone();

    std::thread::Builder::new()
        .name(format!("trigger-{name}"))
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

            let detector_config = settings.threshold.map_or_else(DetectorConfig::default, |t| {
                DetectorConfig {
                    energy_threshold: t,
                    ..DetectorConfig::default()
                }
            });

            run_worker(capture, SpeechDetector::new(detector_config), &port, |_| true);
            tracing::debug!(trigger = %name, "energy worker exited");
        })
        .map_err(|e| Error::Trigger(format!("failed to spawn trigger worker: {e}")))?;

    startup_rx
        .recv_timeout(Duration::from_secs(5))
        .map_err(|_| Error::Trigger("trigger worker did not start".to_string()))??;

    Ok(handle)
}

/// Shared worker loop for the capture-thread engines
///
/// Feeds captured chunks through the detector while armed; `verify` is
/// called with each completed segment and decides whether to wake.
pub(super) fn run_worker(
    mut capture: AudioCapture,
    mut detector: SpeechDetector,
    port: &TriggerPort,
    verify: impl Fn(Vec<f32>) -> bool,
) {
    loop {
        if port.is_closed() {
            capture.stop();
            return;
        }

        if !port.is_armed() {
            // Release the microphone for the order listener
            if capture.is_capturing() {
                capture.stop();
                detector.reset();
            }
            std::thread::sleep(PAUSED_INTERVAL);
            continue;
        }

        if !capture.is_capturing() {
            if let Err(e) = capture.start() {
                tracing::error!(error = %e, "trigger capture failed, worker exiting");
                return;
            }
            capture.clear_buffer();
        }

        std::thread::sleep(CHUNK_INTERVAL);
        let samples = capture.take_buffer();

        if detector.process(&samples) == SpeechEvent::SegmentComplete {
            let segment = detector.take_segment();
            // The armed flag may have flipped during the segment
            if port.is_armed() && verify(segment) {
                port.send_wake();
            }
            detector.reset();
        }
    }
}
