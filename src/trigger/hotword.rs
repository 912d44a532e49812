//! Hotword wake engine
//!
//! Energy endpointing plus transcript verification: a completed speech
//! segment only wakes the assistant when its transcription contains one
//! of the configured phrases.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::audio::{AudioCapture, DetectorConfig, SAMPLE_RATE, SpeechDetector, samples_to_wav};
use crate::config::TriggerConfig;
use crate::stt::Transcriber;
use crate::{Error, Result};

use super::{TriggerHandle, energy::run_worker};

/// Engine-specific settings (from the trigger's `settings` table)
#[derive(Debug, Clone, Deserialize)]
pub struct HotwordEngineSettings {
    /// Phrases that wake the assistant (e.g. "hey lyrebird")
    pub phrases: Vec<String>,

    /// RMS energy threshold; defaults to the detector default
    pub threshold: Option<f32>,
}

/// Build a running hotword trigger
///
/// # Errors
///
/// Returns an error if the settings are malformed, no phrase is
/// configured, or the capture device cannot be opened.
pub fn build(config: &TriggerConfig, transcriber: Arc<Transcriber>) -> Result<TriggerHandle> {
    let settings: HotwordEngineSettings = config
        .settings
        .clone()
        .try_into()
        .map_err(|e| Error::Config(format!("trigger \"{}\": {e}", config.name)))?;

    let phrases: Vec<String> = settings
        .phrases
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();

    if phrases.is_empty() {
        return Err(Error::Config(format!(
            "trigger \"{}\" has no hotword phrases",
            config.name
        )));
    }

    // Verification transcribes on the worker thread; capture the runtime
    // handle so the async client can be driven from there.
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|_| Error::Trigger("hotword engine requires a tokio runtime".to_string()))?;

    let (handle, port) = TriggerHandle::channel(&config.name);
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

            run_worker(capture, SpeechDetector::new(detector_config), &port, |segment| {
                verify_segment(&segment, &phrases, &transcriber, &runtime)
            });
            tracing::debug!(trigger = %name, "hotword worker exited");
        })
        .map_err(|e| Error::Trigger(format!("failed to spawn trigger worker: {e}")))?;

    startup_rx
        .recv_timeout(Duration::from_secs(5))
        .map_err(|_| Error::Trigger("trigger worker did not start".to_string()))??;

    Ok(handle)
}

/// Transcribe a segment and check it against the hotword phrases
fn verify_segment(
    segment: &[f32],
    phrases: &[String],
    transcriber: &Transcriber,
    runtime: &tokio::runtime::Handle,
) -> bool {
    let wav = match samples_to_wav(segment, SAMPLE_RATE) {
        Ok(wav) => wav,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode hotword segment");
            return false;
        }
    };

    let transcript = match runtime.block_on(transcriber.transcribe(&wav)) {
        Ok(transcript) => transcript.to_lowercase(),
        Err(e) => {
            tracing::warn!(error = %e, "hotword transcription failed");
            return false;
        }
    };

    let matched = phrases.iter().any(|p| transcript.contains(p.as_str()));
    if matched {
        tracing::info!(transcript = %transcript, "hotword detected");
    } else {
        tracing::trace!(transcript = %transcript, "no hotword in transcript");
    }
    matched
}
