//! Audio device handling
//!
//! Microphone capture, speaker playback, and energy-based speech
//! endpointing. The trigger engines and the order listener both read from
//! [`AudioCapture`]; the orchestrator's mutual-exclusion invariant
//! guarantees only one of them consumes the device at a time.

mod capture;
mod detector;
mod playback;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use detector::{DetectorConfig, SpeechDetector, SpeechEvent, rms_energy};
pub use playback::AudioPlayback;
