//! Energy-based speech endpointing
//!
//! A small state machine over RMS energy: idle until speech, accumulate
//! while speaking, complete the segment once trailing silence is long
//! enough. Used by the wake-word engines and by the order listener.

use super::SAMPLE_RATE;

/// Default minimum audio energy to consider speech
pub const DEFAULT_ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to accept a segment (samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Trailing silence that ends an utterance (samples)
const SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

/// Detector tuning
#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    /// RMS energy above which a chunk counts as speech
    pub energy_threshold: f32,

    /// Minimum accepted segment length in samples
    pub min_speech_samples: usize,

    /// Trailing silence that completes a segment, in samples
    pub silence_samples: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            energy_threshold: DEFAULT_ENERGY_THRESHOLD,
            min_speech_samples: MIN_SPEECH_SAMPLES,
            silence_samples: SILENCE_SAMPLES,
        }
    }
}

impl DetectorConfig {
    /// Config with a threshold calibrated from ambient noise
    ///
    /// The threshold is set a fixed factor above the measured ambient RMS,
    /// floored at the default so a dead-silent room doesn't trigger on
    /// noise.
    #[must_use]
    pub fn calibrated(ambient_rms: f32) -> Self {
        Self {
            energy_threshold: (ambient_rms * 2.5).max(DEFAULT_ENERGY_THRESHOLD),
            ..Self::default()
        }
    }
}

/// Outcome of feeding one chunk of samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Nothing of note
    None,
    /// Speech started, accumulating
    Started,
    /// A complete speech segment is available
    SegmentComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Listening,
}

/// Accumulates speech segments from a stream of audio chunks
pub struct SpeechDetector {
    config: DetectorConfig,
    state: State,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
}

impl SpeechDetector {
    /// Create a detector with the given tuning
    #[must_use]
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            state: State::Idle,
            speech_buffer: Vec::new(),
            silence_counter: 0,
        }
    }

    /// Feed one chunk of samples, returning what happened
    pub fn process(&mut self, samples: &[f32]) -> SpeechEvent {
        let energy = rms_energy(samples);
        let is_speech = energy > self.config.energy_threshold;

        match self.state {
            State::Idle => {
                if is_speech {
                    self.state = State::Listening;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected");
                    return SpeechEvent::Started;
                }
                SpeechEvent::None
            }
            State::Listening => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.silence_counter > self.config.silence_samples
                    && self.speech_buffer.len() > self.config.min_speech_samples
                {
                    tracing::debug!(samples = self.speech_buffer.len(), "speech segment complete");
                    self.state = State::Idle;
                    return SpeechEvent::SegmentComplete;
                }

                // Too much silence without enough speech: discard
                if self.silence_counter > self.config.silence_samples * 2 {
                    tracing::trace!("segment timeout, resetting");
                    self.reset();
                }

                SpeechEvent::None
            }
        }
    }

    /// Take the accumulated segment, clearing the buffer
    pub fn take_segment(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.speech_buffer)
    }

    /// Discard any accumulated audio and return to idle
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.speech_buffer.clear();
        self.silence_counter = 0;
    }

    /// Seconds of audio a chunk represents at the capture rate
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn chunk_secs(samples: usize) -> f32 {
        samples as f32 / SAMPLE_RATE as f32
    }
}

/// RMS energy of a chunk of samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
