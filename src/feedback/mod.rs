//! Audible feedback: spoken phrases and sound files
//!
//! The orchestrator and the REST control surface both talk to a
//! [`Feedback`] provider; it never calls back into either. Provider
//! failures are logged by the caller and never abort the cycle.

pub mod selector;
mod tts;

use std::path::Path;

use async_trait::async_trait;

use crate::config::{FeedbackSet, Settings};
use crate::{Error, Result};

pub use selector::{pick_random, resolve_sound_path};
pub use tts::TextToSpeech;

/// Produces audible output from text or sound references
#[async_trait]
pub trait Feedback: Send + Sync {
    /// Speak the given text aloud
    async fn speak(&self, text: &str) -> Result<()>;

    /// Play a sound file (existence is validated here, at play time)
    async fn play_sound(&self, path: &Path) -> Result<()>;
}

/// Real feedback provider: TTS synthesis plus speaker playback
///
/// TTS is optional; a deployment with sound files only still works, and
/// `speak` reports an error the caller logs.
pub struct SpokenFeedback {
    tts: Option<TextToSpeech>,
}

impl SpokenFeedback {
    /// Build from settings; TTS is enabled when an API key is configured
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` on an unknown TTS engine name
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let tts = if settings.tts.api_key.as_deref().unwrap_or_default().is_empty() {
            tracing::warn!("no TTS API key configured, spoken feedback disabled");
            None
        } else {
            Some(TextToSpeech::from_settings(&settings.tts)?)
        };

        Ok(Self { tts })
    }
}

#[async_trait]
impl Feedback for SpokenFeedback {
    async fn speak(&self, text: &str) -> Result<()> {
        let tts = self
            .tts
            .as_ref()
            .ok_or_else(|| Error::Tts("no TTS engine configured".to_string()))?;

        let audio = tts.synthesize(text).await?;

        // cpal streams are not Send; keep device work on a blocking thread
        tokio::task::spawn_blocking(move || {
            let playback = crate::audio::AudioPlayback::new()?;
            playback.play_mp3(&audio)
        })
        .await
        .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }

    async fn play_sound(&self, path: &Path) -> Result<()> {
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let playback = crate::audio::AudioPlayback::new()?;
            playback.play_file(&path)
        })
        .await
        .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }
}

/// Announce one feedback slot: a random phrase if any are configured,
/// otherwise a random sound file
///
/// An empty slot is a silent no-op.
///
/// # Errors
///
/// Returns the provider error; callers log it and keep cycling.
pub async fn announce(
    feedback: &dyn Feedback,
    set: &FeedbackSet,
    sound_dir: &Path,
) -> Result<()> {
    // Selection happens outside the await so the rng stays thread-local
    let choice = {
        let mut rng = rand::thread_rng();
        if let Some(phrase) = pick_random(&set.answers, &mut rng) {
            Some(Announcement::Phrase(phrase.clone()))
        } else {
            pick_random(&set.sounds, &mut rng)
                .map(|sound| Announcement::Sound(resolve_sound_path(sound, sound_dir)))
        }
    };

    match choice {
        Some(Announcement::Phrase(text)) => feedback.speak(&text).await,
        Some(Announcement::Sound(path)) => {
            tracing::debug!(path = %path.display(), "selected sound");
            feedback.play_sound(&path).await
        }
        None => Ok(()),
    }
}

enum Announcement {
    Phrase(String),
    Sound(std::path::PathBuf),
}
