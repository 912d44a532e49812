//! Configuration management for the Lyrebird runtime

pub mod file;

use std::path::{Path, PathBuf};

use crate::{Error, Result};

pub use file::{LyrebirdConfigFile, config_file_path};

/// Default port for the REST control surface
const DEFAULT_API_PORT: u16 = 5000;

/// Default bounded wait for an order after the wake answer
const DEFAULT_ORDER_TIMEOUT_SECS: u64 = 10;

/// Immutable runtime settings
///
/// Loaded once at startup and shared read-only for the process lifetime.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Name of the trigger used to wake the assistant
    pub default_trigger: String,

    /// Configured wake-word triggers, in file order (first match wins)
    pub triggers: Vec<TriggerConfig>,

    /// Feedback played when the assistant is armed and listening
    pub on_ready: FeedbackSet,

    /// Feedback played when the wake word is detected
    pub on_wake: FeedbackSet,

    /// Root directory for relative sound paths
    pub sound_dir: PathBuf,

    /// Seconds to wait for an order after the wake answer (0 = unbounded)
    pub order_timeout_secs: u64,

    /// Speech-to-text settings
    pub stt: SttSettings,

    /// Text-to-speech settings
    pub tts: TtsSettings,

    /// REST control surface settings
    pub rest_api: RestApiSettings,

    /// Built-in voice commands
    pub commands: Vec<CommandConfig>,
}

/// One wake-word trigger entry
#[derive(Debug, Clone)]
pub struct TriggerConfig {
    /// Trigger name, matched against `Settings::default_trigger`
    pub name: String,

    /// Engine identifier resolved through the trigger registry
    pub engine: String,

    /// Engine-specific settings, deserialized by the selected engine
    pub settings: toml::Table,
}

/// Spoken phrases and/or sound files for a feedback slot
///
/// A non-empty `answers` set takes priority over `sounds`.
#[derive(Debug, Clone, Default)]
pub struct FeedbackSet {
    pub answers: Vec<String>,
    pub sounds: Vec<String>,
}

impl FeedbackSet {
    /// True when neither phrases nor sounds are configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty() && self.sounds.is_empty()
    }
}

/// Speech-to-text settings
#[derive(Debug, Clone)]
pub struct SttSettings {
    /// Engine identifier ("whisper" or "deepgram")
    pub engine: String,

    /// Model identifier
    pub model: String,

    /// API key for the selected provider
    pub api_key: Option<String>,
}

/// Text-to-speech settings
#[derive(Debug, Clone)]
pub struct TtsSettings {
    /// Engine identifier ("openai" or "elevenlabs")
    pub engine: String,

    /// Model identifier
    pub model: String,

    /// Voice identifier
    pub voice: String,

    /// Speed multiplier (0.25 to 4.0)
    pub speed: f64,

    /// API key for the selected provider
    pub api_key: Option<String>,
}

/// REST control surface settings
#[derive(Debug, Clone)]
pub struct RestApiSettings {
    pub enabled: bool,
    pub port: u16,
    /// Allowed CORS origin ("*" for any)
    pub allowed_origin: String,
}

/// One built-in voice command
#[derive(Debug, Clone)]
pub struct CommandConfig {
    pub name: String,
    pub patterns: Vec<String>,
    pub say: Option<String>,
}

impl Settings {
    /// Load settings from the standard config path with env-var overlay
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the resulting settings are invalid.
    pub fn load() -> Result<Self> {
        Self::from_file(file::load_config_file())
    }

    /// Load settings from an explicit config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the settings are
    /// invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::from_file(file::load_config_file_from(path)?)
    }

    /// Build validated settings from a parsed config file
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` on invalid settings.
    pub fn from_file(file: LyrebirdConfigFile) -> Result<Self> {
        let triggers: Vec<TriggerConfig> = file
            .triggers
            .into_iter()
            .map(|t| TriggerConfig {
                name: t.name,
                engine: t.engine.unwrap_or_else(|| "energy".to_string()),
                settings: t.settings,
            })
            .collect();

        let stt = SttSettings {
            engine: file.stt.engine.unwrap_or_else(|| "whisper".to_string()),
            model: file.stt.model.unwrap_or_else(|| "whisper-1".to_string()),
            api_key: file.stt.api_key.or_else(|| {
                std::env::var("OPENAI_API_KEY")
                    .or_else(|_| std::env::var("DEEPGRAM_API_KEY"))
                    .ok()
            }),
        };

        let tts = TtsSettings {
            engine: file.tts.engine.unwrap_or_else(|| "openai".to_string()),
            model: file.tts.model.unwrap_or_else(|| "tts-1".to_string()),
            voice: file.tts.voice.unwrap_or_else(|| "alloy".to_string()),
            speed: file.tts.speed.unwrap_or(1.0),
            api_key: file.tts.api_key.or_else(|| {
                std::env::var("OPENAI_API_KEY")
                    .or_else(|_| std::env::var("ELEVENLABS_API_KEY"))
                    .ok()
            }),
        };

        let settings = Self {
            default_trigger: file.default_trigger.unwrap_or_default(),
            triggers,
            on_ready: FeedbackSet {
                answers: file.on_ready.answers,
                sounds: file.on_ready.sounds,
            },
            on_wake: FeedbackSet {
                answers: file.on_wake.answers,
                sounds: file.on_wake.sounds,
            },
            sound_dir: file.sound_dir.map_or_else(default_sound_dir, PathBuf::from),
            order_timeout_secs: file
                .order_timeout_secs
                .unwrap_or(DEFAULT_ORDER_TIMEOUT_SECS),
            stt,
            tts,
            rest_api: RestApiSettings {
                enabled: file.rest_api.enabled.unwrap_or(false),
                port: file.rest_api.port.unwrap_or(DEFAULT_API_PORT),
                allowed_origin: file
                    .rest_api
                    .allowed_origin
                    .unwrap_or_else(|| "*".to_string()),
            },
            commands: file
                .commands
                .into_iter()
                .map(|c| CommandConfig {
                    name: c.name,
                    patterns: c.patterns,
                    say: c.say,
                })
                .collect(),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Find the configured trigger matching `default_trigger` (first match
    /// wins)
    #[must_use]
    pub fn default_trigger_config(&self) -> Option<&TriggerConfig> {
        self.triggers.iter().find(|t| t.name == self.default_trigger)
    }

    fn validate(&self) -> Result<()> {
        if self.default_trigger.is_empty() {
            return Err(Error::Config("default_trigger is required".to_string()));
        }

        if self.default_trigger_config().is_none() {
            return Err(Error::Config(format!(
                "no configured trigger matches default_trigger \"{}\"",
                self.default_trigger
            )));
        }

        if !(0.25..=4.0).contains(&self.tts.speed) {
            return Err(Error::Config(format!(
                "tts.speed {} out of range (0.25 to 4.0)",
                self.tts.speed
            )));
        }

        if self.rest_api.enabled && self.rest_api.port == 0 {
            return Err(Error::Config("rest_api.port must be non-zero".to_string()));
        }

        for command in &self.commands {
            if command.patterns.is_empty() {
                return Err(Error::Config(format!(
                    "command \"{}\" has no patterns",
                    command.name
                )));
            }
        }

        Ok(())
    }
}

/// Default sound directory: `~/.local/share/lyrebird/sounds` (or `./sounds`)
fn default_sound_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("sounds"),
        |d| d.data_dir().join("lyrebird").join("sounds"),
    )
}
