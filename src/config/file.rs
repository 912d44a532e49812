//! TOML configuration file loading
//!
//! Supports `~/.config/lyrebird/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct LyrebirdConfigFile {
    /// Name of the trigger used to wake the assistant
    #[serde(default)]
    pub default_trigger: Option<String>,

    /// Configured wake-word triggers
    #[serde(default)]
    pub triggers: Vec<TriggerFileConfig>,

    /// Feedback played when the assistant is armed and listening
    #[serde(default)]
    pub on_ready: FeedbackSetFileConfig,

    /// Feedback played when the wake word is detected
    #[serde(default)]
    pub on_wake: FeedbackSetFileConfig,

    /// Root directory for relative sound paths
    pub sound_dir: Option<String>,

    /// Seconds to wait for an order after the wake answer (0 = unbounded)
    pub order_timeout_secs: Option<u64>,

    /// Speech-to-text configuration
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Text-to-speech configuration
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// REST control surface configuration
    #[serde(default)]
    pub rest_api: RestApiFileConfig,

    /// Built-in voice commands
    #[serde(default)]
    pub commands: Vec<CommandFileConfig>,
}

/// One wake-word trigger entry
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerFileConfig {
    /// Trigger name, matched against `default_trigger`
    pub name: String,

    /// Engine identifier (e.g. "energy", "hotword")
    pub engine: Option<String>,

    /// Engine-specific settings, passed through opaquely
    #[serde(default)]
    pub settings: toml::Table,
}

/// Spoken phrases and/or sound files for a feedback slot
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackSetFileConfig {
    #[serde(default)]
    pub answers: Vec<String>,

    #[serde(default)]
    pub sounds: Vec<String>,
}

/// Speech-to-text configuration
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// Engine identifier ("whisper" or "deepgram")
    pub engine: Option<String>,

    /// Model identifier (e.g. "whisper-1", "nova-2")
    pub model: Option<String>,

    /// API key (env vars take precedence when unset)
    pub api_key: Option<String>,
}

/// Text-to-speech configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// Engine identifier ("openai" or "elevenlabs")
    pub engine: Option<String>,

    /// Model identifier (e.g. "tts-1")
    pub model: Option<String>,

    /// Voice identifier (e.g. "alloy")
    pub voice: Option<String>,

    /// Speed multiplier (0.25 to 4.0)
    pub speed: Option<f64>,

    /// API key (env vars take precedence when unset)
    pub api_key: Option<String>,
}

/// REST control surface configuration
#[derive(Debug, Default, Deserialize)]
pub struct RestApiFileConfig {
    pub enabled: Option<bool>,

    pub port: Option<u16>,

    /// Allowed CORS origin ("*" for any)
    pub allowed_origin: Option<String>,
}

/// One built-in voice command
#[derive(Debug, Clone, Deserialize)]
pub struct CommandFileConfig {
    pub name: String,

    /// Utterance substrings that select this command
    pub patterns: Vec<String>,

    /// Text spoken through the feedback provider when matched
    pub say: Option<String>,
}

/// Load a TOML config file from an explicit path
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed. Unlike the
/// standard-path loader, an explicit path must be valid.
pub fn load_config_file_from(path: &std::path::Path) -> crate::Result<LyrebirdConfigFile> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Load the TOML config file from the standard path
///
/// Returns `LyrebirdConfigFile::default()` if the file doesn't exist or
/// can't be parsed.
#[must_use]
pub fn load_config_file() -> LyrebirdConfigFile {
    let Some(path) = config_file_path() else {
        return LyrebirdConfigFile::default();
    };

    if !path.exists() {
        return LyrebirdConfigFile::default();
    }

    match load_config_file_from(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            LyrebirdConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/lyrebird/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("lyrebird").join("config.toml"))
}
