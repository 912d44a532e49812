//! Error types for the Lyrebird runtime

use thiserror::Error;

/// Result type alias for Lyrebird operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Lyrebird runtime
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (fatal at startup)
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Trigger detector error
    #[error("trigger error: {0}")]
    Trigger(String),

    /// Order listener error
    #[error("listener error: {0}")]
    Listener(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
