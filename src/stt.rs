//! Speech-to-text engine adapters
//!
//! The order listener and the hotword trigger engine feed captured WAV
//! audio through a [`Transcriber`]; the backend is selected once at
//! startup from `Settings.stt.engine`.

use crate::config::SttSettings;
use crate::{Error, Result};

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// STT provider backend
#[derive(Clone, Copy, Debug)]
enum SttProvider {
    Whisper,
    Deepgram,
}

/// Transcribes speech to text via a configured provider
#[derive(Debug)]
pub struct Transcriber {
    client: reqwest::Client,
    api_key: String,
    model: String,
    provider: SttProvider,
}

impl Transcriber {
    /// Build a transcriber from the configured STT engine
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` on an unknown engine name or missing API key
    pub fn from_settings(settings: &SttSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                Error::Config(format!("stt.api_key required for engine \"{}\"", settings.engine))
            })?;

        let provider = match settings.engine.as_str() {
            "whisper" => SttProvider::Whisper,
            "deepgram" => SttProvider::Deepgram,
            other => {
                return Err(Error::Config(format!("unknown STT engine \"{other}\"")));
            }
        };

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: settings.model.clone(),
            provider,
        })
    }

    /// Transcribe WAV audio to text
    ///
    /// # Errors
    ///
    /// Returns error if the provider request fails
    pub async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(audio).await,
            SttProvider::Deepgram => self.transcribe_deepgram(audio).await,
        }
    }

    /// Transcribe using OpenAI Whisper
    async fn transcribe_whisper(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await?;
        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Deepgram transcription");

        let url = format!(
            "https://api.deepgram.com/v1/listen?model={}&punctuate=true",
            self.model
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await?;

        let transcript = result
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.clone())
            .unwrap_or_default();

        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(engine: &str, api_key: Option<&str>) -> SttSettings {
        SttSettings {
            engine: engine.to_string(),
            model: "whisper-1".to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    #[test]
    fn unknown_engine_is_rejected() {
        let err = Transcriber::from_settings(&settings("kaldi", Some("key"))).unwrap_err();
        assert!(err.to_string().contains("kaldi"));
    }

    #[test]
    fn missing_api_key_is_rejected() {
        assert!(Transcriber::from_settings(&settings("whisper", None)).is_err());
        assert!(Transcriber::from_settings(&settings("whisper", Some(""))).is_err());
    }

    #[test]
    fn known_engines_construct() {
        assert!(Transcriber::from_settings(&settings("whisper", Some("key"))).is_ok());
        assert!(Transcriber::from_settings(&settings("deepgram", Some("key"))).is_ok());
    }
}
