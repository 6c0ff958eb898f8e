//! Speech synthesis backends

use std::time::Duration;

use async_trait::async_trait;

use super::voices::{InvalidVoiceError, Voice};
use crate::audio::AudioFormat;
use crate::config::SpeechConfig;

/// One synthesis call: a chunk of text in one voice
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    pub text: &'a str,
    pub voice: &'a Voice,
    pub format: AudioFormat,
    pub bitrate_kbps: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error(transparent)]
    InvalidVoice(#[from] InvalidVoiceError),

    #[error("Backend cannot produce {format} at {bitrate_kbps} kbps")]
    UnsupportedFormat { format: AudioFormat, bitrate_kbps: u32 },

    #[error("Synthesis request failed: {0}")]
    Request(String),

    #[error("Synthesis backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Synthesis backend returned no audio for chunk {0}")]
    EmptyAudio(usize),

    #[error("Failed to spool audio for chunk {index}: {source}")]
    Spool {
        index: usize,
        #[source]
        source: std::io::Error,
    },
}

/// External text-to-speech service
///
/// Calls are independent and may run concurrently; the backend keeps no
/// session state between them.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Synthesize `request.text`, returning encoded audio in `request.format`
    async fn synthesize(&self, request: SynthesisRequest<'_>) -> Result<Vec<u8>, SynthesisError>;
}

/// Azure Cognitive Services compatible REST backend
///
/// Posts SSML and selects the output encoding via `X-Microsoft-OutputFormat`.
pub struct AzureSpeechBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl AzureSpeechBackend {
    pub fn new(config: &SpeechConfig) -> Result<Self, SynthesisError> {
        Self::with_timeout(&config.endpoint, &config.api_key, config.timeout)
    }

    pub fn with_timeout(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self, SynthesisError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SynthesisError::Request(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

/// SSML document for one chunk
pub fn build_ssml(text: &str, voice: &Voice) -> String {
    format!(
        "<speak version='1.0' xml:lang='{}'><voice name='{}'>{}</voice></speak>",
        voice.locale,
        voice.id,
        html_escape::encode_text(text)
    )
}

#[async_trait]
impl SpeechBackend for AzureSpeechBackend {
    fn name(&self) -> &'static str {
        "azure"
    }

    async fn synthesize(&self, request: SynthesisRequest<'_>) -> Result<Vec<u8>, SynthesisError> {
        let output_format = request
            .format
            .backend_output_format(request.bitrate_kbps)
            .ok_or(SynthesisError::UnsupportedFormat {
                format: request.format,
                bitrate_kbps: request.bitrate_kbps,
            })?;

        let response = self
            .client
            .post(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", output_format)
            .header(reqwest::header::USER_AGENT, "audiobook-server")
            .body(build_ssml(request.text, request.voice))
            .send()
            .await
            .map_err(|e| SynthesisError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Request(format!("Failed to read audio: {}", e)))?;

        Ok(audio.to_vec())
    }
}
