//! Server configuration
//!
//! Loaded from the process environment (optionally seeded from a `.env` file
//! by `dotenvy` in `main`). Every value has a default so the server starts
//! with no environment at all.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::audio::AudioFormat;
use crate::ocr::{OcrProvider, OcrServiceConfig};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Unsupported(String),
}

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
    pub ocr: OcrConfig,
    pub speech: SpeechConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Upload body limit in bytes
    pub max_upload_bytes: usize,
}

/// Where job artifacts live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "disk" => Ok(Self::Local),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root for `uploads/`, `audio/` and `temp/`
    pub data_dir: PathBuf,
}

impl StorageConfig {
    /// Directory holding per-chunk spool files
    pub fn temp_dir(&self) -> PathBuf {
        self.data_dir.join("temp")
    }
}

/// Knobs consumed by the extraction + synthesis pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound of characters per synthesis call
    pub max_chunk_chars: usize,
    /// Raster resolution for OCR
    pub ocr_dpi: u32,
    /// Direct extraction is accepted only above this many trimmed characters
    pub sufficiency_threshold_chars: usize,
    /// Encode bitrate of the final artifact (kbps)
    pub output_bitrate_kbps: u32,
    pub output_format: AudioFormat,
    /// Optional hard truncation applied before chunking
    pub max_text_chars: Option<usize>,
    /// Concurrent synthesis calls per job (1 = sequential)
    pub synthesis_concurrency: usize,
    /// Characters returned as preview on upload
    pub preview_chars: usize,
    /// Word used in the marker written before each page's text
    pub page_label: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 4000,
            ocr_dpi: 200,
            sufficiency_threshold_chars: 100,
            output_bitrate_kbps: 128,
            output_format: AudioFormat::Mp3,
            max_text_chars: None,
            synthesis_concurrency: 1,
            preview_chars: 500,
            page_label: "Página".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub providers: Vec<OcrProvider>,
    pub language: String,
    pub ollama_url: String,
    pub ollama_model: String,
}

impl OcrConfig {
    pub fn service_config(&self) -> OcrServiceConfig {
        OcrServiceConfig {
            providers: self.providers.clone(),
            ollama_url: self.ollama_url.clone(),
            ollama_model: self.ollama_model.clone(),
            default_language: self.language.clone(),
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        let defaults = OcrServiceConfig::default();
        Self {
            providers: defaults.providers,
            language: defaults.default_language,
            ollama_url: defaults.ollama_url,
            ollama_model: defaults.ollama_model,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Full synthesis endpoint URL
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl SpeechConfig {
    pub fn endpoint_for_region(region: &str) -> String {
        format!(
            "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
            region
        )
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::endpoint_for_region("westeurope"),
            api_key: String::new(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 8000,
                max_upload_bytes: 100 * 1024 * 1024,
            },
            storage: StorageConfig {
                backend: StorageBackend::Local,
                data_dir: PathBuf::from("data"),
            },
            pipeline: PipelineConfig::default(),
            ocr: OcrConfig::default(),
            speech: SpeechConfig::default(),
        }
    }
}

impl Config {
    /// Build configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let env = Lookup(&lookup);

        let server = ServerConfig {
            port: env.parse_or("SERVER_PORT", defaults.server.port)?,
            max_upload_bytes: env.parse_or("MAX_UPLOAD_BYTES", defaults.server.max_upload_bytes)?,
        };

        let storage = StorageConfig {
            backend: env.parse_or("STORAGE_BACKEND", defaults.storage.backend)?,
            data_dir: env
                .get("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage.data_dir),
        };

        let pipeline_defaults = defaults.pipeline;
        let pipeline = PipelineConfig {
            max_chunk_chars: env.parse_or("MAX_CHUNK_CHARS", pipeline_defaults.max_chunk_chars)?,
            ocr_dpi: env.parse_or("OCR_DPI", pipeline_defaults.ocr_dpi)?,
            sufficiency_threshold_chars: env.parse_or(
                "SUFFICIENCY_THRESHOLD_CHARS",
                pipeline_defaults.sufficiency_threshold_chars,
            )?,
            output_bitrate_kbps: env
                .parse_or("OUTPUT_BITRATE_KBPS", pipeline_defaults.output_bitrate_kbps)?,
            output_format: env.parse_or("AUDIO_CONTAINER", pipeline_defaults.output_format)?,
            max_text_chars: env.parse_opt("MAX_TEXT_CHARS")?,
            synthesis_concurrency: env.parse_or(
                "SYNTHESIS_CONCURRENCY",
                pipeline_defaults.synthesis_concurrency,
            )?,
            preview_chars: env.parse_or("PREVIEW_CHARS", pipeline_defaults.preview_chars)?,
            page_label: env.get("PAGE_LABEL").unwrap_or(pipeline_defaults.page_label),
        };

        let ocr_defaults = defaults.ocr;
        let providers = match env.get("OCR_PROVIDERS") {
            Some(raw) => parse_providers(&raw)?,
            None => ocr_defaults.providers,
        };
        let ocr = OcrConfig {
            providers,
            language: env.get("OCR_LANGUAGE").unwrap_or(ocr_defaults.language),
            ollama_url: env.get("OLLAMA_URL").unwrap_or(ocr_defaults.ollama_url),
            ollama_model: env.get("OLLAMA_MODEL").unwrap_or(ocr_defaults.ollama_model),
        };

        let speech_defaults = defaults.speech;
        let endpoint = match (env.get("SPEECH_ENDPOINT"), env.get("SPEECH_REGION")) {
            (Some(endpoint), _) => endpoint,
            (None, Some(region)) => SpeechConfig::endpoint_for_region(&region),
            (None, None) => speech_defaults.endpoint,
        };
        let speech = SpeechConfig {
            endpoint,
            api_key: env.get("SPEECH_KEY").unwrap_or_default(),
            timeout: Duration::from_secs(
                env.parse_or("SPEECH_TIMEOUT_SECS", speech_defaults.timeout.as_secs())?,
            ),
        };

        let config = Self {
            server,
            storage,
            pipeline,
            ocr,
            speech,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pipeline;
        if p.max_chunk_chars == 0 {
            return Err(invalid("MAX_CHUNK_CHARS", "0", "must be at least 1"));
        }
        if p.ocr_dpi == 0 {
            return Err(invalid("OCR_DPI", "0", "must be at least 1"));
        }
        if p.max_text_chars == Some(0) {
            return Err(invalid("MAX_TEXT_CHARS", "0", "must be at least 1 when set"));
        }
        if p.synthesis_concurrency == 0 {
            return Err(invalid("SYNTHESIS_CONCURRENCY", "0", "must be at least 1"));
        }
        if p.output_format.backend_output_format(p.output_bitrate_kbps).is_none() {
            return Err(ConfigError::Unsupported(format!(
                "the synthesis backend cannot produce {} at {} kbps",
                p.output_format, p.output_bitrate_kbps
            )));
        }
        Ok(())
    }
}

struct Lookup<'a, F>(&'a F);

impl<F> Lookup<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parse_opt(key)?.unwrap_or(default))
    }

    fn parse_opt<T>(&self, key: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e: T::Err| invalid(key, &raw, &e.to_string())),
        }
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_providers(raw: &str) -> Result<Vec<OcrProvider>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<OcrProvider>()
                .map_err(|e| invalid("OCR_PROVIDERS", raw, &e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = from_pairs(&[]).unwrap();

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.pipeline.max_chunk_chars, 4000);
        assert_eq!(config.pipeline.ocr_dpi, 200);
        assert_eq!(config.pipeline.sufficiency_threshold_chars, 100);
        assert_eq!(config.pipeline.output_bitrate_kbps, 128);
        assert_eq!(config.pipeline.output_format, AudioFormat::Mp3);
        assert_eq!(config.pipeline.max_text_chars, None);
        assert_eq!(config.pipeline.synthesis_concurrency, 1);
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.ocr.language, "spa");
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("MAX_CHUNK_CHARS", "2500"),
            ("MAX_TEXT_CHARS", "15000"),
            ("SYNTHESIS_CONCURRENCY", "4"),
            ("STORAGE_BACKEND", "memory"),
            ("OCR_PROVIDERS", "ollama"),
            ("SPEECH_REGION", "eastus"),
        ])
        .unwrap();

        assert_eq!(config.pipeline.max_chunk_chars, 2500);
        assert_eq!(config.pipeline.max_text_chars, Some(15000));
        assert_eq!(config.pipeline.synthesis_concurrency, 4);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.ocr.providers, vec![OcrProvider::Ollama]);
        assert_eq!(
            config.speech.endpoint,
            "https://eastus.tts.speech.microsoft.com/cognitiveservices/v1"
        );
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        let result = from_pairs(&[("MAX_CHUNK_CHARS", "0")]);
        assert!(matches!(result, Err(ConfigError::InvalidValue { key: "MAX_CHUNK_CHARS", .. })));
    }

    #[test]
    fn test_rejects_zero_text_limit() {
        let result = from_pairs(&[("MAX_TEXT_CHARS", "0")]);
        assert!(matches!(result, Err(ConfigError::InvalidValue { key: "MAX_TEXT_CHARS", .. })));

        assert_eq!(from_pairs(&[("MAX_TEXT_CHARS", "1")]).unwrap().pipeline.max_text_chars, Some(1));
    }

    #[test]
    fn test_page_label() {
        assert_eq!(from_pairs(&[]).unwrap().pipeline.page_label, "Página");
        assert_eq!(from_pairs(&[("PAGE_LABEL", "Page")]).unwrap().pipeline.page_label, "Page");
    }

    #[test]
    fn test_rejects_unparseable_number() {
        let result = from_pairs(&[("OCR_DPI", "high")]);
        assert!(matches!(result, Err(ConfigError::InvalidValue { key: "OCR_DPI", .. })));
    }

    #[test]
    fn test_rejects_unsupported_bitrate() {
        let result = from_pairs(&[("OUTPUT_BITRATE_KBPS", "127")]);
        assert!(matches!(result, Err(ConfigError::Unsupported(_))));
    }

    #[test]
    fn test_wav_bitrate_maps_to_pcm_rate() {
        let config = from_pairs(&[("AUDIO_CONTAINER", "wav"), ("OUTPUT_BITRATE_KBPS", "256")]).unwrap();
        assert_eq!(config.pipeline.output_format, AudioFormat::Wav);

        let result = from_pairs(&[("AUDIO_CONTAINER", "wav"), ("OUTPUT_BITRATE_KBPS", "160")]);
        assert!(matches!(result, Err(ConfigError::Unsupported(_))));
    }
}
