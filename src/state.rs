//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::extract::{ExtractorConfig, TextExtractor};
use crate::jobs::{CoordinatorSettings, PipelineCoordinator};
use crate::ocr::OcrService;
use crate::pdf::{MuPdfSource, PdfSource};
use crate::speech::{AzureSpeechBackend, SpeechBackend, SpeechSynthesizer, SynthesisError, VoiceRegistry};
use crate::storage::{self, JobStorage, StorageError};

/// Error type for state initialization
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to initialize speech backend: {0}")]
    Speech(#[from] SynthesisError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// External collaborators the pipeline is built from
pub struct Backends {
    pub pdf: Arc<dyn PdfSource>,
    pub ocr: Arc<OcrService>,
    pub speech: Arc<dyn SpeechBackend>,
    pub storage: Arc<dyn JobStorage>,
}

impl Backends {
    /// MuPDF, the configured OCR chain, the REST speech backend and the configured storage
    pub fn from_config(config: &Config) -> Result<Self, StateError> {
        Ok(Self {
            pdf: Arc::new(MuPdfSource::new()),
            ocr: Arc::new(OcrService::new(config.ocr.service_config())),
            speech: Arc::new(AzureSpeechBackend::new(&config.speech)?),
            storage: storage::from_config(&config.storage, config.pipeline.output_format),
        })
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    storage: Arc<dyn JobStorage>,
    coordinator: PipelineCoordinator,
}

impl AppState {
    /// Wire the pipeline from `backends`; storage must already be initialised
    pub fn new(config: Config, backends: Backends) -> Self {
        let pipeline = &config.pipeline;

        let extractor = TextExtractor::new(
            backends.pdf,
            backends.ocr,
            ExtractorConfig {
                ocr_dpi: pipeline.ocr_dpi,
                sufficiency_threshold_chars: pipeline.sufficiency_threshold_chars,
                ocr_language: Some(config.ocr.language.clone()),
                page_label: pipeline.page_label.clone(),
            },
        );

        let mut synthesizer = SpeechSynthesizer::new(
            backends.speech,
            Arc::new(VoiceRegistry::spanish()),
            pipeline.output_format,
            pipeline.output_bitrate_kbps,
        );
        if let Some(dir) = backends.storage.temp_dir() {
            synthesizer = synthesizer.with_spool_dir(dir);
        }

        let coordinator = PipelineCoordinator::new(
            backends.storage.clone(),
            extractor,
            synthesizer,
            CoordinatorSettings {
                max_chunk_chars: pipeline.max_chunk_chars,
                max_text_chars: pipeline.max_text_chars,
                synthesis_concurrency: pipeline.synthesis_concurrency,
            },
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                storage: backends.storage,
                coordinator,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn coordinator(&self) -> &PipelineCoordinator {
        &self.inner.coordinator
    }

    pub fn storage(&self) -> &Arc<dyn JobStorage> {
        &self.inner.storage
    }
}
