//! OCR Service
//!
//! Orchestrates OCR providers with ordered fallback.

use std::sync::Arc;

use super::{
    provider::{OcrProviderTrait, OllamaProvider, TesseractProvider},
    types::{OcrError, OcrProvider, OcrResult},
};

/// OCR service configuration
#[derive(Debug, Clone)]
pub struct OcrServiceConfig {
    /// Preferred provider order
    pub providers: Vec<OcrProvider>,
    /// Ollama base URL
    pub ollama_url: String,
    /// Ollama model name
    pub ollama_model: String,
    /// Default OCR language (Tesseract language code)
    pub default_language: String,
}

impl Default for OcrServiceConfig {
    fn default() -> Self {
        Self {
            providers: vec![OcrProvider::Tesseract, OcrProvider::Ollama],
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llava".to_string(),
            default_language: "spa".to_string(),
        }
    }
}

/// OCR service for processing scanned PDF pages
pub struct OcrService {
    default_language: String,
    providers: Vec<Arc<dyn OcrProviderTrait>>,
}

impl OcrService {
    /// Create a new OCR service with providers in configured order
    pub fn new(config: OcrServiceConfig) -> Self {
        let providers = config
            .providers
            .iter()
            .map(|provider| -> Arc<dyn OcrProviderTrait> {
                match provider {
                    OcrProvider::Tesseract => Arc::new(TesseractProvider::new(&config.default_language)),
                    OcrProvider::Ollama => {
                        Arc::new(OllamaProvider::new(&config.ollama_url, &config.ollama_model))
                    }
                }
            })
            .collect();

        Self {
            default_language: config.default_language,
            providers,
        }
    }

    /// Create a service over explicit provider instances
    pub fn with_providers(default_language: &str, providers: Vec<Arc<dyn OcrProviderTrait>>) -> Self {
        Self {
            default_language: default_language.to_string(),
            providers,
        }
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Get available providers
    pub async fn available_providers(&self) -> Vec<OcrProvider> {
        self.session()
            .await
            .providers
            .iter()
            .map(|provider| provider.provider_type())
            .collect()
    }

    /// Probe every provider once; the returned session reuses the answer
    /// for all pages of one document
    pub async fn session(&self) -> OcrSession<'_> {
        let mut providers = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            if provider.is_available().await {
                providers.push(provider.clone());
            } else {
                tracing::debug!(provider = %provider.provider_type(), "OCR provider unavailable");
            }
        }

        OcrSession {
            default_language: &self.default_language,
            providers,
        }
    }

    /// Perform OCR on a single page image, probing providers first
    pub async fn recognize(
        &self,
        image_data: &[u8],
        language: Option<&str>,
    ) -> Result<OcrResult, OcrError> {
        self.session().await.recognize(image_data, language).await
    }
}

/// Providers found available at the start of one extraction
pub struct OcrSession<'a> {
    default_language: &'a str,
    providers: Vec<Arc<dyn OcrProviderTrait>>,
}

impl OcrSession<'_> {
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Perform OCR on a page image, trying providers in order
    pub async fn recognize(
        &self,
        image_data: &[u8],
        language: Option<&str>,
    ) -> Result<OcrResult, OcrError> {
        let lang = language.unwrap_or(self.default_language);
        let mut last_error = None;

        for provider in &self.providers {
            match provider.recognize(image_data, Some(lang)).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!(
                        "OCR provider {} failed: {}, trying next",
                        provider.provider_type(),
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            OcrError::ProviderNotAvailable("No OCR providers available".to_string())
        }))
    }
}
