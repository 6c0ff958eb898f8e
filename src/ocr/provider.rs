//! OCR backends for rendered page images

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::types::{OcrError, OcrProvider, OcrResult};

/// A backend able to read text off one rendered page
#[async_trait]
pub trait OcrProviderTrait: Send + Sync {
    fn provider_type(&self) -> OcrProvider;

    /// Cheap probe run before each page; unavailable backends are skipped
    async fn is_available(&self) -> bool;

    /// Recognize the text of a PNG-encoded page
    async fn recognize(&self, image_data: &[u8], language: Option<&str>) -> Result<OcrResult, OcrError>;
}

/// Local `tesseract` binary, page image passed through a temp file
pub struct TesseractProvider {
    language: String,
}

impl TesseractProvider {
    /// Tesseract reports no page-level confidence on stdout
    const CONFIDENCE: f64 = 80.0;

    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
        }
    }

    fn page_args<'a>(&'a self, page: &'a std::path::Path, language: Option<&'a str>) -> Vec<&'a std::ffi::OsStr> {
        let language = language.unwrap_or(&self.language);
        [
            page.as_os_str(),
            "stdout".as_ref(),
            "-l".as_ref(),
            language.as_ref(),
            // LSTM engine, automatic page segmentation
            "--oem".as_ref(),
            "1".as_ref(),
            "--psm".as_ref(),
            "3".as_ref(),
        ]
        .to_vec()
    }
}

#[async_trait]
impl OcrProviderTrait for TesseractProvider {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Tesseract
    }

    async fn is_available(&self) -> bool {
        matches!(
            tokio::process::Command::new("tesseract").arg("--version").output().await,
            Ok(output) if output.status.success()
        )
    }

    async fn recognize(&self, image_data: &[u8], language: Option<&str>) -> Result<OcrResult, OcrError> {
        let page = tempfile::Builder::new()
            .prefix("page_")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrError::ProcessingError(format!("Failed to stage page image: {}", e)))?;
        tokio::fs::write(page.path(), image_data)
            .await
            .map_err(|e| OcrError::ProcessingError(format!("Failed to stage page image: {}", e)))?;

        let output = tokio::process::Command::new("tesseract")
            .args(self.page_args(page.path(), language))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| OcrError::ProcessingError(format!("Failed to run tesseract: {}", e)))?;

        if !output.status.success() {
            return Err(OcrError::ProcessingError(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(OcrResult {
            text: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            confidence: Self::CONFIDENCE,
            provider: OcrProvider::Tesseract,
        })
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    images: [String; 1],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Vision model served by a local Ollama instance
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    /// Language models give no confidence score
    const CONFIDENCE: f64 = 75.0;

    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    fn transcription_prompt(language: Option<&str>) -> String {
        let mut prompt = String::from(
            "Transcribe every word printed on this scanned book page, in reading order. \
             Reply with the transcription only. Reply with nothing if the page is blank.",
        );
        if let Some(language) = language {
            prompt.push_str(&format!(" The page is written in language '{}'.", language));
        }
        prompt
    }
}

#[async_trait]
impl OcrProviderTrait for OllamaProvider {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Ollama
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        matches!(self.client.get(url).send().await, Ok(r) if r.status().is_success())
    }

    async fn recognize(&self, image_data: &[u8], language: Option<&str>) -> Result<OcrResult, OcrError> {
        use base64::Engine;

        let request = GenerateRequest {
            model: &self.model,
            prompt: Self::transcription_prompt(language),
            images: [base64::engine::general_purpose::STANDARD.encode(image_data)],
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| OcrError::ApiError(format!("Ollama unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::ApiError(format!("Ollama returned {}: {}", status, body)));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| OcrError::ApiError(format!("Malformed Ollama response: {}", e)))?;

        Ok(OcrResult {
            text: generated.response.trim().to_string(),
            confidence: Self::CONFIDENCE,
            provider: OcrProvider::Ollama,
        })
    }
}

/// Scripted provider for service tests
#[cfg(test)]
pub struct MockProvider {
    pub response: Result<OcrResult, String>,
    pub available: bool,
}

#[cfg(test)]
#[async_trait]
impl OcrProviderTrait for MockProvider {
    fn provider_type(&self) -> OcrProvider {
        self.response
            .as_ref()
            .map(|result| result.provider)
            .unwrap_or(OcrProvider::Ollama)
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn recognize(&self, _image_data: &[u8], _language: Option<&str>) -> Result<OcrResult, OcrError> {
        self.response.clone().map_err(OcrError::ProcessingError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tesseract_language_override() {
        let provider = TesseractProvider::new("spa");
        let page = std::path::Path::new("/tmp/page.png");

        let args = provider.page_args(page, None);
        assert_eq!(args[3], "spa");
        assert_eq!(args[1], "stdout");

        let args = provider.page_args(page, Some("spa+eng"));
        assert_eq!(args[3], "spa+eng");
    }

    #[test]
    fn test_prompt_mentions_language() {
        assert!(OllamaProvider::transcription_prompt(Some("spa")).ends_with("language 'spa'."));
        assert!(!OllamaProvider::transcription_prompt(None).contains("language '"));
    }

    #[test]
    fn test_generate_response_without_text() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"done":true}"#).unwrap();
        assert!(parsed.response.is_empty());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let provider = OllamaProvider::new("http://localhost:11434/", "llava");
        assert_eq!(provider.base_url, "http://localhost:11434");
    }
}
