//! Text extractor
//!
//! Reads the PDF text layer first and only falls back to OCR when the
//! direct result is too short to be trusted. Scanned documents often carry a
//! handful of stray glyphs in their text layer, so "some text" is not enough.

use std::sync::Arc;

use super::types::{Document, ExtractedText, ExtractionError, ExtractionMethod};
use crate::ocr::OcrService;
use crate::pdf::PdfSource;

/// Extraction settings
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Raster resolution for OCR
    pub ocr_dpi: u32,
    /// Direct text must exceed this many trimmed characters to be accepted
    pub sufficiency_threshold_chars: usize,
    /// Language hint passed to OCR providers (`None` uses the service default)
    pub ocr_language: Option<String>,
    /// Word in the `--- <label> N ---` marker preceding each page
    pub page_label: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            ocr_dpi: 200,
            sufficiency_threshold_chars: 100,
            ocr_language: None,
            page_label: "Página".to_string(),
        }
    }
}

pub struct TextExtractor {
    pdf: Arc<dyn PdfSource>,
    ocr: Arc<OcrService>,
    config: ExtractorConfig,
}

impl TextExtractor {
    pub fn new(pdf: Arc<dyn PdfSource>, ocr: Arc<OcrService>, config: ExtractorConfig) -> Self {
        Self { pdf, ocr, config }
    }

    /// Extract the text of `document`, skipping the text layer when `force_ocr` is set
    pub async fn extract(
        &self,
        document: &Document,
        force_ocr: bool,
    ) -> Result<ExtractedText, ExtractionError> {
        if !force_ocr {
            match self.pdf.page_texts(document.bytes()).await {
                Ok(pages) => {
                    let page_count = pages.len();
                    let text = join_pages(&self.config.page_label, pages.iter().map(String::as_str));
                    let usable = text.trim().chars().count();

                    if usable > self.config.sufficiency_threshold_chars {
                        tracing::debug!(pages = page_count, chars = usable, "Direct extraction accepted");
                        return Ok(ExtractedText {
                            text,
                            method: ExtractionMethod::Direct,
                            page_count,
                        });
                    }
                    tracing::info!(
                        chars = usable,
                        threshold = self.config.sufficiency_threshold_chars,
                        "Text layer below threshold, falling back to OCR"
                    );
                }
                Err(e) => {
                    tracing::warn!("Direct extraction failed, falling back to OCR: {}", e);
                }
            }
        }

        self.extract_ocr(document).await
    }

    async fn extract_ocr(&self, document: &Document) -> Result<ExtractedText, ExtractionError> {
        let page_count = match self.pdf.page_count(document.bytes()).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("Document cannot be rasterised: {}", e);
                return Err(ExtractionError::NoTextFound);
            }
        };

        let language = self.config.ocr_language.as_deref();
        let ocr = self.ocr.session().await;
        let mut pages = Vec::with_capacity(page_count);

        // One page at a time keeps a single raster in memory
        for page in 0..page_count {
            let image = match self
                .pdf
                .render_page(document.bytes(), page, self.config.ocr_dpi)
                .await
            {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!(page = page + 1, "Failed to render page for OCR: {}", e);
                    pages.push(String::new());
                    continue;
                }
            };

            let result = ocr.recognize(&image, language).await?;
            tracing::debug!(
                page = page + 1,
                provider = %result.provider,
                chars = result.text.chars().count(),
                "OCR page done"
            );
            pages.push(result.text);
        }

        let text = join_pages(&self.config.page_label, pages.iter().map(String::as_str));
        if text.trim().is_empty() {
            return Err(ExtractionError::NoTextFound);
        }

        Ok(ExtractedText {
            text,
            method: ExtractionMethod::Ocr,
            page_count,
        })
    }
}

/// Concatenate non-empty page fragments, each preceded by a 1-based page marker
fn join_pages<'a>(label: &str, pages: impl IntoIterator<Item = &'a str>) -> String {
    pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| format!("\n--- {} {} ---\n{}", label, i + 1, text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::ocr::{OcrError, OcrProvider, OcrProviderTrait, OcrResult};
    use crate::pdf::PdfError;

    /// Pages are separated by form feeds; a leading `!` marks the document corrupt
    struct FakePdf;

    fn parse(document: &Bytes) -> Result<Vec<String>, PdfError> {
        let raw = String::from_utf8_lossy(document);
        if raw.is_empty() || raw.starts_with('!') {
            return Err(PdfError::Open("corrupt".to_string()));
        }
        Ok(raw.split('\x0c').map(str::to_string).collect())
    }

    #[async_trait]
    impl PdfSource for FakePdf {
        async fn page_texts(&self, document: Bytes) -> Result<Vec<String>, PdfError> {
            parse(&document)
        }

        async fn page_count(&self, document: Bytes) -> Result<usize, PdfError> {
            parse(&document).map(|pages| pages.len())
        }

        async fn render_page(&self, document: Bytes, page: usize, _dpi: u32) -> Result<Vec<u8>, PdfError> {
            parse(&document)?;
            Ok(format!("{}", page).into_bytes())
        }
    }

    /// Recognises page `i` (the rendered image is the page index) as `pages[i]`
    struct ScriptedOcr {
        pages: Vec<String>,
        calls: Arc<AtomicUsize>,
        probes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl OcrProviderTrait for ScriptedOcr {
        fn provider_type(&self) -> OcrProvider {
            OcrProvider::Tesseract
        }

        async fn is_available(&self) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            true
        }

        async fn recognize(&self, image_data: &[u8], _language: Option<&str>) -> Result<OcrResult, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let page: usize = String::from_utf8_lossy(image_data).parse().unwrap();
            Ok(OcrResult {
                text: self.pages.get(page).cloned().unwrap_or_default(),
                confidence: 90.0,
                provider: OcrProvider::Tesseract,
            })
        }
    }

    fn extractor(ocr_pages: &[&str]) -> (TextExtractor, Arc<AtomicUsize>) {
        let (extractor, calls, _) = probed_extractor(ocr_pages);
        (extractor, calls)
    }

    fn probed_extractor(ocr_pages: &[&str]) -> (TextExtractor, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let probes = Arc::new(AtomicUsize::new(0));
        let provider = ScriptedOcr {
            pages: ocr_pages.iter().map(|p| p.to_string()).collect(),
            calls: calls.clone(),
            probes: probes.clone(),
        };
        let ocr = OcrService::with_providers("spa", vec![Arc::new(provider)]);
        let extractor = TextExtractor::new(Arc::new(FakePdf), Arc::new(ocr), ExtractorConfig::default());
        (extractor, calls, probes)
    }

    #[tokio::test]
    async fn test_sufficient_text_layer_skips_ocr() {
        let (extractor, calls) = extractor(&["ocr text"]);
        let body = "a".repeat(2000);
        let doc = Document::new(format!("{}\x0c{}\x0c{}", body, body, "b".repeat(1000)));

        let extracted = extractor.extract(&doc, false).await.unwrap();

        assert_eq!(extracted.method, ExtractionMethod::Direct);
        assert_eq!(extracted.page_count, 3);
        assert!(extracted.text.starts_with("\n--- Página 1 ---\naaa"));
        assert!(extracted.text.contains("\n--- Página 3 ---\nbbb"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_threshold_is_exclusive() {
        // The page marker alone is 17 characters after trimming
        let (extractor, calls) = extractor(&["recognised text"]);
        let doc = Document::new("x".repeat(83));

        let extracted = extractor.extract(&doc, false).await.unwrap();

        assert_eq!(extracted.method, ExtractionMethod::Ocr);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let doc = Document::new("x".repeat(84));
        assert_eq!(
            extractor.extract(&doc, false).await.unwrap().method,
            ExtractionMethod::Direct
        );
    }

    #[tokio::test]
    async fn test_scanned_page_goes_through_ocr() {
        let (extractor, calls) = extractor(&["Capítulo uno. Había una vez..."]);
        let doc = Document::new("  ");

        let extracted = extractor.extract(&doc, false).await.unwrap();

        assert_eq!(extracted.method, ExtractionMethod::Ocr);
        assert_eq!(extracted.text, "\n--- Página 1 ---\nCapítulo uno. Había una vez...");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stray_glyphs_trigger_ocr() {
        let (extractor, calls, probes) = probed_extractor(&["full page one", "", "full page three"]);
        let doc = Document::new("~\x0c\x0c.");

        let extracted = extractor.extract(&doc, false).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Availability is checked once per document, not per page
        assert_eq!(probes.load(Ordering::SeqCst), 1);
        assert_eq!(
            extracted.text,
            "\n--- Página 1 ---\nfull page one\n\n--- Página 3 ---\nfull page three"
        );
    }

    #[tokio::test]
    async fn test_force_ocr_ignores_text_layer() {
        let (extractor, calls) = extractor(&["from ocr"]);
        let doc = Document::new("t".repeat(500));

        let extracted = extractor.extract(&doc, true).await.unwrap();

        assert_eq!(extracted.method, ExtractionMethod::Ocr);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_ocr_fails() {
        let (extractor, calls) = extractor(&["   "]);
        let doc = Document::new("");

        // Empty bytes cannot even be rasterised
        assert!(matches!(
            extractor.extract(&doc, false).await,
            Err(ExtractionError::NoTextFound)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let doc = Document::new("\x0c");
        assert!(matches!(
            extractor.extract(&doc, false).await,
            Err(ExtractionError::NoTextFound)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_corrupt_document() {
        let (extractor, calls) = extractor(&["never used"]);
        let doc = Document::new("!garbage");

        let err = extractor.extract(&doc, false).await.unwrap_err();

        assert_eq!(err.code(), "no-text-found");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ocr_unavailable() {
        let ocr = OcrService::with_providers("spa", Vec::new());
        let extractor = TextExtractor::new(Arc::new(FakePdf), Arc::new(ocr), ExtractorConfig::default());

        let err = extractor.extract(&Document::new(" "), false).await.unwrap_err();

        assert!(matches!(err, ExtractionError::Ocr(OcrError::ProviderNotAvailable(_))));
    }

    #[test]
    fn test_join_pages_skips_blank_pages() {
        assert_eq!(join_pages("Página", ["", "  "]), "");
        assert_eq!(
            join_pages("Página", ["a", "", "c"]),
            "\n--- Página 1 ---\na\n\n--- Página 3 ---\nc"
        );
        assert_eq!(join_pages("Page", ["a"]), "\n--- Page 1 ---\na");
    }
}
