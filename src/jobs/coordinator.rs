//! Pipeline coordinator
//!
//! Owns each job's lifecycle and artifacts: extract, plan, synthesize every
//! chunk, assemble, publish. Jobs are independent; the only shared state is
//! the registry, the read-only voice registry and the configuration.

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use super::id::JobId;
use super::registry::{ActivityGuard, JobRegistry};
use super::types::{Job, JobState, PipelineError, Progress, TextPreview};
use crate::audio::{AudioAssembler, AudioFormat, Audiobook};
use crate::chunking;
use crate::extract::{Document, ExtractedText, TextExtractor};
use crate::speech::{SpeechSynthesizer, VoiceRegistry};
use crate::storage::{JobStorage, Stage};

/// Coordinator tuning
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub max_chunk_chars: usize,
    /// Truncate extracted text to this many characters before chunking
    pub max_text_chars: Option<usize>,
    /// Concurrent synthesis calls per job; 1 is strictly sequential
    pub synthesis_concurrency: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            max_chunk_chars: 4000,
            max_text_chars: None,
            synthesis_concurrency: 1,
        }
    }
}

/// Finished audio of a job
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    pub format: AudioFormat,
    pub data: Bytes,
}

#[derive(Clone)]
pub struct PipelineCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    registry: JobRegistry,
    storage: Arc<dyn JobStorage>,
    extractor: TextExtractor,
    synthesizer: SpeechSynthesizer,
    assembler: AudioAssembler,
    settings: CoordinatorSettings,
}

impl PipelineCoordinator {
    pub fn new(
        storage: Arc<dyn JobStorage>,
        extractor: TextExtractor,
        synthesizer: SpeechSynthesizer,
        settings: CoordinatorSettings,
    ) -> Self {
        let assembler = AudioAssembler::new(synthesizer.format(), synthesizer.bitrate_kbps());
        Self {
            inner: Arc::new(CoordinatorInner {
                registry: JobRegistry::new(),
                storage,
                extractor,
                synthesizer,
                assembler,
                settings,
            }),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.inner.registry
    }

    pub fn voices(&self) -> &VoiceRegistry {
        self.inner.synthesizer.voices()
    }

    pub fn audio_format(&self) -> AudioFormat {
        self.inner.assembler.format()
    }

    // ========================================================================
    // Job Lifecycle
    // ========================================================================

    /// Store a document under a new job in `created`
    pub async fn create_job(&self, filename: &str, document: Document) -> Result<Job, PipelineError> {
        let job = Job::new(JobId::generate(), filename);

        self.inner
            .storage
            .put(&job.id, Stage::Document, document.bytes())
            .await?;
        self.inner.registry.insert(job.clone()).await;

        tracing::info!(
            job_id = %job.id,
            filename = %filename,
            bytes = document.len(),
            "Created job"
        );
        Ok(job)
    }

    /// Create a job and run extraction on it
    pub async fn submit(
        &self,
        filename: &str,
        document: Document,
        force_ocr: bool,
    ) -> Result<Job, PipelineError> {
        let job = self.create_job(filename, document).await?;
        self.extract(&job.id, force_ocr).await
    }

    /// `created -> text_extracted`
    ///
    /// On failure the job becomes `failed` and its document is discarded.
    pub async fn extract(&self, id: &JobId, force_ocr: bool) -> Result<Job, PipelineError> {
        let stage = self.begin_stage(id, JobState::Created).await?;

        let result = match self.run_extraction(id, force_ocr, stage.token()).await {
            Ok(extracted) => {
                tracing::info!(
                    job_id = %id,
                    method = %extracted.method,
                    pages = extracted.page_count,
                    chars = extracted.char_count(),
                    "Text extracted"
                );
                self.inner
                    .registry
                    .update(id, |job| {
                        job.state = JobState::TextExtracted;
                        job.extraction_method = Some(extracted.method);
                        job.page_count = Some(extracted.page_count);
                        job.total_chars = Some(extracted.char_count());
                    })
                    .await
                    .ok_or_else(|| PipelineError::NotFound(id.clone()))
            }
            Err(e) => {
                self.fail(id, &e).await;
                self.discard(id, Stage::Document).await;
                Err(e)
            }
        };

        stage.finish();
        result
    }

    async fn run_extraction(
        &self,
        id: &JobId,
        force_ocr: bool,
        token: &CancellationToken,
    ) -> Result<ExtractedText, PipelineError> {
        let data = self
            .inner
            .storage
            .get(id, Stage::Document)
            .await?
            .unwrap_or_default();
        let document = Document::new(data);

        let extracted = tokio::select! {
            _ = token.cancelled() => return Err(PipelineError::Cancelled),
            result = self.inner.extractor.extract(&document, force_ocr) => result?,
        };

        self.inner
            .storage
            .put(id, Stage::Text, Bytes::from(extracted.text.clone()))
            .await?;
        Ok(extracted)
    }

    /// `text_extracted -> audio_ready`
    ///
    /// The voice is checked before the job is touched, so an unsupported
    /// voice leaves the job in `text_extracted`. Any later failure moves the
    /// job to `failed` without publishing audio.
    pub async fn convert(&self, id: &JobId, voice_id: &str) -> Result<Job, PipelineError> {
        let voice = self.inner.synthesizer.resolve_voice(voice_id)?.id;
        let stage = self.begin_stage(id, JobState::TextExtracted).await?;

        self.inner
            .registry
            .update(id, |job| {
                job.voice = Some(voice.to_string());
                job.error = None;
            })
            .await;

        let result = match self.run_conversion(id, voice, stage.token()).await {
            Ok(audiobook) => self.publish(id, audiobook).await,
            Err(e) => Err(e),
        };

        // Terminal either way; the document is no longer needed
        self.discard(id, Stage::Document).await;

        if let Err(e) = &result {
            self.fail(id, e).await;
        }

        stage.finish();
        result
    }

    async fn run_conversion(
        &self,
        id: &JobId,
        voice: &str,
        token: &CancellationToken,
    ) -> Result<Audiobook, PipelineError> {
        let settings = &self.inner.settings;

        let text = self
            .inner
            .storage
            .get(id, Stage::Text)
            .await?
            .ok_or_else(|| PipelineError::InvalidState {
                job_id: id.clone(),
                state: "text_missing",
                expected: JobState::TextExtracted.as_str(),
            })?;
        let full_text = String::from_utf8_lossy(&text);
        let text = match settings.max_text_chars {
            Some(limit) => chunking::truncate_chars(&full_text, limit),
            None => &full_text,
        };

        let chunks = chunking::plan(text, settings.max_chunk_chars);
        if chunks.is_empty() {
            return Err(PipelineError::NothingToSynthesize(id.clone()));
        }
        let chunks_total = chunks.len();
        tracing::info!(job_id = %id, chunks = chunks_total, voice, "Starting synthesis");

        self.inner
            .registry
            .update(id, |job| {
                job.progress = Some(Progress {
                    chunks_done: 0,
                    chunks_total,
                })
            })
            .await;

        let synthesizer = &self.inner.synthesizer;
        let registry = &self.inner.registry;
        let synthesize_all = async {
            // buffer_unordered(1) degenerates to index order
            let mut pending = stream::iter(&chunks)
                .map(|chunk| synthesizer.synthesize(chunk, voice))
                .boxed()
                .buffer_unordered(settings.synthesis_concurrency.max(1));

            let mut segments = Vec::with_capacity(chunks_total);
            while let Some(segment) = pending.next().await {
                segments.push(segment?);
                let chunks_done = segments.len();
                registry
                    .update(id, |job| {
                        job.progress = Some(Progress {
                            chunks_done,
                            chunks_total,
                        })
                    })
                    .await;
            }
            Ok::<_, PipelineError>(segments)
        };

        // Cancelling drops in-flight calls and every finished segment
        let segments = tokio::select! {
            _ = token.cancelled() => return Err(PipelineError::Cancelled),
            result = synthesize_all => result?,
        };

        let assembler = self.inner.assembler;
        let audiobook = tokio::task::spawn_blocking(move || assembler.assemble(segments))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))?
            .map_err(|e| {
                tracing::error!(job_id = %id, "Audio assembly contract violated: {}", e);
                e
            })?;

        if token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(audiobook)
    }

    async fn publish(&self, id: &JobId, audiobook: Audiobook) -> Result<Job, PipelineError> {
        let segments = audiobook.segment_count;
        let duration = audiobook.duration;

        self.inner
            .storage
            .put(id, Stage::Audio, Bytes::from(audiobook.data))
            .await?;

        let updated = self
            .inner
            .registry
            .update(id, |job| {
                job.state = JobState::AudioReady;
                job.progress = None;
                job.chunks = Some(segments);
                job.duration_secs = Some(duration.as_secs_f64());
            })
            .await;

        match updated {
            Some(job) => {
                tracing::info!(
                    job_id = %id,
                    chunks = segments,
                    duration_secs = duration.as_secs_f64(),
                    "Audiobook ready"
                );
                Ok(job)
            }
            None => {
                // Deleted while assembling
                self.discard(id, Stage::Audio).await;
                Err(PipelineError::NotFound(id.clone()))
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn job(&self, id: &JobId) -> Result<Job, PipelineError> {
        self.inner.registry.get(id).await
    }

    /// First `limit` characters of the extracted text
    pub async fn preview(&self, id: &JobId, limit: usize) -> Result<TextPreview, PipelineError> {
        let job = self.inner.registry.get(id).await?;
        let text = self.inner.storage.get(id, Stage::Text).await?.ok_or_else(|| {
            PipelineError::InvalidState {
                job_id: id.clone(),
                state: job.state.as_str(),
                expected: JobState::TextExtracted.as_str(),
            }
        })?;

        Ok(TextPreview::new(&String::from_utf8_lossy(&text), limit))
    }

    pub async fn audio(&self, id: &JobId) -> Result<AudioArtifact, PipelineError> {
        let job = self.inner.registry.get(id).await?;
        if job.state != JobState::AudioReady {
            return Err(PipelineError::AudioNotReady(id.clone()));
        }

        let data = self
            .inner
            .storage
            .get(id, Stage::Audio)
            .await?
            .ok_or_else(|| PipelineError::AudioNotReady(id.clone()))?;

        Ok(AudioArtifact {
            format: self.audio_format(),
            data,
        })
    }

    // ========================================================================
    // Cancellation & Cleanup
    // ========================================================================

    /// Cancel the job's running stage, if any
    pub fn cancel(&self, id: &JobId) -> bool {
        let cancelled = self.inner.registry.cancel(id);
        if cancelled {
            tracing::info!(job_id = %id, "Cancelled running stage");
        }
        cancelled
    }

    /// Cancel and forget a job, removing all of its artifacts
    pub async fn delete(&self, id: &JobId) -> Result<Job, PipelineError> {
        self.cancel(id);
        let job = self
            .inner
            .registry
            .remove(id)
            .await
            .ok_or_else(|| PipelineError::NotFound(id.clone()))?;

        let removed = self.inner.storage.delete_job(id).await?;
        tracing::info!(job_id = %id, artifacts = removed, "Deleted job");
        Ok(job)
    }

    /// Cancel every running stage
    pub fn shutdown(&self) -> usize {
        let cancelled = self.inner.registry.cancel_all();
        if cancelled > 0 {
            tracing::info!(count = cancelled, "Cancelled running jobs for shutdown");
        }
        cancelled
    }

    async fn begin_stage(&self, id: &JobId, expected: JobState) -> Result<StageGuard, PipelineError> {
        let activity = self.inner.registry.begin(id, expected).await?;
        Ok(StageGuard {
            token: activity.token().clone(),
            activity: Some(activity),
            coordinator: self.clone(),
            job_id: id.clone(),
            expected,
            finished: false,
        })
    }

    /// Clean up a job whose stage was dropped mid-run (client went away)
    async fn abandon(&self, id: &JobId, expected: JobState) {
        // Fails when the job already moved on or another stage picked it up
        let Ok(_activity) = self.inner.registry.begin(id, expected).await else {
            return;
        };

        tracing::warn!(job_id = %id, stage = expected.as_str(), "Stage abandoned before finishing");
        self.fail(id, &PipelineError::Cancelled).await;

        let stale = match expected {
            JobState::Created => [Stage::Document, Stage::Text],
            _ => [Stage::Document, Stage::Audio],
        };
        for stage in stale {
            self.discard(id, stage).await;
        }
    }

    async fn fail(&self, id: &JobId, error: &PipelineError) {
        let reason = error.failure_reason();
        tracing::warn!(job_id = %id, reason = reason.code(), "Job failed: {}", error);
        self.inner
            .registry
            .update(id, |job| job.fail(reason, error.to_string()))
            .await;
    }

    /// Best-effort artifact removal; never fails the job
    async fn discard(&self, id: &JobId, stage: Stage) {
        if let Err(e) = self.inner.storage.delete(id, stage).await {
            tracing::warn!(job_id = %id, stage = stage.as_str(), "Failed to discard artifact: {}", e);
        }
    }
}

/// A running stage. Dropped without `finish`, the job is failed as
/// cancelled and its stage artifacts discarded.
struct StageGuard {
    activity: Option<ActivityGuard>,
    token: CancellationToken,
    coordinator: PipelineCoordinator,
    job_id: JobId,
    expected: JobState,
    finished: bool,
}

impl StageGuard {
    fn token(&self) -> &CancellationToken {
        &self.token
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        // Release the job first so the cleanup task can claim it
        drop(self.activity.take());
        if self.finished {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(job_id = %self.job_id, "Stage dropped outside the runtime, job left as is");
            return;
        };
        let coordinator = self.coordinator.clone();
        let id = self.job_id.clone();
        let expected = self.expected;
        runtime.spawn(async move { coordinator.abandon(&id, expected).await });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::extract::ExtractorConfig;
    use crate::jobs::FailureReason;
    use crate::ocr::OcrService;
    use crate::pdf::{PdfError, PdfSource};
    use crate::speech::{mock_audio, MockSpeechBackend, SpeechBackend};
    use crate::storage::MemoryStorage;

    /// Text-layer only; pages split on form feeds, `!` prefix means corrupt
    struct FakePdf;

    fn pages(document: &Bytes) -> Result<Vec<String>, PdfError> {
        let raw = String::from_utf8_lossy(document);
        if raw.is_empty() || raw.starts_with('!') {
            return Err(PdfError::Open("corrupt".to_string()));
        }
        Ok(raw.split('\x0c').map(str::to_string).collect())
    }

    #[async_trait]
    impl PdfSource for FakePdf {
        async fn page_texts(&self, document: Bytes) -> Result<Vec<String>, PdfError> {
            pages(&document)
        }

        async fn page_count(&self, document: Bytes) -> Result<usize, PdfError> {
            pages(&document).map(|p| p.len())
        }

        async fn render_page(&self, _document: Bytes, page: usize, _dpi: u32) -> Result<Vec<u8>, PdfError> {
            Err(PdfError::Render {
                page,
                reason: "no raster in tests".to_string(),
            })
        }
    }

    /// Text layer that takes far longer than any test waits
    struct StalledPdf;

    #[async_trait]
    impl PdfSource for StalledPdf {
        async fn page_texts(&self, document: Bytes) -> Result<Vec<String>, PdfError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            pages(&document)
        }

        async fn page_count(&self, document: Bytes) -> Result<usize, PdfError> {
            pages(&document).map(|p| p.len())
        }

        async fn render_page(&self, _document: Bytes, page: usize, _dpi: u32) -> Result<Vec<u8>, PdfError> {
            Err(PdfError::Render {
                page,
                reason: "no raster in tests".to_string(),
            })
        }
    }

    struct Harness {
        coordinator: PipelineCoordinator,
        storage: Arc<MemoryStorage>,
    }

    fn harness(backend: Arc<dyn SpeechBackend>, settings: CoordinatorSettings) -> Harness {
        harness_with_pdf(Arc::new(FakePdf), backend, settings)
    }

    fn harness_with_pdf(
        pdf: Arc<dyn PdfSource>,
        backend: Arc<dyn SpeechBackend>,
        settings: CoordinatorSettings,
    ) -> Harness {
        let storage = Arc::new(MemoryStorage::new());
        let extractor = TextExtractor::new(
            pdf,
            Arc::new(OcrService::with_providers("spa", Vec::new())),
            ExtractorConfig::default(),
        );
        let synthesizer =
            SpeechSynthesizer::new(backend, Arc::new(VoiceRegistry::spanish()), AudioFormat::Mp3, 128);
        let coordinator = PipelineCoordinator::new(storage.clone(), extractor, synthesizer, settings);
        Harness {
            coordinator,
            storage,
        }
    }

    /// Three pages whose marked-up concatenation is exactly 5000 characters
    fn three_page_document() -> Document {
        let page = |c: char| c.to_string().repeat(1648);
        Document::new(format!("{}\x0c{}\x0c{}", page('a'), page('b'), page('c')))
    }

    #[tokio::test]
    async fn test_three_page_document_becomes_one_audiobook() {
        let backend = Arc::new(MockSpeechBackend::working());
        let h = harness(backend.clone(), CoordinatorSettings::default());

        let job = h.coordinator.submit("libro.pdf", three_page_document(), false).await.unwrap();
        assert_eq!(job.state, JobState::TextExtracted);
        assert_eq!(job.total_chars, Some(5000));
        assert_eq!(job.page_count, Some(3));

        let job = h.coordinator.convert(&job.id, "es-ES-ElviraNeural").await.unwrap();
        assert_eq!(job.state, JobState::AudioReady);
        assert_eq!(job.chunks, Some(2));
        assert_eq!(job.progress, None);
        assert_eq!(backend.call_count(), 2);

        let text = h.storage.get(&job.id, Stage::Text).await.unwrap().unwrap();
        let text = String::from_utf8(text.to_vec()).unwrap();
        let chunks = chunking::plan(&text, 4000);
        assert_eq!(chunks[0].char_len(), 4000);
        assert_eq!(chunks[1].char_len(), 1000);

        let expected = [
            mock_audio(&chunks[0].text, AudioFormat::Mp3, 128).unwrap(),
            mock_audio(&chunks[1].text, AudioFormat::Mp3, 128).unwrap(),
        ]
        .concat();
        let audio = h.coordinator.audio(&job.id).await.unwrap();
        assert_eq!(audio.data, expected);

        // Document discarded at the terminal state, text kept for preview
        assert_eq!(h.storage.get(&job.id, Stage::Document).await.unwrap(), None);
        let preview = h.coordinator.preview(&job.id, 10).await.unwrap();
        assert_eq!(preview.total, 5000);
        assert_eq!(preview.remaining, 4990);
    }

    #[tokio::test]
    async fn test_concurrent_synthesis_keeps_order() {
        let sequential = harness(Arc::new(MockSpeechBackend::working()), CoordinatorSettings {
            max_chunk_chars: 300,
            ..Default::default()
        });
        let concurrent = harness(
            Arc::new(MockSpeechBackend::working()),
            CoordinatorSettings {
                max_chunk_chars: 300,
                synthesis_concurrency: 8,
                ..Default::default()
            },
        );

        let mut outputs = Vec::new();
        for h in [&sequential, &concurrent] {
            let job = h.coordinator.submit("a.pdf", three_page_document(), false).await.unwrap();
            let job = h.coordinator.convert(&job.id, "es-MX-JorgeNeural").await.unwrap();
            assert_eq!(job.chunks, Some(17));
            outputs.push(h.coordinator.audio(&job.id).await.unwrap().data);
        }

        assert_eq!(outputs[0], outputs[1]);
    }

    #[tokio::test]
    async fn test_truncation_before_chunking() {
        let h = harness(
            Arc::new(MockSpeechBackend::working()),
            CoordinatorSettings {
                max_text_chars: Some(4500),
                ..Default::default()
            },
        );

        let job = h.coordinator.submit("a.pdf", three_page_document(), false).await.unwrap();
        let job = h.coordinator.convert(&job.id, "es-MX-JorgeNeural").await.unwrap();

        assert_eq!(job.chunks, Some(2));
        // Full text stays available
        assert_eq!(job.total_chars, Some(5000));
    }

    #[tokio::test]
    async fn test_corrupt_document_never_reaches_text_extracted() {
        let h = harness(Arc::new(MockSpeechBackend::working()), CoordinatorSettings::default());

        let err = h
            .coordinator
            .submit("roto.pdf", Document::new("!not a pdf"), false)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "bad-input-document");

        let jobs = h.storage.len().await;
        assert_eq!(jobs, 0, "document and text must be discarded");
    }

    #[tokio::test]
    async fn test_failed_job_state() {
        let h = harness(Arc::new(MockSpeechBackend::working()), CoordinatorSettings::default());
        let job = h
            .coordinator
            .create_job("vacío.pdf", Document::new(""))
            .await
            .unwrap();

        assert!(h.coordinator.extract(&job.id, false).await.is_err());

        let job = h.coordinator.job(&job.id).await.unwrap();
        assert_eq!(job.state, JobState::Failed(FailureReason::BadInputDocument));
        assert!(matches!(
            h.coordinator.convert(&job.id, "es-MX-JorgeNeural").await,
            Err(PipelineError::InvalidState { state: "failed", .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_voice_leaves_job_untouched() {
        let backend = Arc::new(MockSpeechBackend::working());
        let h = harness(backend.clone(), CoordinatorSettings::default());
        let job = h.coordinator.submit("a.pdf", three_page_document(), false).await.unwrap();

        let err = h.coordinator.convert(&job.id, "en-GB-RyanNeural").await.unwrap_err();

        assert_eq!(err.code(), "bad-voice-selection");
        assert_eq!(backend.call_count(), 0);
        let job = h.coordinator.job(&job.id).await.unwrap();
        assert_eq!(job.state, JobState::TextExtracted);
        assert!(h.coordinator.convert(&job.id, "es-MX-DaliaNeural").await.is_ok());
    }

    #[tokio::test]
    async fn test_synthesis_failure_publishes_nothing() {
        let h = harness(
            Arc::new(MockSpeechBackend::failing_on("c")),
            CoordinatorSettings::default(),
        );
        let job = h.coordinator.submit("a.pdf", three_page_document(), false).await.unwrap();

        let err = h.coordinator.convert(&job.id, "es-MX-JorgeNeural").await.unwrap_err();
        assert_eq!(err.code(), "synthesis-backend-failure");

        let job = h.coordinator.job(&job.id).await.unwrap();
        assert_eq!(job.state, JobState::Failed(FailureReason::SynthesisBackendFailure));
        assert_eq!(job.progress, None);
        assert!(matches!(
            h.coordinator.audio(&job.id).await,
            Err(PipelineError::AudioNotReady(_))
        ));
        assert_eq!(h.storage.get(&job.id, Stage::Audio).await.unwrap(), None);
        assert_eq!(h.storage.get(&job.id, Stage::Document).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cancel_abandons_conversion() {
        let h = harness(
            Arc::new(MockSpeechBackend::slow(Duration::from_secs(30))),
            CoordinatorSettings::default(),
        );
        let job = h.coordinator.submit("a.pdf", three_page_document(), false).await.unwrap();

        let coordinator = h.coordinator.clone();
        let id = job.id.clone();
        let running = tokio::spawn(async move { coordinator.convert(&id, "es-MX-JorgeNeural").await });

        while !h.coordinator.registry().is_busy(&job.id) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(h.coordinator.cancel(&job.id));

        let result = tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .expect("conversion should stop promptly")
            .unwrap();
        assert!(matches!(result, Err(PipelineError::Cancelled)));

        let job = h.coordinator.job(&job.id).await.unwrap();
        assert_eq!(job.state, JobState::Failed(FailureReason::Cancelled));
        assert_eq!(h.storage.get(&job.id, Stage::Audio).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_removes_everything() {
        let h = harness(Arc::new(MockSpeechBackend::working()), CoordinatorSettings::default());
        let job = h.coordinator.submit("a.pdf", three_page_document(), false).await.unwrap();
        h.coordinator.convert(&job.id, "es-MX-JorgeNeural").await.unwrap();

        h.coordinator.delete(&job.id).await.unwrap();

        assert!(h.storage.is_empty().await);
        assert!(matches!(
            h.coordinator.job(&job.id).await,
            Err(PipelineError::NotFound(_))
        ));
        assert!(matches!(
            h.coordinator.delete(&job.id).await,
            Err(PipelineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_convert_requires_extracted_text() {
        let h = harness(Arc::new(MockSpeechBackend::working()), CoordinatorSettings::default());
        let job = h
            .coordinator
            .create_job("a.pdf", three_page_document())
            .await
            .unwrap();

        assert!(matches!(
            h.coordinator.convert(&job.id, "es-MX-JorgeNeural").await,
            Err(PipelineError::InvalidState { state: "created", .. })
        ));
        assert!(matches!(
            h.coordinator.preview(&job.id, 10).await,
            Err(PipelineError::InvalidState { .. })
        ));
    }

    /// Polls until the job reaches `state`
    async fn wait_for_state(coordinator: &PipelineCoordinator, id: &JobId, state: JobState) -> Job {
        for _ in 0..400 {
            let job = coordinator.job(id).await.unwrap();
            if job.state == state {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {} never reached {}", id, state.as_str());
    }

    #[tokio::test]
    async fn test_dropped_submit_discards_document() {
        let h = harness_with_pdf(
            Arc::new(StalledPdf),
            Arc::new(MockSpeechBackend::working()),
            CoordinatorSettings::default(),
        );

        let dropped = tokio::time::timeout(
            Duration::from_millis(50),
            h.coordinator.submit("lento.pdf", three_page_document(), false),
        )
        .await;
        assert!(dropped.is_err());

        for _ in 0..400 {
            if h.storage.is_empty().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(h.storage.is_empty().await, "abandoned document must be discarded");
        assert_eq!(h.coordinator.registry().len().await, 1);
    }

    #[tokio::test]
    async fn test_dropped_extraction_fails_job() {
        let h = harness_with_pdf(
            Arc::new(StalledPdf),
            Arc::new(MockSpeechBackend::working()),
            CoordinatorSettings::default(),
        );
        let job = h
            .coordinator
            .create_job("lento.pdf", three_page_document())
            .await
            .unwrap();

        let dropped =
            tokio::time::timeout(Duration::from_millis(50), h.coordinator.extract(&job.id, false)).await;
        assert!(dropped.is_err());

        let job = wait_for_state(&h.coordinator, &job.id, JobState::Failed(FailureReason::Cancelled)).await;
        assert!(!h.coordinator.registry().is_busy(&job.id));
        assert_eq!(h.storage.get(&job.id, Stage::Document).await.unwrap(), None);
        assert_eq!(h.storage.get(&job.id, Stage::Text).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_dropped_conversion_fails_job() {
        let backend = Arc::new(MockSpeechBackend::slow(Duration::from_secs(30)));
        let h = harness(backend, CoordinatorSettings::default());
        let job = h.coordinator.submit("a.pdf", three_page_document(), false).await.unwrap();

        let dropped = tokio::time::timeout(
            Duration::from_millis(50),
            h.coordinator.convert(&job.id, "es-MX-JorgeNeural"),
        )
        .await;
        assert!(dropped.is_err());

        let job = wait_for_state(&h.coordinator, &job.id, JobState::Failed(FailureReason::Cancelled)).await;
        assert_eq!(job.progress, None);
        assert_eq!(h.storage.get(&job.id, Stage::Document).await.unwrap(), None);
        assert_eq!(h.storage.get(&job.id, Stage::Audio).await.unwrap(), None);
        // Text survives for preview
        assert_eq!(h.coordinator.preview(&job.id, 10).await.unwrap().total, 5000);
    }

    #[tokio::test]
    async fn test_finished_stage_is_not_abandoned() {
        let h = harness(Arc::new(MockSpeechBackend::working()), CoordinatorSettings::default());
        let job = h.coordinator.submit("a.pdf", three_page_document(), false).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        let job = h.coordinator.job(&job.id).await.unwrap();
        assert_eq!(job.state, JobState::TextExtracted);
        assert!(h.storage.get(&job.id, Stage::Document).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_truncation_to_whitespace_has_nothing_to_synthesize() {
        let backend = Arc::new(MockSpeechBackend::working());
        let h = harness(
            backend.clone(),
            CoordinatorSettings {
                // Only the newline opening the first page marker survives
                max_text_chars: Some(1),
                ..Default::default()
            },
        );
        let job = h.coordinator.submit("a.pdf", three_page_document(), false).await.unwrap();

        let err = h.coordinator.convert(&job.id, "es-MX-JorgeNeural").await.unwrap_err();

        assert!(matches!(err, PipelineError::NothingToSynthesize(_)));
        assert_eq!(err.code(), "no-speakable-text");
        assert_eq!(backend.call_count(), 0);
        let job = h.coordinator.job(&job.id).await.unwrap();
        assert_eq!(job.state, JobState::Failed(FailureReason::BadInputDocument));
    }
}
