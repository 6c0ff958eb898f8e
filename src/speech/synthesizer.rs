//! Speech synthesizer adapter
//!
//! Turns one chunk into one audio segment tagged with the chunk's index.

use std::path::PathBuf;
use std::sync::Arc;

use super::provider::{SpeechBackend, SynthesisError, SynthesisRequest};
use super::voices::{InvalidVoiceError, Voice, VoiceRegistry};
use crate::audio::{AudioFormat, AudioSegment};
use crate::chunking::Chunk;

pub struct SpeechSynthesizer {
    backend: Arc<dyn SpeechBackend>,
    voices: Arc<VoiceRegistry>,
    format: AudioFormat,
    bitrate_kbps: u32,
    /// Spool segments to files here instead of holding them in memory
    spool_dir: Option<PathBuf>,
}

impl SpeechSynthesizer {
    pub fn new(
        backend: Arc<dyn SpeechBackend>,
        voices: Arc<VoiceRegistry>,
        format: AudioFormat,
        bitrate_kbps: u32,
    ) -> Self {
        Self {
            backend,
            voices,
            format,
            bitrate_kbps,
            spool_dir: None,
        }
    }

    pub fn with_spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = Some(dir.into());
        self
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn bitrate_kbps(&self) -> u32 {
        self.bitrate_kbps
    }

    pub fn voices(&self) -> &VoiceRegistry {
        &self.voices
    }

    /// Check a voice id against the registry without contacting the backend
    pub fn resolve_voice(&self, voice_id: &str) -> Result<&Voice, InvalidVoiceError> {
        self.voices.resolve(voice_id)
    }

    /// Synthesize one chunk
    pub async fn synthesize(&self, chunk: &Chunk, voice_id: &str) -> Result<AudioSegment, SynthesisError> {
        let voice = self.resolve_voice(voice_id)?;

        let audio = self
            .backend
            .synthesize(SynthesisRequest {
                text: &chunk.text,
                voice,
                format: self.format,
                bitrate_kbps: self.bitrate_kbps,
            })
            .await?;

        if audio.is_empty() {
            return Err(SynthesisError::EmptyAudio(chunk.index));
        }

        tracing::debug!(
            chunk = chunk.index,
            backend = self.backend.name(),
            bytes = audio.len(),
            "Chunk synthesized"
        );

        match &self.spool_dir {
            None => Ok(AudioSegment::in_memory(chunk.index, audio)),
            Some(dir) => {
                let index = chunk.index;
                let dir = dir.clone();
                let format = self.format;
                tokio::task::spawn_blocking(move || AudioSegment::spool(index, &audio, &dir, format))
                    .await
                    .map_err(|e| SynthesisError::Spool {
                        index,
                        source: std::io::Error::other(e),
                    })?
                    .map_err(|source| SynthesisError::Spool { index, source })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::MockSpeechBackend;

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            index,
            char_offset: 0,
            text: text.to_string(),
        }
    }

    fn synthesizer(backend: MockSpeechBackend) -> SpeechSynthesizer {
        SpeechSynthesizer::new(
            Arc::new(backend),
            Arc::new(VoiceRegistry::spanish()),
            AudioFormat::Mp3,
            128,
        )
    }

    #[tokio::test]
    async fn test_segment_carries_chunk_index() {
        let synth = synthesizer(MockSpeechBackend::working());

        let segment = synth.synthesize(&chunk(7, "Hola"), "es-AR-ElenaNeural").await.unwrap();

        assert_eq!(segment.index(), 7);
        assert!(!segment.is_empty());
        assert!(segment.spool_path().is_none());
    }

    #[tokio::test]
    async fn test_unknown_voice_never_reaches_backend() {
        let backend = MockSpeechBackend::working();
        let calls = backend.calls();
        let synth = synthesizer(backend);

        let err = synth.synthesize(&chunk(0, "Hola"), "fr-FR-DeniseNeural").await.unwrap_err();

        assert!(matches!(err, SynthesisError::InvalidVoice(_)));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let synth = synthesizer(MockSpeechBackend::failing_on("roto"));

        let err = synth.synthesize(&chunk(3, "algo roto"), "es-MX-JorgeNeural").await.unwrap_err();

        assert!(matches!(err, SynthesisError::Backend { .. }));
    }

    #[tokio::test]
    async fn test_spooled_segment_is_removed_on_drop() {
        let dir = tempfile::TempDir::new().unwrap();
        let synth = synthesizer(MockSpeechBackend::working()).with_spool_dir(dir.path());

        let segment = synth.synthesize(&chunk(1, "Hola"), "es-MX-JorgeNeural").await.unwrap();
        let path = segment.spool_path().unwrap().to_path_buf();

        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap().len(), segment.len());

        drop(segment);
        assert!(!path.exists());
    }
}
