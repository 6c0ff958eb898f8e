//! Mock speech backend
//!
//! Produces deterministic, spliceable audio derived from the request text, so
//! pipelines can run end to end without a synthesis service:
//! - `MockSpeechBackend::working()` always succeeds
//! - `MockSpeechBackend::failing_on(marker)` fails for text containing `marker`
//! - `MockSpeechBackend::slow(delay)` succeeds after sleeping

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::provider::{SpeechBackend, SynthesisError, SynthesisRequest};
use crate::audio::{mp3, wav, AudioFormat};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    Working,
    /// Fail any request whose text contains the marker
    FailingOn(String),
    Slow { delay: Duration },
}

#[derive(Debug)]
pub struct MockSpeechBackend {
    behavior: MockBehavior,
    calls: Arc<AtomicUsize>,
}

impl MockSpeechBackend {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing_on(marker: &str) -> Self {
        Self::new(MockBehavior::FailingOn(marker.to_string()))
    }

    pub fn slow(delay: Duration) -> Self {
        Self::new(MockBehavior::Slow { delay })
    }

    /// Number of synthesis calls received, including failed ones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared call counter, readable after the backend is moved into an `Arc<dyn _>`
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

/// Audio the mock returns for `text`
///
/// One frame (or 160 samples) per started 50 characters, with a payload
/// derived from the text so different chunks give different audio.
pub fn mock_audio(text: &str, format: AudioFormat, bitrate_kbps: u32) -> Result<Vec<u8>, SynthesisError> {
    let units = text.chars().count() / 50 + 1;
    let fill = text.bytes().fold(0u8, |acc, b| acc.wrapping_mul(31).wrapping_add(b));
    let unsupported = SynthesisError::UnsupportedFormat {
        format,
        bitrate_kbps,
    };

    match format {
        AudioFormat::Mp3 => {
            let frame = mp3::mpeg2_mono_frame(bitrate_kbps, fill).ok_or(unsupported)?;
            Ok(frame.repeat(units))
        }
        AudioFormat::Wav => {
            // 16-bit mono PCM: kbps / 16 gives the sample rate in kHz
            if bitrate_kbps < 16 {
                return Err(unsupported);
            }
            let samples = vec![i16::from(fill) * 64; units * 160];
            wav::mono_pcm16(bitrate_kbps * 1000 / 16, &samples)
                .map_err(|e| SynthesisError::Request(e.to_string()))
        }
    }
}

#[async_trait]
impl SpeechBackend for MockSpeechBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn synthesize(&self, request: SynthesisRequest<'_>) -> Result<Vec<u8>, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            MockBehavior::Working => {}
            MockBehavior::FailingOn(marker) => {
                if request.text.contains(marker.as_str()) {
                    return Err(SynthesisError::Backend {
                        status: 503,
                        message: "mock backend failure".to_string(),
                    });
                }
            }
            MockBehavior::Slow { delay } => tokio::time::sleep(*delay).await,
        }

        mock_audio(request.text, request.format, request.bitrate_kbps)
    }
}
