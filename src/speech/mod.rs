//! Speech synthesis
//!
//! Voice registry, backend trait with the Azure REST implementation, a mock
//! backend, and the per-chunk synthesizer adapter.

mod mock;
mod provider;
mod synthesizer;
mod voices;

pub use mock::{mock_audio, MockBehavior, MockSpeechBackend};
pub use provider::{build_ssml, AzureSpeechBackend, SpeechBackend, SynthesisError, SynthesisRequest};
pub use synthesizer::SpeechSynthesizer;
pub use voices::{Gender, InvalidVoiceError, Voice, VoiceRegistry, DEFAULT_VOICE};
