//! Voice registry
//!
//! The fixed set of voices the service accepts. Shared read-only for the
//! process lifetime.

use serde::Serialize;

/// Voice used when a conversion request does not name one
pub const DEFAULT_VOICE: &str = "es-MX-JorgeNeural";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// A supported synthesis voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voice {
    /// Backend voice identifier
    pub id: &'static str,
    /// Human-readable name
    pub label: &'static str,
    /// BCP-47 locale, e.g. `es-MX`
    pub locale: &'static str,
    pub gender: Gender,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported voice '{voice}'")]
pub struct InvalidVoiceError {
    pub voice: String,
}

#[derive(Debug, Clone)]
pub struct VoiceRegistry {
    voices: Vec<Voice>,
}

impl VoiceRegistry {
    pub fn new(voices: Vec<Voice>) -> Self {
        Self { voices }
    }

    /// Spanish neural voices for Mexico, Spain and Argentina
    pub fn spanish() -> Self {
        Self::new(vec![
            voice("es-MX-JorgeNeural", "Jorge (México)", "es-MX", Gender::Male),
            voice("es-MX-DaliaNeural", "Dalia (México)", "es-MX", Gender::Female),
            voice("es-ES-AlvaroNeural", "Álvaro (España)", "es-ES", Gender::Male),
            voice("es-ES-ElviraNeural", "Elvira (España)", "es-ES", Gender::Female),
            voice("es-AR-TomasNeural", "Tomás (Argentina)", "es-AR", Gender::Male),
            voice("es-AR-ElenaNeural", "Elena (Argentina)", "es-AR", Gender::Female),
        ])
    }

    pub fn all(&self) -> &[Voice] {
        &self.voices
    }

    pub fn get(&self, id: &str) -> Option<&Voice> {
        self.voices.iter().find(|v| v.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Look up a voice, failing for ids outside the registry
    pub fn resolve(&self, id: &str) -> Result<&Voice, InvalidVoiceError> {
        self.get(id).ok_or_else(|| InvalidVoiceError {
            voice: id.to_string(),
        })
    }
}

impl Default for VoiceRegistry {
    fn default() -> Self {
        Self::spanish()
    }
}

fn voice(id: &'static str, label: &'static str, locale: &'static str, gender: Gender) -> Voice {
    Voice {
        id,
        label,
        locale,
        gender,
    }
}
