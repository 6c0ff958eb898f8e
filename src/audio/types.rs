//! Audio types
//!
//! Segments produced per chunk, the assembled audiobook, and assembly errors.

use std::borrow::Cow;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

/// Container format of synthesized and assembled audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
        }
    }

    /// Output format identifier understood by the synthesis backend
    ///
    /// Returns `None` when the backend has no constant-bitrate variant of
    /// this container at the requested bitrate. For WAV the bitrate selects
    /// the 16-bit mono PCM sample rate.
    pub fn backend_output_format(&self, bitrate_kbps: u32) -> Option<&'static str> {
        match (self, bitrate_kbps) {
            (Self::Mp3, 32) => Some("audio-16khz-32kbitrate-mono-mp3"),
            (Self::Mp3, 48) => Some("audio-24khz-48kbitrate-mono-mp3"),
            (Self::Mp3, 64) => Some("audio-16khz-64kbitrate-mono-mp3"),
            (Self::Mp3, 96) => Some("audio-24khz-96kbitrate-mono-mp3"),
            (Self::Mp3, 128) => Some("audio-16khz-128kbitrate-mono-mp3"),
            (Self::Mp3, 160) => Some("audio-24khz-160kbitrate-mono-mp3"),
            (Self::Mp3, 192) => Some("audio-48khz-192kbitrate-mono-mp3"),
            (Self::Wav, 128) => Some("riff-8khz-16bit-mono-pcm"),
            (Self::Wav, 256) => Some("riff-16khz-16bit-mono-pcm"),
            (Self::Wav, 384) => Some("riff-24khz-16bit-mono-pcm"),
            (Self::Wav, 768) => Some("riff-48khz-16bit-mono-pcm"),
            _ => None,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "wav" => Ok(Self::Wav),
            other => Err(format!("unknown audio container '{}'", other)),
        }
    }
}

/// Synthesized audio for exactly one chunk
///
/// The bytes are either held in memory or spooled to a temporary file that
/// is deleted when the segment is dropped.
#[derive(Debug)]
pub struct AudioSegment {
    index: usize,
    data: SegmentData,
}

#[derive(Debug)]
enum SegmentData {
    Memory(Vec<u8>),
    Spooled { file: NamedTempFile, len: usize },
}

impl AudioSegment {
    pub fn in_memory(index: usize, data: Vec<u8>) -> Self {
        Self {
            index,
            data: SegmentData::Memory(data),
        }
    }

    /// Write the segment to a temporary file under `dir`
    pub fn spool(
        index: usize,
        data: &[u8],
        dir: &Path,
        format: AudioFormat,
    ) -> std::io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(&format!("chunk_{:05}_", index))
            .suffix(&format!(".{}", format.extension()))
            .tempfile_in(dir)?;
        file.write_all(data)?;
        file.flush()?;

        Ok(Self {
            index,
            data: SegmentData::Spooled {
                file,
                len: data.len(),
            },
        })
    }

    /// Position of the chunk this segment was synthesized from
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        match &self.data {
            SegmentData::Memory(bytes) => bytes.len(),
            SegmentData::Spooled { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path of the spool file, if any
    pub fn spool_path(&self) -> Option<&Path> {
        match &self.data {
            SegmentData::Memory(_) => None,
            SegmentData::Spooled { file, .. } => Some(file.path()),
        }
    }

    pub fn read(&self) -> std::io::Result<Cow<'_, [u8]>> {
        match &self.data {
            SegmentData::Memory(bytes) => Ok(Cow::Borrowed(bytes)),
            SegmentData::Spooled { file, .. } => std::fs::read(file.path()).map(Cow::Owned),
        }
    }
}

/// The final concatenated artifact
#[derive(Debug, Clone)]
pub struct Audiobook {
    pub format: AudioFormat,
    pub data: Vec<u8>,
    pub segment_count: usize,
    pub duration: Duration,
}

/// Assembly failures
///
/// Ordering variants indicate a bookkeeping defect upstream rather than bad
/// input; format variants mean the backend returned audio that cannot be
/// spliced.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("No audio segments to assemble")]
    NoSegments,

    #[error("Duplicate audio segment for chunk {0}")]
    DuplicateSegment(usize),

    #[error("Missing audio segment for chunk {0}")]
    MissingSegment(usize),

    #[error("Segment {index} is not valid {format}: {reason}")]
    InvalidSegment {
        index: usize,
        format: AudioFormat,
        reason: String,
    },

    #[error("Segment {index} does not match the output stream: {reason}")]
    IncompatibleSegment { index: usize, reason: String },

    #[error("Failed to read spooled segment {index}: {source}")]
    Spool {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode output: {0}")]
    Encode(String),
}
