//! Audio Assembler
//!
//! Orders segments by chunk index and folds them into one audiobook.

use super::mp3::Mp3Splicer;
use super::types::{AssemblyError, AudioFormat, AudioSegment, Audiobook};
use super::wav::WavSplicer;

/// Combines per-chunk audio into the final artifact
#[derive(Debug, Clone, Copy)]
pub struct AudioAssembler {
    format: AudioFormat,
    bitrate_kbps: u32,
}

enum Splicer {
    Mp3(Mp3Splicer),
    Wav(WavSplicer),
}

impl AudioAssembler {
    pub fn new(format: AudioFormat, bitrate_kbps: u32) -> Self {
        Self {
            format,
            bitrate_kbps,
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Assemble segments into one audiobook
    ///
    /// Segments may arrive in any order; they must carry exactly the indices
    /// `0..N`. Each segment is dropped (releasing any spool file) as soon as
    /// it has been folded into the output, and every remaining segment is
    /// dropped on the error path.
    pub fn assemble(&self, segments: Vec<AudioSegment>) -> Result<Audiobook, AssemblyError> {
        let segments = order_segments(segments)?;
        let segment_count = segments.len();

        let mut splicer = match self.format {
            AudioFormat::Mp3 => Splicer::Mp3(Mp3Splicer::new(self.bitrate_kbps)),
            AudioFormat::Wav => Splicer::Wav(WavSplicer::new()),
        };

        for segment in segments {
            let index = segment.index();
            let data = segment
                .read()
                .map_err(|source| AssemblyError::Spool { index, source })?;

            let units = match &mut splicer {
                Splicer::Mp3(s) => s.append(index, &data)?,
                Splicer::Wav(s) => s.append(index, &data)?,
            };
            tracing::trace!(segment = index, units, "Folded audio segment");
        }

        let (data, duration) = match splicer {
            Splicer::Mp3(s) => s.finish(),
            Splicer::Wav(s) => s.finish()?,
        };

        Ok(Audiobook {
            format: self.format,
            data,
            segment_count,
            duration,
        })
    }
}

/// Sort by index and require exactly `0..N`
fn order_segments(mut segments: Vec<AudioSegment>) -> Result<Vec<AudioSegment>, AssemblyError> {
    if segments.is_empty() {
        return Err(AssemblyError::NoSegments);
    }

    segments.sort_by_key(AudioSegment::index);

    for (expected, segment) in segments.iter().enumerate() {
        match segment.index() {
            i if i == expected => {}
            i if i < expected => return Err(AssemblyError::DuplicateSegment(i)),
            _ => return Err(AssemblyError::MissingSegment(expected)),
        }
    }

    Ok(segments)
}
