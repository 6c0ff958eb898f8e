//! RIFF/WAVE splicing via `hound`
//!
//! Segments are decoded to samples and re-written through one writer, so the
//! output carries a single correct RIFF header.

use std::io::Cursor;
use std::time::Duration;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::types::{AssemblyError, AudioFormat};

/// Joins WAV segments that share one sample spec
#[derive(Default)]
pub struct WavSplicer {
    spec: Option<WavSpec>,
    int_samples: Vec<i32>,
    float_samples: Vec<f32>,
}

impl WavSplicer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one segment, returning the number of sample frames it added
    pub fn append(&mut self, index: usize, data: &[u8]) -> Result<usize, AssemblyError> {
        let invalid = |reason: String| AssemblyError::InvalidSegment {
            index,
            format: AudioFormat::Wav,
            reason,
        };

        let mut reader = WavReader::new(Cursor::new(data)).map_err(|e| invalid(e.to_string()))?;
        let spec = reader.spec();

        match self.spec {
            None => self.spec = Some(spec),
            Some(expected) if expected != spec => {
                return Err(AssemblyError::IncompatibleSegment {
                    index,
                    reason: format!(
                        "stream is {} Hz/{} ch/{} bit, segment is {} Hz/{} ch/{} bit",
                        expected.sample_rate,
                        expected.channels,
                        expected.bits_per_sample,
                        spec.sample_rate,
                        spec.channels,
                        spec.bits_per_sample
                    ),
                });
            }
            Some(_) => {}
        }

        let before = self.sample_count();
        match spec.sample_format {
            SampleFormat::Int => {
                for sample in reader.samples::<i32>() {
                    self.int_samples.push(sample.map_err(|e| invalid(e.to_string()))?);
                }
            }
            SampleFormat::Float => {
                for sample in reader.samples::<f32>() {
                    self.float_samples.push(sample.map_err(|e| invalid(e.to_string()))?);
                }
            }
        }

        let added = self.sample_count() - before;
        if added == 0 {
            return Err(invalid("segment has no samples".to_string()));
        }
        Ok(added / usize::from(spec.channels.max(1)))
    }

    fn sample_count(&self) -> usize {
        self.int_samples.len() + self.float_samples.len()
    }

    /// Write the joined stream
    pub fn finish(self) -> Result<(Vec<u8>, Duration), AssemblyError> {
        let spec = self.spec.ok_or(AssemblyError::NoSegments)?;
        let encode = |e: hound::Error| AssemblyError::Encode(e.to_string());

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).map_err(encode)?;
            for sample in &self.int_samples {
                writer.write_sample(*sample).map_err(encode)?;
            }
            for sample in &self.float_samples {
                writer.write_sample(*sample).map_err(encode)?;
            }
            writer.finalize().map_err(encode)?;
        }

        let frames = (self.sample_count() / usize::from(spec.channels.max(1))) as u64;
        let duration = Duration::from_nanos(frames * 1_000_000_000 / u64::from(spec.sample_rate.max(1)));

        Ok((cursor.into_inner(), duration))
    }
}

/// Encode 16-bit mono PCM samples as a WAV byte stream
pub fn mono_pcm16(sample_rate: u32, samples: &[i16]) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in samples {
            writer.write_sample(*sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
pub(crate) fn test_wav(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
    mono_pcm16(sample_rate, samples).unwrap()
}
