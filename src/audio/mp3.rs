//! MPEG Layer III frame splicing
//!
//! Constant-bitrate MP3 streams can be joined at frame boundaries without
//! re-encoding. Per segment this drops the ID3v2 header, a trailing ID3v1
//! tag and the Xing/Info/VBRI header frame (its frame count would describe
//! the segment, not the joined stream), then appends the remaining frames.

use std::time::Duration;

use super::types::{AssemblyError, AudioFormat};

const BITRATES_V1: [u32; 16] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0,
];
const BITRATES_V2: [u32; 16] = [
    0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0,
];

const ID3V1_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    V1,
    V2,
    V2_5,
}

/// Decoded 4-byte Layer III frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub padding: bool,
    pub protected: bool,
    pub mono: bool,
}

impl FrameHeader {
    /// Parse a header at the start of `bytes`; `None` if it is not a valid
    /// Layer III header.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] & 0xE0 != 0xE0 {
            return None;
        }

        let version = match (bytes[1] >> 3) & 0b11 {
            0b00 => MpegVersion::V2_5,
            0b10 => MpegVersion::V2,
            0b11 => MpegVersion::V1,
            _ => return None,
        };

        if (bytes[1] >> 1) & 0b11 != 0b01 {
            return None;
        }
        let protected = bytes[1] & 0x01 == 0;

        let table = match version {
            MpegVersion::V1 => &BITRATES_V1,
            MpegVersion::V2 | MpegVersion::V2_5 => &BITRATES_V2,
        };
        let bitrate_kbps = table[(bytes[2] >> 4) as usize];
        if bitrate_kbps == 0 {
            return None;
        }

        let base_rate = match (bytes[2] >> 2) & 0b11 {
            0 => 44_100,
            1 => 48_000,
            2 => 32_000,
            _ => return None,
        };
        let sample_rate = match version {
            MpegVersion::V1 => base_rate,
            MpegVersion::V2 => base_rate / 2,
            MpegVersion::V2_5 => base_rate / 4,
        };

        Some(Self {
            version,
            bitrate_kbps,
            sample_rate,
            padding: (bytes[2] >> 1) & 1 == 1,
            protected,
            mono: bytes[3] >> 6 == 0b11,
        })
    }

    /// Total frame length in bytes, header included
    pub fn frame_len(&self) -> usize {
        let coefficient = match self.version {
            MpegVersion::V1 => 144_000,
            MpegVersion::V2 | MpegVersion::V2_5 => 72_000,
        };
        (coefficient * self.bitrate_kbps / self.sample_rate) as usize + usize::from(self.padding)
    }

    pub fn samples_per_frame(&self) -> u32 {
        match self.version {
            MpegVersion::V1 => 1152,
            MpegVersion::V2 | MpegVersion::V2_5 => 576,
        }
    }

    fn side_info_len(&self) -> usize {
        match (self.version, self.mono) {
            (MpegVersion::V1, true) => 17,
            (MpegVersion::V1, false) => 32,
            (_, true) => 9,
            (_, false) => 17,
        }
    }
}

/// Whether `frame` carries a Xing/Info or VBRI header instead of audio
fn is_info_frame(frame: &[u8], header: &FrameHeader) -> bool {
    let offset = 4 + if header.protected { 2 } else { 0 } + header.side_info_len();
    let xing = frame
        .get(offset..offset + 4)
        .is_some_and(|tag| tag == b"Xing" || tag == b"Info");
    xing || frame.get(36..40).is_some_and(|tag| tag == b"VBRI")
}

/// Skip a leading ID3v2 tag
fn skip_id3v2(data: &[u8]) -> &[u8] {
    if data.len() < 10 || &data[..3] != b"ID3" {
        return data;
    }
    let size = data[6..10]
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | usize::from(b & 0x7F));
    let footer = if data[5] & 0x10 != 0 { 10 } else { 0 };
    &data[(10 + size + footer).min(data.len())..]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StreamParams {
    version: MpegVersion,
    sample_rate: u32,
    mono: bool,
}

/// Joins constant-bitrate Layer III segments into one stream
pub struct Mp3Splicer {
    bitrate_kbps: u32,
    params: Option<StreamParams>,
    output: Vec<u8>,
    samples: u64,
}

impl Mp3Splicer {
    pub fn new(bitrate_kbps: u32) -> Self {
        Self {
            bitrate_kbps,
            params: None,
            output: Vec::new(),
            samples: 0,
        }
    }

    /// Append the audio frames of one segment, returning how many were kept
    pub fn append(&mut self, index: usize, data: &[u8]) -> Result<usize, AssemblyError> {
        let data = skip_id3v2(data);
        let mut pos = 0;
        let mut appended = 0;
        let mut seen_frame = false;

        while pos < data.len() {
            let rest = &data[pos..];
            if rest.len() == ID3V1_LEN && rest.starts_with(b"TAG") {
                break;
            }

            let Some(header) = FrameHeader::parse(rest) else {
                // resync on the next frame header
                pos += 1;
                continue;
            };

            let len = header.frame_len();
            if len > rest.len() {
                tracing::debug!(segment = index, bytes = rest.len(), "Dropping truncated trailing frame");
                break;
            }

            let frame = &rest[..len];
            let first = !seen_frame;
            seen_frame = true;
            pos += len;

            if first && is_info_frame(frame, &header) {
                continue;
            }

            self.check_frame(index, &header)?;
            self.output.extend_from_slice(frame);
            self.samples += u64::from(header.samples_per_frame());
            appended += 1;
        }

        if appended == 0 {
            return Err(AssemblyError::InvalidSegment {
                index,
                format: AudioFormat::Mp3,
                reason: "no MPEG audio frames found".to_string(),
            });
        }

        Ok(appended)
    }

    fn check_frame(&mut self, index: usize, header: &FrameHeader) -> Result<(), AssemblyError> {
        if header.bitrate_kbps != self.bitrate_kbps {
            return Err(AssemblyError::IncompatibleSegment {
                index,
                reason: format!(
                    "frame bitrate {} kbps, expected {} kbps",
                    header.bitrate_kbps, self.bitrate_kbps
                ),
            });
        }

        let params = StreamParams {
            version: header.version,
            sample_rate: header.sample_rate,
            mono: header.mono,
        };
        match self.params {
            None => self.params = Some(params),
            Some(expected) if expected != params => {
                return Err(AssemblyError::IncompatibleSegment {
                    index,
                    reason: format!(
                        "stream is {} Hz {}, segment is {} Hz {}",
                        expected.sample_rate,
                        channel_label(expected.mono),
                        params.sample_rate,
                        channel_label(params.mono)
                    ),
                });
            }
            Some(_) => {}
        }
        Ok(())
    }

    /// Finish the stream, returning the bytes and the playback duration
    pub fn finish(self) -> (Vec<u8>, Duration) {
        let duration = match self.params {
            Some(params) => {
                Duration::from_nanos(self.samples * 1_000_000_000 / u64::from(params.sample_rate))
            }
            None => Duration::ZERO,
        };
        (self.output, duration)
    }
}

fn channel_label(mono: bool) -> &'static str {
    if mono {
        "mono"
    } else {
        "stereo"
    }
}

/// Build one MPEG-2 Layer III, 16 kHz, mono frame whose payload is `fill`
///
/// Returns `None` for bitrates MPEG-2 cannot carry. The payload is not
/// decodable audio; it exists for fakes and benchmarks.
pub fn mpeg2_mono_frame(bitrate_kbps: u32, fill: u8) -> Option<Vec<u8>> {
    let index = BITRATES_V2
        .iter()
        .position(|&kbps| kbps == bitrate_kbps && kbps != 0)?;
    let mut frame = vec![0xFF, 0xF3, ((index as u8) << 4) | 0b1000, 0xC0];
    let header = FrameHeader::parse(&frame)?;
    frame.resize(header.frame_len(), fill);
    Some(frame)
}

#[cfg(test)]
pub(crate) fn test_frame(bitrate_index: u8, fill: u8) -> Vec<u8> {
    mpeg2_mono_frame(BITRATES_V2[bitrate_index as usize], fill).expect("valid test header")
}
