//! Audio Module
//!
//! Per-chunk audio segments and their assembly into a single audiobook.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use audiobook_server::audio::{AudioAssembler, AudioFormat, AudioSegment};
//!
//! let assembler = AudioAssembler::new(AudioFormat::Mp3, 128);
//! let book = assembler.assemble(vec![
//!     AudioSegment::in_memory(1, second),
//!     AudioSegment::in_memory(0, first),
//! ])?;
//! ```

mod assembler;
pub mod mp3;
mod types;
pub mod wav;

pub use assembler::AudioAssembler;
pub use types::{AssemblyError, AudioFormat, AudioSegment, Audiobook};
