//! Audiobook Server Library
//!
//! Turns an uploaded PDF into a single audio file: text extraction with an
//! OCR fallback, fixed-window chunking, per-chunk speech synthesis and
//! ordered reassembly. The server binary is in main.rs.
//!
//! # Modules
//!
//! - `extract`: Text Extractor (text layer, then OCR)
//! - `chunking`: Chunk Planner
//! - `speech`: Voice registry and synthesis backends
//! - `audio`: Segment splicing and the Audio Assembler
//! - `jobs`: Job lifecycle and the Pipeline Coordinator
//! - `routes`: HTTP surface

pub mod audio;
pub mod chunking;
pub mod config;
pub mod error;
pub mod extract;
pub mod jobs;
pub mod ocr;
pub mod pdf;
pub mod routes;
pub mod speech;
pub mod state;
pub mod storage;
