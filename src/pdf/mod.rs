//! PDF access
//!
//! Text layer extraction and page rasterisation on top of MuPDF, behind the
//! `PdfSource` trait so extraction can run against fakes in tests.

mod raster;
mod source;

pub use source::{MuPdfSource, PdfError, PdfSource};
