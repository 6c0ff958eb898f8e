//! Pixmap encoding for OCR input

use std::io::Cursor;

use image::{DynamicImage, GrayImage};

use super::source::PdfError;

/// Encode a MuPDF pixmap as an 8-bit grayscale PNG
pub(crate) fn encode_grayscale_png(pixmap: &mupdf::Pixmap) -> Result<Vec<u8>, PdfError> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let n = pixmap.n() as usize;

    let luma = to_luma(pixmap.samples(), width, height, n);
    encode_luma_png(luma, width, height)
}

/// Collapse interleaved samples (gray, RGB, or either plus alpha) to luma
fn to_luma(samples: &[u8], width: u32, height: u32, n: usize) -> Vec<u8> {
    let pixels = width as usize * height as usize;
    let mut luma = Vec::with_capacity(pixels);

    for pixel in 0..pixels {
        let offset = pixel * n;
        let value = if n >= 3 {
            let r = samples.get(offset).copied().unwrap_or(255) as u32;
            let g = samples.get(offset + 1).copied().unwrap_or(255) as u32;
            let b = samples.get(offset + 2).copied().unwrap_or(255) as u32;
            // ITU-R 601 weights, integer form
            ((r * 299 + g * 587 + b * 114) / 1000) as u8
        } else {
            samples.get(offset).copied().unwrap_or(255)
        };
        luma.push(value);
    }

    luma
}

fn encode_luma_png(luma: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>, PdfError> {
    let img = GrayImage::from_raw(width, height, luma)
        .ok_or_else(|| PdfError::Image("Failed to create image buffer".to_string()))?;

    let mut output = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)
        .map_err(|e| PdfError::Image(e.to_string()))?;

    Ok(output)
}
