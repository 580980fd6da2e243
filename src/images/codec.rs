//! Default image codec on top of the `image` crate

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::tiff::TiffEncoder;
use image::{ColorType, DynamicImage, ImageFormat};
use log::{debug, trace};

use super::{ImageCodec, DEFAULT_QUALITY};
use crate::error::SlimResult;

/// Re-encodes raster images as low quality JPEG and fax containers as TIFF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegRecompressor {
    quality: u8,
}

impl Default for JpegRecompressor {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY)
    }
}

impl JpegRecompressor {
    /// Create a recompressor; `quality` is clamped to 1..=100
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl ImageCodec for JpegRecompressor {
    fn recompress_raster(&self, data: &[u8]) -> SlimResult<Vec<u8>> {
        let img = match image::load_from_memory(data) {
            Ok(img) => img,
            Err(e) => {
                debug!("Leaving undecodable raster data as is: {}", e);
                return Ok(data.to_vec());
            }
        };
        trace!("Decoded {}x{} raster", img.width(), img.height());
        Ok(keep_smaller(data, encode_jpeg(&img, self.quality)?))
    }

    fn recompress_tiff(&self, data: &[u8]) -> SlimResult<Vec<u8>> {
        let img = match image::load_from_memory_with_format(data, ImageFormat::Tiff) {
            Ok(img) => img,
            Err(e) => {
                debug!("Leaving undecodable TIFF data as is: {}", e);
                return Ok(data.to_vec());
            }
        };
        Ok(keep_smaller(data, encode_tiff(&img)?))
    }
}

fn keep_smaller(original: &[u8], encoded: Vec<u8>) -> Vec<u8> {
    trace!("Re-encoded {} -> {} bytes", original.len(), encoded.len());
    if encoded.len() > original.len() {
        original.to_vec()
    } else {
        encoded
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> SlimResult<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
        match img {
            DynamicImage::ImageLuma8(gray) => {
                encoder.encode(gray.as_raw(), gray.width(), gray.height(), ColorType::L8)?
            }
            other => {
                let rgb = other.to_rgb8();
                encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?
            }
        }
    }
    Ok(out)
}

fn encode_tiff(img: &DynamicImage) -> SlimResult<Vec<u8>> {
    let mut out = Vec::new();
    let encoder = TiffEncoder::new(Cursor::new(&mut out));
    match img {
        DynamicImage::ImageLuma8(gray) => {
            encoder.encode(gray.as_raw(), gray.width(), gray.height(), ColorType::L8)?
        }
        other => {
            let rgb = other.to_rgb8();
            encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?
        }
    }
    Ok(out)
}
