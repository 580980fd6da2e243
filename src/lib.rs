//! PDF slimming library for Rust
//!
//! Parses a PDF file into an in-memory object model, re-encodes its image
//! XObject streams at a lower quality and writes the document back with a
//! freshly computed cross-reference table.

use std::fs;
use std::path::Path;

use log::{debug, info};

mod error;
pub mod images;
pub mod pdf;

pub use error::{PdfSlimError, SlimResult};
pub use images::{
    compress_image_streams, export_images, CompressOptions, CompressionReport, ImageCodec,
    JpegRecompressor,
};
pub use pdf::{parse_document, serialize_document, Document, ObjectId};

/// Read a whole file into memory
pub fn read_file(path: impl AsRef<Path>) -> SlimResult<Vec<u8>> {
    let path = path.as_ref();
    let data = fs::read(path)?;
    debug!("Read {} bytes from {}", data.len(), path.display());
    Ok(data)
}

/// Serialize `document`, running the compression pass with the default
/// codec first when `compress` is set
pub fn write_document(document: &mut Document, compress: bool) -> SlimResult<Vec<u8>> {
    if compress {
        compress_image_streams(
            document,
            &JpegRecompressor::default(),
            &CompressOptions::default(),
        )?;
    }
    serialize_document(document)
}

/// Parse, recompress and rewrite PDF documents
pub struct PdfSlim {
    options: CompressOptions,
    compress: bool,
    codec: Box<dyn ImageCodec>,
}

impl Default for PdfSlim {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfSlim {
    /// Create a new instance with default options
    pub fn new() -> Self {
        let options = CompressOptions::default();
        Self {
            options,
            compress: true,
            codec: Box::new(JpegRecompressor::new(options.quality)),
        }
    }

    /// Create an instance using `options` and the default codec
    pub fn with_options(options: CompressOptions) -> SlimResult<Self> {
        options.validate()?;
        Ok(Self {
            options,
            compress: true,
            codec: Box::new(JpegRecompressor::new(options.quality)),
        })
    }

    /// Replace the image codec
    pub fn with_codec(mut self, codec: Box<dyn ImageCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Enable or disable the compression pass
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn options(&self) -> &CompressOptions {
        &self.options
    }

    /// Parse `pdf_data`, recompress its images and serialize it again
    pub fn process(&self, pdf_data: &[u8]) -> SlimResult<(Vec<u8>, CompressionReport)> {
        let mut document = parse_document(pdf_data)?;

        let report = if self.compress {
            compress_image_streams(&mut document, self.codec.as_ref(), &self.options)?
        } else {
            CompressionReport::default()
        };

        let output = serialize_document(&mut document)?;
        info!("Rewrote document: {} -> {} bytes", pdf_data.len(), output.len());
        Ok((output, report))
    }

    /// Process `input` and write the result to `output`
    pub fn process_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> SlimResult<CompressionReport> {
        let data = read_file(input)?;
        let (bytes, report) = self.process(&data)?;
        fs::write(output.as_ref(), bytes)?;
        debug!("Wrote {}", output.as_ref().display());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_log::test;

    const SAMPLE: &[u8] = b"%PDF-1.4\n\
        1 0 obj\n<< /Type /Catalog >>\nendobj\n\
        2 0 obj\n<< /Type /XObject /Subtype /Image /Filter /DCTDecode /Length 4 >>\nstream\nABCD\nendstream\nendobj\n\
        trailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n0\n%%EOF\n";

    #[test]
    fn test_process_without_compression_is_stable() {
        let slim = PdfSlim::new().compress(false);
        let (first, report) = slim.process(SAMPLE).unwrap();
        let (second, _) = slim.process(&first).unwrap();

        assert_eq!(report, CompressionReport::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_undecodable_images_survive_compression() {
        let (output, report) = PdfSlim::new().process(SAMPLE).unwrap();
        assert_eq!(report.images_seen, 1);
        assert_eq!(report.images_replaced, 0);

        let doc = parse_document(&output).unwrap();
        let stream = doc.get(ObjectId::new(2, 0)).and_then(|o| o.stream()).unwrap();
        assert_eq!(stream.data(), b"ABCD");
    }

    #[test]
    fn test_invalid_quality() {
        let options = CompressOptions {
            quality: 101,
            ..CompressOptions::default()
        };
        assert!(PdfSlim::with_options(options).is_err());
    }

    #[test]
    fn test_process_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        fs::write(&input, SAMPLE).unwrap();

        PdfSlim::new().process_file(&input, &output).unwrap();
        let written = read_file(&output).unwrap();
        assert!(written.starts_with(b"%PDF-1.4\n"));
        assert!(written.ends_with(b"%%EOF\n"));
    }

    #[test]
    fn test_write_document_without_compression() {
        let mut doc = parse_document(SAMPLE).unwrap();
        let out = write_document(&mut doc, false).unwrap();
        assert!(out.windows(7).any(|w| w == b"2 0 obj"));
    }
}
