//! Error types for the PDF slimming library

use std::io;
use thiserror::Error;

use crate::pdf::TokenKind;

/// Main error type for parse, compress and write operations
#[derive(Error, Debug)]
pub enum PdfSlimError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// An expected keyword or delimiter was not found
    #[error("Expected {expected} at offset {offset}")]
    Structural {
        expected: &'static str,
        offset: usize,
    },

    /// The classifier reported a token the current production cannot handle
    #[error("Unexpected {kind:?} token while reading {context} at offset {offset}")]
    UnexpectedToken {
        kind: TokenKind,
        context: &'static str,
        offset: usize,
    },

    /// Integer parsing error
    #[error("Invalid integer {token:?} at offset {offset}")]
    ParseInt {
        token: String,
        offset: usize,
    },

    /// Input ended inside a construct
    #[error("Unexpected end of input while reading {expected}")]
    UnexpectedEof {
        expected: &'static str,
    },

    /// Indirect reference to an object that does not exist
    #[error("Unresolved reference {number} {generation} R")]
    UnresolvedReference {
        number: u32,
        generation: u16,
    },

    /// The same object key was defined twice
    #[error("Duplicate object {number} {generation}")]
    DuplicateObject {
        number: u32,
        generation: u16,
    },

    /// Stream length entry is missing or of the wrong kind
    #[error("Invalid stream length: {0}")]
    InvalidLength(String),

    /// Image re-encoding failed
    #[error("Image error: {0}")]
    Image(String),

    /// Invalid option value
    #[error("Invalid option {name}: {message}")]
    InvalidOption {
        name: &'static str,
        message: String,
    },
}

/// Result type for PDF slimming operations
pub type SlimResult<T> = Result<T, PdfSlimError>;

impl PdfSlimError {
    /// Create a new structural error
    pub fn structural(expected: &'static str, offset: usize) -> Self {
        Self::Structural { expected, offset }
    }

    /// Create a new unexpected-token error
    pub fn unexpected(kind: TokenKind, context: &'static str, offset: usize) -> Self {
        Self::UnexpectedToken {
            kind,
            context,
            offset,
        }
    }

    /// Create a new integer parse error
    pub fn parse_int(token: impl Into<String>, offset: usize) -> Self {
        Self::ParseInt {
            token: token.into(),
            offset,
        }
    }

    /// Create a new unresolved reference error
    pub fn unresolved(number: u32, generation: u16) -> Self {
        Self::UnresolvedReference { number, generation }
    }

    /// Create a new image error
    pub fn image(msg: impl Into<String>) -> Self {
        Self::Image(msg.into())
    }

    /// Check if error comes from malformed input
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::Structural { .. }
                | Self::UnexpectedToken { .. }
                | Self::ParseInt { .. }
                | Self::UnexpectedEof { .. }
                | Self::DuplicateObject { .. }
        )
    }

    /// Check if error breaks the document structure on write
    pub fn is_structure_error(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedReference { .. } | Self::InvalidLength(_)
        )
    }
}

impl From<image::ImageError> for PdfSlimError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}
