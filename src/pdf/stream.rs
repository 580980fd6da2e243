//! PDF stream object implementation

use std::io::{self, Write};

use super::Dictionary;

/// PDF stream object
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    /// Stream dictionary
    pub dict: Dictionary,
    /// Raw (still encoded) stream body
    data: Vec<u8>,
}

impl Stream {
    /// Create new stream object
    pub fn new(dict: Dictionary, data: Vec<u8>) -> Self {
        Self { dict, data }
    }

    /// Raw stream body as stored in the file
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Replace the body; the caller owns the `/Length` update
    pub fn set_data(&mut self, data: Vec<u8>) -> Vec<u8> {
        std::mem::replace(&mut self.data, data)
    }

    /// Write dictionary, body and the stream framing keywords
    pub fn write_to<W: Write>(&self, output: &mut W) -> io::Result<()> {
        self.dict.write_to(output)?;
        output.write_all(b"stream\n")?;
        output.write_all(&self.data)?;
        output.write_all(b"\nendstream\n")
    }
}
