//! PDF cross-reference table implementation

use std::collections::HashMap;
use std::io::{self, Write};

use log::{debug, trace};

use super::lexer::{Lexer, TokenKind};
use super::ObjectId;
use crate::error::{PdfSlimError, SlimResult};

/// Generation number carried by the head of the free list
pub const FREE_HEAD_GENERATION: u16 = 65535;

/// Single cross-reference entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrefEntry {
    pub number: u32,
    pub generation: u16,
    pub offset: u64,
    pub in_use: bool,
}

impl XrefEntry {
    pub fn id(&self) -> ObjectId {
        ObjectId::new(self.number, self.generation)
    }

    /// Write the fixed 20-byte entry line
    fn write_to<W: Write>(&self, output: &mut W) -> io::Result<()> {
        let flag = if self.in_use { 'n' } else { 'f' };
        writeln!(output, "{:010} {:05} {} ", self.offset, self.generation, flag)
    }
}

/// PDF cross-reference table, entries in ascending object number order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XrefTable {
    entries: Vec<XrefEntry>,
}

impl XrefTable {
    /// Create new xref table
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Parse `xref` followed by one or more `start count` subsections
    pub fn parse(lexer: &mut Lexer<'_>) -> SlimResult<Self> {
        lexer.expect_keyword("xref")?;
        let mut entries = Vec::new();

        while lexer.peek_kind() == TokenKind::Integer {
            let start: u32 = lexer.read_unsigned()?;
            let count: u32 = lexer.read_unsigned()?;
            trace!("Xref subsection {} {}", start, count);

            for i in 0..count {
                let offset: u64 = lexer.read_unsigned()?;
                let generation: u16 = lexer.read_unsigned()?;
                lexer.skip_whitespace();
                let flag_at = lexer.position();
                let in_use = match lexer.read_word("xref entry flag")? {
                    b"n" => true,
                    b"f" => false,
                    _ => return Err(PdfSlimError::structural("xref entry flag n or f", flag_at)),
                };
                entries.push(XrefEntry {
                    number: start + i,
                    generation,
                    offset,
                    in_use,
                });
            }
        }

        debug!("Read xref table with {} entries", entries.len());
        Ok(Self { entries })
    }

    /// Fresh table for objects written at the given offsets: the free-list
    /// head plus one in-use entry per object
    pub fn rebuild(offsets: &[(ObjectId, usize)]) -> Self {
        let mut entries: Vec<XrefEntry> = offsets
            .iter()
            .map(|&(id, offset)| XrefEntry {
                number: id.number,
                generation: id.generation,
                offset: offset as u64,
                in_use: true,
            })
            .collect();
        entries.sort_by_key(|e| e.number);

        if entries.first().map_or(true, |e| e.number != 0) {
            entries.insert(
                0,
                XrefEntry {
                    number: 0,
                    generation: FREE_HEAD_GENERATION,
                    offset: 0,
                    in_use: false,
                },
            );
        }

        Self { entries }
    }

    /// Get xref table entries
    pub fn entries(&self) -> &[XrefEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// In-use entry for `id`
    pub fn find(&self, id: ObjectId) -> Option<&XrefEntry> {
        self.entries.iter().find(|e| e.in_use && e.id() == id)
    }

    /// Map of in-use object keys to byte offsets
    pub fn in_use_offsets(&self) -> HashMap<ObjectId, usize> {
        self.entries
            .iter()
            .filter(|e| e.in_use)
            .map(|e| (e.id(), e.offset as usize))
            .collect()
    }

    /// Split entries into maximal runs of consecutive object numbers
    pub fn segments(&self) -> Vec<&[XrefEntry]> {
        let mut segments = Vec::new();
        let mut rest = self.entries.as_slice();

        while let Some(first) = rest.first() {
            let run = rest
                .iter()
                .enumerate()
                .take_while(|(i, e)| e.number as u64 == first.number as u64 + *i as u64)
                .count();
            let (segment, tail) = rest.split_at(run);
            segments.push(segment);
            rest = tail;
        }

        segments
    }

    /// Write `xref` and every subsection
    pub fn write_to<W: Write>(&self, output: &mut W) -> io::Result<()> {
        output.write_all(b"xref\n")?;
        for segment in self.segments() {
            writeln!(output, "{} {}", segment[0].number, segment.len())?;
            for entry in segment {
                entry.write_to(output)?;
            }
        }
        Ok(())
    }
}
