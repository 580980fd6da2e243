//! PDF document parser implementation

use std::collections::HashMap;

use log::{debug, trace, warn};

use super::lexer::{find_sequence_backwards, Lexer, TokenKind};
use super::{Dictionary, Document, Object, ObjectBody, ObjectId, Stream, Trailer, Value, XrefTable};
use crate::error::{PdfSlimError, SlimResult};

const PDF_MAGIC: &[u8] = b"%PDF-";
const PDF_EOF_MARKER: &str = "%%EOF";
const STARTXREF_MARKER: &[u8] = b"startxref";
const ENDSTREAM_MARKER: &[u8] = b"endstream";

/// Parse a complete PDF file held in memory
pub fn parse_document(data: &[u8]) -> SlimResult<Document> {
    Parser::new(data).parse()
}

/// Recursive-descent PDF parser over an immutable buffer
#[derive(Debug)]
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    document: Document,
    /// In-use offsets from the file's own xref, for forward `/Length` lookups
    xref_hints: HashMap<ObjectId, usize>,
    start_xref: Option<u64>,
}

impl<'a> Parser<'a> {
    /// Create new parser instance
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
            document: Document::default(),
            xref_hints: locate_xref_hints(data),
            start_xref: None,
        }
    }

    /// Parser positioned at `offset` without xref hints
    fn probe(data: &'a [u8], offset: usize) -> Self {
        Self {
            lexer: Lexer::at(data, offset),
            document: Document::default(),
            xref_hints: HashMap::new(),
            start_xref: None,
        }
    }

    /// Parse PDF document structure
    pub fn parse(mut self) -> SlimResult<Document> {
        trace!("Starting PDF parsing");
        self.parse_header()?;

        loop {
            self.lexer.skip_comment_lines();
            if self.lexer.at_end() {
                if self.document.trailer.is_some() || self.start_xref.is_some() {
                    warn!("File ends without {}", PDF_EOF_MARKER);
                    break;
                }
                return Err(PdfSlimError::UnexpectedEof {
                    expected: PDF_EOF_MARKER,
                });
            }

            let kind = self.lexer.peek_kind();
            let offset = self.lexer.position();
            match kind {
                TokenKind::ObjectStart => {
                    let object = self.parse_object()?;
                    self.document.insert(object)?;
                }
                TokenKind::Xref => {
                    self.document.xref = XrefTable::parse(&mut self.lexer)?;
                }
                TokenKind::Trailer => {
                    let trailer = self.parse_trailer()?;
                    self.document.trailer = Some(trailer);
                }
                TokenKind::StartXref => {
                    let start_xref = self.parse_startxref()?;
                    match self.document.trailer.as_mut() {
                        Some(trailer) => trailer.start_xref = start_xref,
                        None => debug!("startxref {} without trailer dictionary", start_xref),
                    }
                    self.start_xref = Some(start_xref);
                }
                TokenKind::EndOfFile => {
                    self.lexer.expect_delimiter(PDF_EOF_MARKER)?;
                    self.lexer.skip_whitespace();
                    if !self.lexer.at_end() {
                        warn!(
                            "Ignoring {} bytes after {}",
                            self.lexer.remaining().len(),
                            PDF_EOF_MARKER
                        );
                    }
                    break;
                }
                kind => return Err(PdfSlimError::unexpected(kind, "document body", offset)),
            }
        }

        debug!(
            "Parsed {} objects, {} xref entries",
            self.document.len(),
            self.document.xref.len()
        );
        Ok(self.document)
    }

    fn parse_header(&mut self) -> SlimResult<()> {
        if !self.lexer.starts_with(PDF_MAGIC) {
            return Err(PdfSlimError::structural("%PDF- header", 0));
        }
        let header = self.lexer.read_line()?;
        trace!("Header {}", String::from_utf8_lossy(header));
        self.document.header = header.to_vec();

        // binary marker comment
        if self.lexer.starts_with(b"%") && !self.lexer.starts_with(PDF_EOF_MARKER.as_bytes()) {
            let comment = self.lexer.read_line()?;
            trace!("Header comment of {} bytes", comment.len());
            self.document.comment = Some(comment.to_vec());
        }
        Ok(())
    }

    /// `<n> <g> obj` body... `endobj`
    fn parse_object(&mut self) -> SlimResult<Object> {
        let number: u32 = self.lexer.read_unsigned()?;
        let generation: u16 = self.lexer.read_unsigned()?;
        self.lexer.expect_keyword("obj")?;
        let id = ObjectId::new(number, generation);
        trace!("Parsing object {}", id);

        let mut body: Option<ObjectBody> = None;
        loop {
            let kind = self.lexer.peek_kind();
            let offset = self.lexer.position();
            match kind {
                TokenKind::EndObject => {
                    self.lexer.expect_keyword("endobj")?;
                    break;
                }
                TokenKind::DictOpen => {
                    body = Some(ObjectBody::Dictionary(self.parse_dictionary()?));
                }
                TokenKind::StreamBegin => {
                    let dict = match body.take() {
                        Some(ObjectBody::Dictionary(dict)) => dict,
                        _ => return Err(PdfSlimError::structural("stream dictionary", offset)),
                    };
                    body = Some(ObjectBody::Stream(self.parse_stream(id, dict)?));
                }
                TokenKind::ArrayOpen => {
                    body = Some(ObjectBody::Array(self.parse_array()?));
                }
                TokenKind::Integer => {
                    body = Some(ObjectBody::Integer(self.lexer.read_integer()?));
                }
                TokenKind::Name
                | TokenKind::Real
                | TokenKind::Reference
                | TokenKind::LiteralString
                | TokenKind::HexString
                | TokenKind::Boolean
                | TokenKind::Null => {
                    body = Some(ObjectBody::Scalar(self.parse_value("object body")?));
                }
                _ if self.lexer.at_end() => {
                    return Err(PdfSlimError::UnexpectedEof { expected: "endobj" })
                }
                kind => return Err(PdfSlimError::unexpected(kind, "object body", offset)),
            }
        }

        debug!("Parsed object {}", id);
        Ok(Object::new(id, body.unwrap_or(ObjectBody::Scalar(Value::Null))))
    }

    /// Any direct value
    fn parse_value(&mut self, context: &'static str) -> SlimResult<Value> {
        let kind = self.lexer.peek_kind();
        let offset = self.lexer.position();
        let value = match kind {
            TokenKind::Name => Value::Name(self.lexer.read_name()?),
            TokenKind::Integer => Value::Integer(self.lexer.read_integer()?),
            TokenKind::Real => Value::Real(self.lexer.read_real()?),
            TokenKind::Reference => {
                let number: u32 = self.lexer.read_unsigned()?;
                let generation: u16 = self.lexer.read_unsigned()?;
                self.lexer.expect_keyword("R")?;
                Value::Reference(ObjectId::new(number, generation))
            }
            TokenKind::DictOpen => Value::Dictionary(self.parse_dictionary()?),
            TokenKind::ArrayOpen => Value::Array(self.parse_array()?),
            TokenKind::LiteralString => Value::LiteralString(self.lexer.read_literal_string()?),
            TokenKind::HexString => Value::HexString(self.lexer.read_hex_string()?),
            TokenKind::Boolean => Value::Boolean(self.lexer.read_word("boolean")? == b"true"),
            TokenKind::Null => {
                self.lexer.expect_keyword("null")?;
                Value::Null
            }
            _ if self.lexer.at_end() => return Err(PdfSlimError::UnexpectedEof { expected: context }),
            kind => return Err(PdfSlimError::unexpected(kind, context, offset)),
        };
        Ok(value)
    }

    /// `<< /Key value ... >>`
    fn parse_dictionary(&mut self) -> SlimResult<Dictionary> {
        self.lexer.expect_delimiter("<<")?;
        let mut dict = Dictionary::new();

        loop {
            let kind = self.lexer.peek_kind();
            let offset = self.lexer.position();
            match kind {
                TokenKind::DictClose => {
                    self.lexer.expect_delimiter(">>")?;
                    return Ok(dict);
                }
                TokenKind::Name => {
                    let key = self.lexer.read_name()?;
                    let value = self.parse_value("dictionary value")?;
                    trace!("Dictionary entry /{}", key);
                    dict.push(key, value);
                }
                _ if self.lexer.at_end() => {
                    return Err(PdfSlimError::UnexpectedEof { expected: ">>" })
                }
                kind => return Err(PdfSlimError::unexpected(kind, "dictionary key", offset)),
            }
        }
    }

    /// `[ value ... ]`
    fn parse_array(&mut self) -> SlimResult<Vec<Value>> {
        self.lexer.expect_delimiter("[")?;
        let mut items = Vec::new();

        loop {
            match self.lexer.peek_kind() {
                TokenKind::ArrayClose => {
                    self.lexer.expect_delimiter("]")?;
                    return Ok(items);
                }
                TokenKind::DictClose => {
                    return Err(PdfSlimError::unexpected(
                        TokenKind::DictClose,
                        "array",
                        self.lexer.position(),
                    ))
                }
                _ => items.push(self.parse_value("array")?),
            }
        }
    }

    /// `stream` EOL body EOL `endstream`, body length taken from `/Length`
    fn parse_stream(&mut self, id: ObjectId, mut dict: Dictionary) -> SlimResult<Stream> {
        self.lexer.expect_keyword("stream")?;
        self.lexer.skip_eol();
        let start = self.lexer.position();
        let data = self.lexer.data();

        let declared = self
            .declared_length(&dict)
            .and_then(|length| start.checked_add(length))
            .filter(|&end| end <= data.len() && self.endstream_follows(end));

        let end = match declared {
            Some(end) => end,
            None => {
                let end = self.search_endstream(start)?;
                warn!(
                    "Stream {} /Length does not reach endstream, recovered {} bytes by search",
                    id,
                    end - start
                );
                dict.set("Length", Value::Integer((end - start) as i64));
                end
            }
        };

        self.lexer.rewind(end);
        self.lexer.skip_eol();
        self.lexer.expect_keyword("endstream")?;
        debug!("Read {} byte stream body for object {}", end - start, id);
        Ok(Stream::new(dict, data[start..end].to_vec()))
    }

    /// `/Length` from a literal, an already parsed object or a forward xref lookup
    fn declared_length(&self, dict: &Dictionary) -> Option<usize> {
        if let Ok(length) = self.document.resolve_length(dict) {
            return Some(length);
        }
        let target = dict.get_reference("Length")?;
        let length = self.forward_length(target);
        if length.is_some() {
            debug!("Resolved forward /Length {} R through xref", target);
        }
        length
    }

    fn forward_length(&self, id: ObjectId) -> Option<usize> {
        let offset = *self.xref_hints.get(&id)?;
        let mut probe = Parser::probe(self.lexer.data(), offset);
        if probe.lexer.peek_kind() != TokenKind::ObjectStart {
            return None;
        }
        match probe.parse_object() {
            Ok(object) if object.id == id => object
                .as_integer()
                .and_then(|length| usize::try_from(length).ok()),
            _ => None,
        }
    }

    fn endstream_follows(&self, end: usize) -> bool {
        let mut probe = Lexer::at(self.lexer.data(), end);
        probe.skip_eol();
        probe.starts_with(ENDSTREAM_MARKER)
    }

    /// End of the body before the first EOL-prefixed `endstream`
    fn search_endstream(&self, start: usize) -> SlimResult<usize> {
        let data = self.lexer.data();
        let mut from = start;

        loop {
            let at = self.lexer.find(ENDSTREAM_MARKER, from).ok_or(PdfSlimError::UnexpectedEof {
                expected: "endstream",
            })?;
            if at == start {
                return Ok(start);
            }
            match data[at - 1] {
                b'\n' if at - 1 > start && data[at - 2] == b'\r' => return Ok(at - 2),
                b'\n' | b'\r' => return Ok(at - 1),
                _ => from = at + 1,
            }
        }
    }

    /// `trailer << ... >> startxref <offset>`
    fn parse_trailer(&mut self) -> SlimResult<Trailer> {
        self.lexer.expect_keyword("trailer")?;
        let dict = self.parse_dictionary()?;
        self.lexer.skip_comment_lines();
        let start_xref = self.parse_startxref()?;
        self.start_xref = Some(start_xref);
        debug!("Parsed trailer with {} entries", dict.len());
        Ok(Trailer::new(dict, start_xref))
    }

    fn parse_startxref(&mut self) -> SlimResult<u64> {
        self.lexer.expect_keyword("startxref")?;
        self.lexer.read_unsigned()
    }
}

/// In-use offsets of the xref table named by the last `startxref`
fn locate_xref_hints(data: &[u8]) -> HashMap<ObjectId, usize> {
    let Some(at) = find_sequence_backwards(data, STARTXREF_MARKER) else {
        return HashMap::new();
    };

    let mut lexer = Lexer::at(data, at);
    let table = lexer
        .expect_keyword("startxref")
        .and_then(|_| lexer.read_unsigned::<usize>())
        .and_then(|offset| XrefTable::parse(&mut Lexer::at(data, offset)));

    match table {
        Ok(table) => {
            trace!("Loaded {} xref hints", table.len());
            table.in_use_offsets()
        }
        Err(e) => {
            debug!("No usable xref for forward lookups: {}", e);
            HashMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_log::test;

    /// Assemble a file from object sources with a correct xref and trailer
    fn build_pdf(objects: &[&[u8]]) -> Vec<u8> {
        let mut out = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n".to_vec();
        let mut offsets = Vec::new();
        for (i, source) in objects.iter().enumerate() {
            offsets.push((ObjectId::new(i as u32 + 1, 0), out.len()));
            out.extend_from_slice(source);
        }
        let xref_at = out.len();
        XrefTable::rebuild(&offsets).write_to(&mut out).unwrap();
        let trailer = format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        );
        out.extend_from_slice(trailer.as_bytes());
        out
    }

    fn stream_body(doc: &Document, number: u32) -> Vec<u8> {
        doc.get(ObjectId::new(number, 0))
            .and_then(Object::stream)
            .map(|s| s.data().to_vec())
            .unwrap()
    }

    #[test]
    fn test_minimal_document() {
        let data = build_pdf(&[
            b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n",
            b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n",
        ]);
        let doc = parse_document(&data).unwrap();

        assert_eq!(doc.header, b"%PDF-1.4".to_vec());
        assert_eq!(doc.len(), 2);
        let catalog = doc.get(ObjectId::new(1, 0)).and_then(Object::dict).unwrap();
        assert_eq!(catalog.get_name("Type"), Some("Catalog"));
        assert_eq!(catalog.get_reference("Pages"), Some(ObjectId::new(2, 0)));
        assert_eq!(doc.xref.entries().iter().filter(|e| e.in_use).count(), 2);

        let trailer = doc.trailer.as_ref().unwrap();
        assert_eq!(trailer.dict.get_integer("Size"), Some(3));
    }

    #[test]
    fn test_stream_body_is_length_driven() {
        let body = b"\xff\xd8\nendstream\r\n\x00\x01";
        let mut source = format!("1 0 obj\n<< /Length {} >>\nstream\n", body.len()).into_bytes();
        source.extend_from_slice(body);
        source.extend_from_slice(b"\nendstream\nendobj\n");
        let data = build_pdf(&[source.as_slice()]);

        let doc = parse_document(&data).unwrap();
        assert_eq!(stream_body(&doc, 1), body.to_vec());
    }

    #[test]
    fn test_crlf_after_stream_keyword() {
        let data = build_pdf(&[b"1 0 obj\r\n<< /Length 4 >>\r\nstream\r\nABCD\r\nendstream\r\nendobj\r\n"]);
        let doc = parse_document(&data).unwrap();
        assert_eq!(stream_body(&doc, 1), b"ABCD".to_vec());
    }

    #[test]
    fn test_backward_indirect_length() {
        let data = build_pdf(&[
            b"1 0 obj\n5\nendobj\n",
            b"2 0 obj\n<< /Length 1 0 R >>\nstream\nHELLO\nendstream\nendobj\n",
        ]);
        let doc = parse_document(&data).unwrap();
        assert_eq!(stream_body(&doc, 2), b"HELLO".to_vec());
    }

    #[test]
    fn test_forward_indirect_length_through_xref() {
        let data = build_pdf(&[
            b"1 0 obj\n<< /Length 2 0 R >>\nstream\nA\nendstream\nB\nendstream\nendobj\n",
            b"2 0 obj\n13\nendobj\n",
        ]);
        let doc = parse_document(&data).unwrap();
        assert_eq!(stream_body(&doc, 1), b"A\nendstream\nB".to_vec());
    }

    #[test]
    fn test_wrong_length_falls_back_to_search() {
        let data = build_pdf(&[b"1 0 obj\n<< /Length 99 >>\nstream\nshort\r\nendstream\nendobj\n"]);
        let doc = parse_document(&data).unwrap();
        assert_eq!(stream_body(&doc, 1), b"short".to_vec());
    }

    #[test]
    fn test_recovered_stream_length_is_corrected_on_write() {
        let data = build_pdf(&[b"1 0 obj\n<< /Length 99 >>\nstream\nshort\nendstream\nendobj\n"]);
        let mut doc = parse_document(&data).unwrap();
        let stream = doc.get(ObjectId::new(1, 0)).and_then(Object::stream).unwrap();
        assert_eq!(stream.dict.get_integer("Length"), Some(5));

        let written = crate::pdf::serialize_document(&mut doc).unwrap();
        let reparsed = parse_document(&written).unwrap();
        let stream = reparsed.get(ObjectId::new(1, 0)).and_then(Object::stream).unwrap();
        assert_eq!(stream.dict.get_integer("Length"), Some(stream.len() as i64));
        assert_eq!(stream.data(), b"short");
    }

    #[test]
    fn test_unresolvable_indirect_length_is_replaced_inline() {
        let data = build_pdf(&[b"1 0 obj\n<< /Length 7 0 R >>\nstream\nabc\nendstream\nendobj\n"]);
        let doc = parse_document(&data).unwrap();
        let stream = doc.get(ObjectId::new(1, 0)).and_then(Object::stream).unwrap();
        assert_eq!(stream.dict.get("Length"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_empty_stream_body() {
        let data = build_pdf(&[b"1 0 obj\n<< /Length 0 >>\nstream\n\nendstream\nendobj\n"]);
        let doc = parse_document(&data).unwrap();
        assert!(stream_body(&doc, 1).is_empty());
    }

    #[test]
    fn test_array_with_glued_terminators_and_strings() {
        let data = build_pdf(&[
            b"1 0 obj\n[/Indexed /DeviceRGB 255 <00FF00>(lit) 3 0 R 1.5 true null [1 2]]\nendobj\n",
        ]);
        let doc = parse_document(&data).unwrap();
        let object = doc.get(ObjectId::new(1, 0)).unwrap();
        let ObjectBody::Array(items) = &object.body else {
            panic!("expected array body, got {:?}", object.body);
        };
        assert_eq!(
            items,
            &vec![
                Value::Name("Indexed".into()),
                Value::Name("DeviceRGB".into()),
                Value::Integer(255),
                Value::HexString("00FF00".into()),
                Value::LiteralString(b"lit".to_vec()),
                Value::Reference(ObjectId::new(3, 0)),
                Value::Real(1.5),
                Value::Boolean(true),
                Value::Null,
                Value::Array(vec![Value::Integer(1), Value::Integer(2)]),
            ]
        );
    }

    #[test]
    fn test_dictionary_key_order_preserved() {
        let data = build_pdf(&[b"1 0 obj\n<</Z 1/A 2/M<</Inner/Yes>>>>\nendobj\n"]);
        let doc = parse_document(&data).unwrap();
        let dict = doc.get(ObjectId::new(1, 0)).and_then(Object::dict).unwrap();
        let keys: Vec<&str> = dict.pairs().iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["Z", "A", "M"]);
    }

    #[test]
    fn test_scalar_object_bodies() {
        let data = build_pdf(&[b"1 0 obj\n42\nendobj\n", b"2 0 obj\n/Name\nendobj\n", b"3 0 obj\nendobj\n"]);
        let doc = parse_document(&data).unwrap();
        assert_eq!(doc.get(ObjectId::new(1, 0)).and_then(Object::as_integer), Some(42));
        assert_eq!(
            doc.get(ObjectId::new(2, 0)).map(|o| o.body.clone()),
            Some(ObjectBody::Scalar(Value::Name("Name".into())))
        );
        assert_eq!(
            doc.get(ObjectId::new(3, 0)).map(|o| o.body.clone()),
            Some(ObjectBody::Scalar(Value::Null))
        );
    }

    #[test]
    fn test_invalid_header() {
        assert!(matches!(
            parse_document(b"%PS-Adobe\n"),
            Err(PdfSlimError::Structural { offset: 0, .. })
        ));
    }

    #[test]
    fn test_unexpected_token_in_body() {
        let err = parse_document(b"%PDF-1.4\n@@garbage\n").unwrap_err();
        assert!(matches!(
            err,
            PdfSlimError::UnexpectedToken { kind: TokenKind::Unknown, offset: 9, .. }
        ));
    }

    #[test]
    fn test_dict_close_inside_array() {
        let err = parse_document(b"%PDF-1.4\n1 0 obj\n[ 1 >>\nendobj\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unexpected DictClose token while reading array at offset 21"
        );
    }

    #[test]
    fn test_duplicate_object_is_rejected() {
        let data = build_pdf(&[b"1 0 obj\n1\nendobj\n1 0 obj\n2\nendobj\n"]);
        assert!(matches!(
            parse_document(&data),
            Err(PdfSlimError::DuplicateObject { number: 1, generation: 0 })
        ));
    }

    #[test]
    fn test_same_number_with_new_generation_is_rejected() {
        let data = build_pdf(&[b"1 0 obj\n1\nendobj\n1 1 obj\n2\nendobj\n"]);
        assert!(matches!(
            parse_document(&data),
            Err(PdfSlimError::DuplicateObject { number: 1, generation: 1 })
        ));
    }

    #[test]
    fn test_header_comment_is_kept() {
        let data = build_pdf(&[b"1 0 obj\n1\nendobj\n"]);
        let doc = parse_document(&data).unwrap();
        assert_eq!(doc.comment, Some(b"%\xe2\xe3\xcf\xd3".to_vec()));

        let bare = parse_document(b"%PDF-1.4\n1 0 obj\n1\nendobj\ntrailer\n<< >>\nstartxref\n0\n%%EOF\n").unwrap();
        assert_eq!(bare.comment, None);
    }

    #[test]
    fn test_truncated_object() {
        let err = parse_document(b"%PDF-1.4\n1 0 obj\n<< /A 1 >>\n").unwrap_err();
        assert!(matches!(err, PdfSlimError::UnexpectedEof { expected: "endobj" }));
    }

    #[test]
    fn test_missing_trailer_and_eof() {
        let err = parse_document(b"%PDF-1.4\n1 0 obj\n1\nendobj\n").unwrap_err();
        assert!(matches!(err, PdfSlimError::UnexpectedEof { expected: "%%EOF" }));
    }

    #[test]
    fn test_bare_startxref_and_trailing_garbage() {
        let data = b"%PDF-1.4\n1 0 obj\n1\nendobj\nstartxref\n0\n%%EOF\nleftover";
        let doc = parse_document(data).unwrap();
        assert_eq!(doc.len(), 1);
        assert!(doc.trailer.is_none());
    }
}
