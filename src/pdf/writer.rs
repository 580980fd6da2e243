//! Document serializer

use std::io::Write;

use log::debug;

use super::{Document, Trailer, Value, XrefTable};
use crate::error::SlimResult;

/// Serialize `document`, rebuilding its xref table and trailer `/Size`
pub fn serialize_document(document: &mut Document) -> SlimResult<Vec<u8>> {
    let mut output = Vec::new();
    output.write_all(&document.header)?;
    output.write_all(b"\n")?;
    if let Some(comment) = &document.comment {
        output.write_all(comment)?;
        output.write_all(b"\n")?;
    }

    let mut offsets = Vec::with_capacity(document.len());
    for object in document.objects() {
        offsets.push((object.id, output.len()));
        object.write_to(&mut output)?;
    }

    let xref_offset = output.len();
    let xref = XrefTable::rebuild(&offsets);
    xref.write_to(&mut output)?;

    let size = Value::Integer(i64::from(document.max_object_number()) + 1);
    let trailer = document.trailer.get_or_insert_with(Trailer::default);
    if trailer.dict.is_empty() || trailer.dict.contains_key("Size") {
        trailer.dict.set("Size", size);
    }
    trailer.start_xref = xref_offset as u64;
    trailer.write_to(&mut output)?;

    debug!(
        "Wrote {} objects, xref at offset {}, {} bytes total",
        offsets.len(),
        xref_offset,
        output.len()
    );
    document.xref = xref;
    Ok(output)
}
