//! In-memory document model

use std::collections::HashMap;
use std::io::{self, Write};

use super::{Dictionary, Object, ObjectBody, ObjectId, Value, XrefTable};
use crate::error::{PdfSlimError, SlimResult};

/// Trailer dictionary plus the `startxref` offset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trailer {
    pub dict: Dictionary,
    /// Only meaningful right after a write
    pub start_xref: u64,
}

impl Trailer {
    pub fn new(dict: Dictionary, start_xref: u64) -> Self {
        Self { dict, start_xref }
    }

    /// Write trailer, `startxref` and the end-of-file marker
    pub fn write_to<W: Write>(&self, output: &mut W) -> io::Result<()> {
        output.write_all(b"trailer\n")?;
        self.dict.write_to(output)?;
        write!(output, "startxref\n{}\n%%EOF\n", self.start_xref)
    }
}

/// Parsed PDF document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Header line without its end-of-line, e.g. `%PDF-1.7`
    pub header: Vec<u8>,
    /// Comment line right after the header, usually the binary marker
    pub comment: Option<Vec<u8>>,
    objects: Vec<Object>,
    /// Object number to position; one generation per number
    index: HashMap<u32, usize>,
    pub xref: XrefTable,
    pub trailer: Option<Trailer>,
}

impl Document {
    /// Create an empty document with the given header line
    pub fn new(header: impl Into<Vec<u8>>) -> Self {
        Self {
            header: header.into(),
            ..Self::default()
        }
    }

    /// Objects in file order
    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Append a parsed object, rejecting an object number that is already present
    pub fn insert(&mut self, object: Object) -> SlimResult<()> {
        if self.index.contains_key(&object.id.number) {
            return Err(PdfSlimError::DuplicateObject {
                number: object.id.number,
                generation: object.id.generation,
            });
        }
        self.index.insert(object.id.number, self.objects.len());
        self.objects.push(object);
        Ok(())
    }

    /// Append a new object under the next free object number
    pub fn add_object(&mut self, body: ObjectBody) -> ObjectId {
        let id = ObjectId::new(self.max_object_number() + 1, 0);
        self.index.insert(id.number, self.objects.len());
        self.objects.push(Object::new(id, body));
        id
    }

    /// Position of `id` in the object list
    pub fn position(&self, id: ObjectId) -> Option<usize> {
        self.index
            .get(&id.number)
            .copied()
            .filter(|&i| self.objects[i].id == id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.position(id).map(|i| &self.objects[i])
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.position(id).map(move |i| &mut self.objects[i])
    }

    /// Look up the target of an indirect reference
    pub fn resolve(&self, id: ObjectId) -> SlimResult<&Object> {
        self.get(id)
            .ok_or_else(|| PdfSlimError::unresolved(id.number, id.generation))
    }

    /// Follow `value` if it is a reference to a scalar object
    pub fn resolve_value<'v>(&'v self, value: &'v Value) -> SlimResult<&'v Value> {
        match value {
            Value::Reference(id) => match &self.resolve(*id)?.body {
                ObjectBody::Scalar(inner) => Ok(inner),
                _ => Ok(value),
            },
            other => Ok(other),
        }
    }

    /// Declared `/Length` of a stream dictionary, following one indirection
    pub fn resolve_length(&self, dict: &Dictionary) -> SlimResult<usize> {
        let length = match dict.get("Length") {
            Some(Value::Integer(n)) => *n,
            Some(Value::Reference(id)) => self.resolve(*id)?.as_integer().ok_or_else(|| {
                PdfSlimError::InvalidLength(format!("object {} is not an integer", id))
            })?,
            Some(other) => {
                return Err(PdfSlimError::InvalidLength(format!(
                    "unsupported value {:?}",
                    other
                )))
            }
            None => return Err(PdfSlimError::InvalidLength("missing /Length".to_string())),
        };
        usize::try_from(length)
            .map_err(|_| PdfSlimError::InvalidLength(format!("negative length {}", length)))
    }

    /// Image XObject streams in file order
    pub fn image_streams(&self) -> impl Iterator<Item = &Object> {
        self.objects.iter().filter(|o| o.is_image_stream())
    }

    pub fn max_object_number(&self) -> u32 {
        self.objects.iter().map(|o| o.id.number).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::Stream;

    fn length_dict(value: Value) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.push("Length", value);
        dict
    }

    #[test]
    fn test_lookup_by_key() {
        let mut doc = Document::new("%PDF-1.4");
        doc.insert(Object::new(ObjectId::new(3, 0), ObjectBody::Integer(5)))
            .unwrap();
        doc.insert(Object::new(ObjectId::new(1, 0), ObjectBody::Scalar(Value::Null)))
            .unwrap();

        assert_eq!(doc.position(ObjectId::new(1, 0)), Some(1));
        assert_eq!(doc.get(ObjectId::new(3, 0)).and_then(Object::as_integer), Some(5));
        assert!(doc.get(ObjectId::new(3, 1)).is_none());
        assert_eq!(doc.max_object_number(), 3);
    }

    #[test]
    fn test_duplicate_object_rejected() {
        let mut doc = Document::new("%PDF-1.4");
        let obj = Object::new(ObjectId::new(1, 0), ObjectBody::Integer(1));
        doc.insert(obj.clone()).unwrap();
        assert!(matches!(
            doc.insert(obj),
            Err(PdfSlimError::DuplicateObject { number: 1, generation: 0 })
        ));
    }

    #[test]
    fn test_second_generation_of_same_number_rejected() {
        let mut doc = Document::new("%PDF-1.4");
        doc.insert(Object::new(ObjectId::new(1, 0), ObjectBody::Integer(1)))
            .unwrap();
        assert!(matches!(
            doc.insert(Object::new(ObjectId::new(1, 1), ObjectBody::Integer(2))),
            Err(PdfSlimError::DuplicateObject { number: 1, generation: 1 })
        ));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_add_object_uses_next_number() {
        let mut doc = Document::new("%PDF-1.4");
        doc.insert(Object::new(ObjectId::new(7, 0), ObjectBody::Integer(1)))
            .unwrap();
        let id = doc.add_object(ObjectBody::Integer(2));
        assert_eq!(id, ObjectId::new(8, 0));
        assert_eq!(doc.objects().last().map(|o| o.id), Some(id));
    }

    #[test]
    fn test_resolve_direct_and_indirect_length() {
        let mut doc = Document::new("%PDF-1.4");
        doc.insert(Object::new(ObjectId::new(9, 0), ObjectBody::Integer(321)))
            .unwrap();

        assert_eq!(doc.resolve_length(&length_dict(Value::Integer(12))).unwrap(), 12);
        assert_eq!(
            doc.resolve_length(&length_dict(Value::Reference(ObjectId::new(9, 0))))
                .unwrap(),
            321
        );
    }

    #[test]
    fn test_resolve_length_errors() {
        let mut doc = Document::new("%PDF-1.4");
        doc.insert(Object::new(
            ObjectId::new(2, 0),
            ObjectBody::Scalar(Value::Name("X".into())),
        ))
        .unwrap();

        assert!(matches!(
            doc.resolve_length(&length_dict(Value::Reference(ObjectId::new(5, 0)))),
            Err(PdfSlimError::UnresolvedReference { number: 5, generation: 0 })
        ));
        assert!(matches!(
            doc.resolve_length(&length_dict(Value::Reference(ObjectId::new(2, 0)))),
            Err(PdfSlimError::InvalidLength(_))
        ));
        assert!(matches!(
            doc.resolve_length(&length_dict(Value::Integer(-4))),
            Err(PdfSlimError::InvalidLength(_))
        ));
        assert!(matches!(
            doc.resolve_length(&Dictionary::new()),
            Err(PdfSlimError::InvalidLength(_))
        ));
    }

    #[test]
    fn test_image_streams_iterator() {
        let mut doc = Document::new("%PDF-1.4");
        let mut image = Dictionary::new();
        image.push("Subtype", Value::Name("Image".into()));
        doc.insert(Object::new(
            ObjectId::new(1, 0),
            ObjectBody::Stream(Stream::new(image, vec![0; 4])),
        ))
        .unwrap();
        doc.insert(Object::new(
            ObjectId::new(2, 0),
            ObjectBody::Stream(Stream::new(Dictionary::new(), vec![0; 4])),
        ))
        .unwrap();

        let ids: Vec<ObjectId> = doc.image_streams().map(|o| o.id).collect();
        assert_eq!(ids, vec![ObjectId::new(1, 0)]);
    }

    #[test]
    fn test_trailer_writing() {
        let mut dict = Dictionary::new();
        dict.push("Size", Value::Integer(3));
        let trailer = Trailer::new(dict, 321);
        let mut out = Vec::new();
        trailer.write_to(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "trailer\n<<\n/Size 3\n>>\nstartxref\n321\n%%EOF\n"
        );
    }
}
