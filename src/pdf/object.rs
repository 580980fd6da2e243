//! PDF indirect object types

use std::fmt;
use std::io::{self, Write};

use super::dict::write_array;
use super::{Dictionary, Stream, Value};

/// Marker name carried by `/Subtype` on image XObjects
pub const IMAGE_SUBTYPE: &str = "Image";

/// Object key: object number plus generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    pub number: u32,
    pub generation: u16,
}

impl ObjectId {
    pub fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.generation)
    }
}

/// Payload carried between `obj` and `endobj`
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectBody {
    Dictionary(Dictionary),
    /// Dictionary plus raw byte body
    Stream(Stream),
    Array(Vec<Value>),
    /// Bare integer, typically an indirect stream length
    Integer(i64),
    /// Any other direct value (name, real, string, boolean, null)
    Scalar(Value),
}

/// PDF indirect object
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub id: ObjectId,
    pub body: ObjectBody,
}

impl Object {
    /// Create new PDF object
    pub fn new(id: ObjectId, body: ObjectBody) -> Self {
        Self { id, body }
    }

    /// Dictionary of a plain dictionary object or of a stream
    pub fn dict(&self) -> Option<&Dictionary> {
        match &self.body {
            ObjectBody::Dictionary(d) => Some(d),
            ObjectBody::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn dict_mut(&mut self) -> Option<&mut Dictionary> {
        match &mut self.body {
            ObjectBody::Dictionary(d) => Some(d),
            ObjectBody::Stream(s) => Some(&mut s.dict),
            _ => None,
        }
    }

    pub fn stream(&self) -> Option<&Stream> {
        match &self.body {
            ObjectBody::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn stream_mut(&mut self) -> Option<&mut Stream> {
        match &mut self.body {
            ObjectBody::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match &self.body {
            ObjectBody::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Stream object whose dictionary says `/Subtype /Image`
    pub fn is_image_stream(&self) -> bool {
        self.stream()
            .map(|s| s.dict.get_name("Subtype") == Some(IMAGE_SUBTYPE))
            .unwrap_or(false)
    }

    /// Write `n g obj ... endobj`
    pub fn write_to<W: Write>(&self, output: &mut W) -> io::Result<()> {
        writeln!(output, "{} {} obj", self.id.number, self.id.generation)?;

        match &self.body {
            ObjectBody::Dictionary(d) => d.write_to(output)?,
            ObjectBody::Stream(s) => s.write_to(output)?,
            ObjectBody::Array(items) => {
                write_array(output, items)?;
                output.write_all(b"\n")?;
            }
            ObjectBody::Integer(n) => writeln!(output, "{}", n)?,
            ObjectBody::Scalar(value) => {
                value.write_to(output)?;
                output.write_all(b"\n")?;
            }
        }

        output.write_all(b"endobj\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(obj: &Object) -> String {
        let mut out = Vec::new();
        obj.write_to(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_image_stream_detection() {
        let mut dict = Dictionary::new();
        dict.push("Type", Value::Name("XObject".into()));
        dict.push("Subtype", Value::Name("Image".into()));
        let image = Object::new(
            ObjectId::new(4, 0),
            ObjectBody::Stream(Stream::new(dict.clone(), vec![1, 2, 3])),
        );
        assert!(image.is_image_stream());

        let plain = Object::new(ObjectId::new(5, 0), ObjectBody::Dictionary(dict));
        assert!(!plain.is_image_stream());

        let mut form = Dictionary::new();
        form.push("Subtype", Value::Name("Form".into()));
        let form = Object::new(
            ObjectId::new(6, 0),
            ObjectBody::Stream(Stream::new(form, Vec::new())),
        );
        assert!(!form.is_image_stream());
    }

    #[test]
    fn test_integer_object_writing() {
        let obj = Object::new(ObjectId::new(7, 0), ObjectBody::Integer(1234));
        assert_eq!(render(&obj), "7 0 obj\n1234\nendobj\n");
        assert_eq!(obj.as_integer(), Some(1234));
    }

    #[test]
    fn test_array_and_scalar_writing() {
        let arr = Object::new(
            ObjectId::new(3, 0),
            ObjectBody::Array(vec![
                Value::Reference(ObjectId::new(4, 0)),
                Value::Name("XYZ".into()),
            ]),
        );
        assert_eq!(render(&arr), "3 0 obj\n[ 4 0 R /XYZ ]\nendobj\n");

        let scalar = Object::new(ObjectId::new(9, 1), ObjectBody::Scalar(Value::Null));
        assert_eq!(render(&scalar), "9 1 obj\nnull\nendobj\n");
    }

    #[test]
    fn test_object_id_display_and_order() {
        let a = ObjectId::new(2, 0);
        let b = ObjectId::new(10, 0);
        assert_eq!(a.to_string(), "2 0");
        assert!(a < b);
    }
}
