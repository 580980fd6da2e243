//! PDF dictionary and value implementation

use std::io::{self, Write};

use super::ObjectId;

/// Direct value held by a dictionary entry or array slot
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Name without its leading slash
    Name(String),
    Integer(i64),
    Real(f64),
    /// Raw bytes between the outer parentheses, escapes untouched
    LiteralString(Vec<u8>),
    /// Hex digits between the angle brackets
    HexString(String),
    Dictionary(Dictionary),
    Array(Vec<Value>),
    /// Indirect reference; a lookup key, never an owning link
    Reference(ObjectId),
    Boolean(bool),
    Null,
}

impl Value {
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Value::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Value::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Write value to output
    pub fn write_to<W: Write>(&self, output: &mut W) -> io::Result<()> {
        match self {
            Value::Name(n) => write!(output, "/{}", n),
            Value::Integer(n) => write!(output, "{}", n),
            Value::Real(n) => write!(output, "{}", n),
            Value::LiteralString(s) => {
                output.write_all(b"(")?;
                output.write_all(s)?;
                output.write_all(b")")
            }
            Value::HexString(s) => write!(output, "<{}>", s),
            Value::Dictionary(dict) => dict.write_to(output),
            Value::Array(items) => write_array(output, items),
            Value::Reference(id) => write!(output, "{} {} R", id.number, id.generation),
            Value::Boolean(b) => write!(output, "{}", b),
            Value::Null => output.write_all(b"null"),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Reference(id)
    }
}

/// Write array as space separated tokens
pub fn write_array<W: Write>(output: &mut W, items: &[Value]) -> io::Result<()> {
    if items.is_empty() {
        return output.write_all(b"[ ]");
    }
    output.write_all(b"[ ")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            output.write_all(b" ")?;
        }
        item.write_to(output)?;
    }
    output.write_all(b" ]")
}

/// Single dictionary entry
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    /// Key without its leading slash
    pub key: String,
    pub value: Value,
}

/// PDF dictionary; an ordered list of pairs, not a map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    pairs: Vec<Pair>,
}

impl Dictionary {
    /// Create new dictionary
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    /// Append an entry, keeping any existing entry with the same key
    pub fn push(&mut self, key: impl Into<String>, value: Value) {
        self.pairs.push(Pair {
            key: key.into(),
            value,
        });
    }

    /// Get value by key (first match)
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.pairs.iter().find(|p| p.key == key).map(|p| &p.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.pairs
            .iter_mut()
            .find(|p| p.key == key)
            .map(|p| &mut p.value)
    }

    /// Get integer value
    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_integer)
    }

    /// Get name value
    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_name)
    }

    /// Get reference value
    pub fn get_reference(&self, key: &str) -> Option<ObjectId> {
        self.get(key).and_then(Value::as_reference)
    }

    pub fn get_boolean(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_boolean)
    }

    /// Replace the first entry for `key` in place, or append it
    pub fn set(&mut self, key: &str, value: Value) {
        match self.get_mut(key) {
            Some(slot) => *slot = value,
            None => self.push(key, value),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Write dictionary to output
    pub fn write_to<W: Write>(&self, output: &mut W) -> io::Result<()> {
        output.write_all(b"<<\n")?;

        for pair in &self.pairs {
            write!(output, "/{}", pair.key)?;
            match &pair.value {
                Value::Dictionary(nested) => {
                    output.write_all(b"\n")?;
                    nested.write_to(output)?;
                }
                value => {
                    output.write_all(b" ")?;
                    value.write_to(output)?;
                    output.write_all(b"\n")?;
                }
            }
        }

        output.write_all(b">>\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(dict: &Dictionary) -> String {
        let mut out = Vec::new();
        dict.write_to(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_dictionary_keeps_order_and_duplicates() {
        let mut dict = Dictionary::new();
        dict.push("Type", Value::Name("XObject".into()));
        dict.push("Width", Value::Integer(10));
        dict.push("Type", Value::Name("Other".into()));

        let keys: Vec<&str> = dict.pairs().iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["Type", "Width", "Type"]);
        assert_eq!(dict.get_name("Type"), Some("XObject"));
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut dict = Dictionary::new();
        dict.push("Length", Value::Integer(100));
        dict.push("Filter", Value::Name("DCTDecode".into()));
        dict.set("Length", Value::Integer(42));
        dict.set("Height", Value::Integer(7));

        assert_eq!(dict.pairs()[0].key, "Length");
        assert_eq!(dict.get_integer("Length"), Some(42));
        assert_eq!(dict.pairs()[2].key, "Height");
    }

    #[test]
    fn test_dictionary_writing() {
        let mut nested = Dictionary::new();
        nested.push("K", Value::Integer(-1));

        let mut dict = Dictionary::new();
        dict.push("Type", Value::Name("Page".into()));
        dict.push("Parent", Value::Reference(ObjectId::new(2, 0)));
        dict.push(
            "MediaBox",
            Value::Array(vec![
                Value::Integer(0),
                Value::Integer(0),
                Value::Real(612.5),
                Value::Integer(792),
            ]),
        );
        dict.push("Title", Value::LiteralString(b"Hi (there)".to_vec()));
        dict.push("ID", Value::HexString("0aff".into()));
        dict.push("DecodeParms", Value::Dictionary(nested));

        assert_eq!(
            render(&dict),
            "<<\n/Type /Page\n/Parent 2 0 R\n/MediaBox [ 0 0 612.5 792 ]\n\
             /Title (Hi (there))\n/ID <0aff>\n/DecodeParms\n<<\n/K -1\n>>\n>>\n"
        );
    }

    #[test]
    fn test_empty_array_writing() {
        let mut out = Vec::new();
        write_array(&mut out, &[]).unwrap();
        assert_eq!(out, b"[ ]");
    }
}
