//! PDF parsing and serialization module

mod dict;
mod document;
mod filter;
mod lexer;
mod object;
mod parser;
mod stream;
mod writer;
mod xref;

pub use dict::{Dictionary, Pair, Value};
pub use document::{Document, Trailer};
pub use filter::{FaxParams, Filter, DEFAULT_FAX_COLUMNS};
pub use lexer::{classify, Lexer, TokenKind};
pub use object::{Object, ObjectBody, ObjectId, IMAGE_SUBTYPE};
pub use parser::{parse_document, Parser};
pub use stream::Stream;
pub use writer::serialize_document;
pub use xref::{XrefEntry, XrefTable, FREE_HEAD_GENERATION};
