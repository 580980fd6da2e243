//! Stream filter names and CCITT fax parameters

use std::fmt;

use super::Dictionary;

/// Default fax line width used when `/Columns` is absent
pub const DEFAULT_FAX_COLUMNS: u32 = 1728;

/// PDF stream filters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    ASCII85Decode,
    ASCIIHexDecode,
    CCITTFaxDecode,
    DCTDecode,
    FlateDecode,
    JBIG2Decode,
    JPXDecode,
    LZWDecode,
    RunLengthDecode,
    /// Any filter name this crate does not know about
    Other(String),
}

impl Filter {
    /// Create filter from name (without the leading slash)
    pub fn from_name(name: &str) -> Self {
        match name {
            "ASCII85Decode" | "A85" => Filter::ASCII85Decode,
            "ASCIIHexDecode" | "AHx" => Filter::ASCIIHexDecode,
            "CCITTFaxDecode" | "CCF" => Filter::CCITTFaxDecode,
            "DCTDecode" | "DCT" => Filter::DCTDecode,
            "FlateDecode" | "Fl" => Filter::FlateDecode,
            "JBIG2Decode" => Filter::JBIG2Decode,
            "JPXDecode" => Filter::JPXDecode,
            "LZWDecode" | "LZW" => Filter::LZWDecode,
            "RunLengthDecode" | "RL" => Filter::RunLengthDecode,
            other => Filter::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Filter::ASCII85Decode => "ASCII85Decode",
            Filter::ASCIIHexDecode => "ASCIIHexDecode",
            Filter::CCITTFaxDecode => "CCITTFaxDecode",
            Filter::DCTDecode => "DCTDecode",
            Filter::FlateDecode => "FlateDecode",
            Filter::JBIG2Decode => "JBIG2Decode",
            Filter::JPXDecode => "JPXDecode",
            Filter::LZWDecode => "LZWDecode",
            Filter::RunLengthDecode => "RunLengthDecode",
            Filter::Other(name) => name,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name())
    }
}

/// CCITT fax decoding parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaxParams {
    /// `K < 0` is Group 4, `K == 0` Group 3 1-D, `K > 0` Group 3 2-D
    pub k: i64,
    pub columns: u32,
    pub rows: u32,
    pub black_is_1: bool,
    pub encoded_byte_align: bool,
}

impl Default for FaxParams {
    fn default() -> Self {
        Self {
            k: 0,
            columns: DEFAULT_FAX_COLUMNS,
            rows: 0,
            black_is_1: false,
            encoded_byte_align: false,
        }
    }
}

impl FaxParams {
    /// Read parameters from `/DecodeParms`, falling back to the image
    /// dictionary's `/Width` and `/Height`
    pub fn from_dictionary(params: Option<&Dictionary>, image: &Dictionary) -> Self {
        let mut ctx = FaxParams::default();

        let dimension = |dict: &Dictionary, key: &str| {
            dict.get_integer(key).and_then(|v| u32::try_from(v).ok())
        };

        if let Some(width) = dimension(image, "Width") {
            ctx.columns = width;
        }
        if let Some(height) = dimension(image, "Height") {
            ctx.rows = height;
        }

        if let Some(params) = params {
            ctx.k = params.get_integer("K").unwrap_or(0);
            if let Some(columns) = dimension(params, "Columns") {
                ctx.columns = columns;
            }
            if let Some(rows) = dimension(params, "Rows").filter(|&r| r > 0) {
                ctx.rows = rows;
            }
            ctx.black_is_1 = params.get_boolean("BlackIs1").unwrap_or(false);
            ctx.encoded_byte_align = params.get_boolean("EncodedByteAlign").unwrap_or(false);
        }

        ctx
    }

    pub fn is_group4(&self) -> bool {
        self.k < 0
    }
}
