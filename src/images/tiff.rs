//! Minimal TIFF container around raw CCITT fax data

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::{PdfSlimError, SlimResult};
use crate::pdf::FaxParams;

const TIFF_MAGIC: u16 = 42;
const FIRST_IFD_OFFSET: u32 = 8;
const IFD_ENTRY_LEN: u32 = 12;

const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;

const TAG_NEW_SUBFILE_TYPE: u16 = 254;
const TAG_IMAGE_WIDTH: u16 = 256;
const TAG_IMAGE_LENGTH: u16 = 257;
const TAG_BITS_PER_SAMPLE: u16 = 258;
const TAG_COMPRESSION: u16 = 259;
const TAG_PHOTOMETRIC: u16 = 262;
const TAG_STRIP_OFFSETS: u16 = 273;
const TAG_SAMPLES_PER_PIXEL: u16 = 277;
const TAG_ROWS_PER_STRIP: u16 = 278;
const TAG_STRIP_BYTE_COUNTS: u16 = 279;
const TAG_T4_OPTIONS: u16 = 292;

const COMPRESSION_CCITT_T4: u32 = 3;
const COMPRESSION_CCITT_T6: u32 = 4;

const PHOTOMETRIC_WHITE_IS_ZERO: u32 = 0;
const PHOTOMETRIC_BLACK_IS_ZERO: u32 = 1;

/// T4Options bit selecting 2-D coding
const T4_2D_CODING: u32 = 1;

struct Tag {
    id: u16,
    kind: u16,
    value: u32,
}

impl Tag {
    fn short(id: u16, value: u32) -> Self {
        Self { id, kind: TYPE_SHORT, value }
    }

    fn long(id: u16, value: u32) -> Self {
        Self { id, kind: TYPE_LONG, value }
    }

    fn write_to<W: Write>(&self, output: &mut W) -> std::io::Result<()> {
        output.write_u16::<LittleEndian>(self.id)?;
        output.write_u16::<LittleEndian>(self.kind)?;
        output.write_u32::<LittleEndian>(1)?;
        // SHORT values are left-justified in the 4-byte slot
        output.write_u32::<LittleEndian>(self.value)
    }
}

/// True when `data` starts with a TIFF header of either byte order
pub fn is_tiff_container(data: &[u8]) -> bool {
    data.starts_with(b"II*\0") || data.starts_with(b"MM\0*")
}

/// Wrap a CCITT body in a single-strip little-endian TIFF
pub fn wrap_fax(params: &FaxParams, data: &[u8]) -> SlimResult<Vec<u8>> {
    let strip_len = u32::try_from(data.len())
        .map_err(|_| PdfSlimError::image("fax body too large for a TIFF strip"))?;

    let compression = if params.is_group4() {
        COMPRESSION_CCITT_T6
    } else {
        COMPRESSION_CCITT_T4
    };
    let photometric = if params.black_is_1 {
        PHOTOMETRIC_BLACK_IS_ZERO
    } else {
        PHOTOMETRIC_WHITE_IS_ZERO
    };

    let mut tags = vec![
        Tag::long(TAG_NEW_SUBFILE_TYPE, 0),
        Tag::long(TAG_IMAGE_WIDTH, params.columns),
        Tag::long(TAG_IMAGE_LENGTH, params.rows),
        Tag::short(TAG_BITS_PER_SAMPLE, 1),
        Tag::short(TAG_COMPRESSION, compression),
        Tag::short(TAG_PHOTOMETRIC, photometric),
        Tag::long(TAG_STRIP_OFFSETS, 0),
        Tag::short(TAG_SAMPLES_PER_PIXEL, 1),
        Tag::long(TAG_ROWS_PER_STRIP, params.rows),
        Tag::long(TAG_STRIP_BYTE_COUNTS, strip_len),
    ];
    if !params.is_group4() {
        let options = if params.k > 0 { T4_2D_CODING } else { 0 };
        tags.push(Tag::long(TAG_T4_OPTIONS, options));
    }

    // header, entry count, entries, next-IFD pointer
    let header_len = FIRST_IFD_OFFSET + 2 + tags.len() as u32 * IFD_ENTRY_LEN + 4;
    for tag in tags.iter_mut().filter(|t| t.id == TAG_STRIP_OFFSETS) {
        tag.value = header_len;
    }

    let mut out = Vec::with_capacity(header_len as usize + data.len());
    out.write_all(b"II")?;
    out.write_u16::<LittleEndian>(TIFF_MAGIC)?;
    out.write_u32::<LittleEndian>(FIRST_IFD_OFFSET)?;
    out.write_u16::<LittleEndian>(tags.len() as u16)?;
    for tag in &tags {
        tag.write_to(&mut out)?;
    }
    out.write_u32::<LittleEndian>(0)?;
    out.write_all(data)?;

    Ok(out)
}
