//! Image stream recompression and export

mod codec;
mod tiff;

pub use codec::JpegRecompressor;
pub use tiff::{is_tiff_container, wrap_fax};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, trace, warn};

use crate::error::{PdfSlimError, SlimResult};
use crate::pdf::{Dictionary, Document, FaxParams, Filter, ObjectBody, ObjectId, Value};

/// JPEG quality used when none is configured
pub const DEFAULT_QUALITY: u8 = 5;

/// Collaborator that re-encodes image data
///
/// Implementations return the input unchanged when it cannot be decoded and
/// never return something larger than the input.
pub trait ImageCodec: Send + Sync {
    /// Re-encode a raster image body (usually a JPEG)
    fn recompress_raster(&self, data: &[u8]) -> SlimResult<Vec<u8>>;

    /// Re-encode a TIFF container produced by [`wrap_fax`]
    fn recompress_tiff(&self, data: &[u8]) -> SlimResult<Vec<u8>>;
}

/// Options for the compression pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressOptions {
    /// JPEG quality, 1..=100
    pub quality: u8,
    /// Route CCITT fax images through the TIFF path
    ///
    /// The stream keeps its `/CCITTFaxDecode` filter and `/DecodeParms`, so a
    /// codec result is only stored when it is raw CCITT data. A result that
    /// is still a TIFF container leaves the original body in place.
    pub fax_images: bool,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            fax_images: false,
        }
    }
}

impl CompressOptions {
    pub fn validate(&self) -> SlimResult<()> {
        if !(1..=100).contains(&self.quality) {
            return Err(PdfSlimError::InvalidOption {
                name: "quality",
                message: format!("{} is outside 1..=100", self.quality),
            });
        }
        Ok(())
    }
}

/// Outcome of a compression pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressionReport {
    pub images_seen: usize,
    pub images_replaced: usize,
    pub bytes_saved: u64,
}

/// Where the new body length has to be written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LengthSlot {
    Direct,
    Indirect(ObjectId),
}

#[derive(Debug, Clone, PartialEq)]
enum Route {
    Raster,
    Fax(FaxParams),
    Skip(&'static str),
}

#[derive(Debug)]
struct ImagePlan {
    id: ObjectId,
    route: Route,
    length: LengthSlot,
}

/// Re-encode every image stream in place, keeping a new body only when it
/// is strictly smaller than the old one
///
/// All `/Filter` and `/Length` lookups happen before the first body is
/// replaced, so a dangling reference leaves the document untouched.
pub fn compress_image_streams(
    document: &mut Document,
    codec: &dyn ImageCodec,
    options: &CompressOptions,
) -> SlimResult<CompressionReport> {
    options.validate()?;
    let plans = plan_images(document, options)?;
    let mut report = CompressionReport {
        images_seen: plans.len(),
        ..CompressionReport::default()
    };

    for plan in plans {
        let Some(original) = document.get(plan.id).and_then(|o| o.stream()) else {
            continue;
        };
        let old_len = original.len();

        let result = match &plan.route {
            Route::Skip(reason) => {
                debug!("Skipping image {}: {}", plan.id, reason);
                continue;
            }
            Route::Raster => codec.recompress_raster(original.data()),
            Route::Fax(params) => {
                wrap_fax(params, original.data()).and_then(|tiff| codec.recompress_tiff(&tiff))
            }
        };

        let data = match result {
            Ok(data) => data,
            Err(e) => {
                warn!("Could not recompress image {}: {}", plan.id, e);
                continue;
            }
        };

        if matches!(plan.route, Route::Fax(_)) && is_tiff_container(&data) {
            debug!("Image {} came back as a TIFF container, keeping CCITT body", plan.id);
            continue;
        }

        if data.len() >= old_len {
            trace!("Image {} not reduced ({} -> {} bytes)", plan.id, old_len, data.len());
            continue;
        }

        let new_len = data.len();
        replace_body(document, &plan, data);
        report.images_replaced += 1;
        report.bytes_saved += (old_len - new_len) as u64;
        debug!("Image {} reduced from {} to {} bytes", plan.id, old_len, new_len);
    }

    info!(
        "Recompressed {} of {} image streams, saved {} bytes",
        report.images_replaced, report.images_seen, report.bytes_saved
    );
    Ok(report)
}

fn replace_body(document: &mut Document, plan: &ImagePlan, data: Vec<u8>) {
    let length = data.len() as i64;

    if let Some(stream) = document.get_mut(plan.id).and_then(|o| o.stream_mut()) {
        stream.set_data(data);
        if plan.length == LengthSlot::Direct {
            stream.dict.set("Length", Value::Integer(length));
        }
    }

    if let LengthSlot::Indirect(target) = plan.length {
        if let Some(object) = document.get_mut(target) {
            object.body = ObjectBody::Integer(length);
        }
    }
}

/// Resolve route and length slot of every image up front
fn plan_images(document: &Document, options: &CompressOptions) -> SlimResult<Vec<ImagePlan>> {
    let shared = shared_length_targets(document);
    let mut plans = Vec::new();

    for object in document.image_streams() {
        let Some(dict) = object.dict() else { continue };
        let filters = resolve_filter(document, dict)?;

        // fails on dangling or non-integer length targets
        document.resolve_length(dict)?;
        let length = match dict.get_reference("Length") {
            Some(target) if shared.get(&target).copied().unwrap_or(0) > 1 => {
                debug!(
                    "Length object {} is shared, writing image {} length inline",
                    target, object.id
                );
                LengthSlot::Direct
            }
            Some(target) => LengthSlot::Indirect(target),
            None => LengthSlot::Direct,
        };

        let route = match filters.as_slice() {
            [Filter::CCITTFaxDecode] if options.fax_images => {
                let params = decode_parms(document, dict)?;
                Route::Fax(FaxParams::from_dictionary(params.as_ref(), dict))
            }
            [Filter::CCITTFaxDecode] => Route::Skip("fax images disabled"),
            [_, _, ..] => Route::Skip("filter chain"),
            _ if is_cmyk(document, dict)? => Route::Skip("CMYK color space"),
            _ => Route::Raster,
        };

        trace!("Planned image {}: {:?}", object.id, route);
        plans.push(ImagePlan {
            id: object.id,
            route,
            length,
        });
    }

    Ok(plans)
}

/// How many streams point their `/Length` at each object
fn shared_length_targets(document: &Document) -> HashMap<ObjectId, usize> {
    let mut counts = HashMap::new();
    for object in document.objects() {
        if let Some(target) = object.stream().and_then(|s| s.dict.get_reference("Length")) {
            *counts.entry(target).or_insert(0) += 1;
        }
    }
    counts
}

/// Filter chain named by `/Filter`: a name, an array of names, or a
/// reference to either
pub fn resolve_filter(document: &Document, dict: &Dictionary) -> SlimResult<Vec<Filter>> {
    let Some(value) = dict.get("Filter") else {
        return Ok(Vec::new());
    };
    let value = match value {
        Value::Reference(id) => match &document.resolve(*id)?.body {
            ObjectBody::Scalar(inner) => inner,
            ObjectBody::Array(items) => return Ok(filter_names(items)),
            _ => return Ok(Vec::new()),
        },
        other => other,
    };

    Ok(match value {
        Value::Name(name) => vec![Filter::from_name(name)],
        Value::Array(items) => filter_names(items),
        _ => Vec::new(),
    })
}

fn filter_names(items: &[Value]) -> Vec<Filter> {
    items
        .iter()
        .filter_map(Value::as_name)
        .map(Filter::from_name)
        .collect()
}

/// `/DecodeParms` as a dictionary, an array holding one, or a reference
fn decode_parms(document: &Document, dict: &Dictionary) -> SlimResult<Option<Dictionary>> {
    let value = match dict.get("DecodeParms") {
        Some(Value::Reference(id)) => match &document.resolve(*id)?.body {
            ObjectBody::Dictionary(d) => return Ok(Some(d.clone())),
            ObjectBody::Array(items) => return first_params(document, items),
            _ => return Ok(None),
        },
        Some(value) => value,
        None => return Ok(None),
    };

    match value {
        Value::Dictionary(d) => Ok(Some(d.clone())),
        Value::Array(items) => first_params(document, items),
        _ => Ok(None),
    }
}

fn first_params(document: &Document, items: &[Value]) -> SlimResult<Option<Dictionary>> {
    match items.first() {
        Some(Value::Dictionary(d)) => Ok(Some(d.clone())),
        Some(Value::Reference(id)) => Ok(document.resolve(*id)?.dict().cloned()),
        _ => Ok(None),
    }
}

fn is_cmyk(document: &Document, dict: &Dictionary) -> SlimResult<bool> {
    match dict.get("ColorSpace") {
        Some(value) => Ok(document.resolve_value(value)?.as_name() == Some("DeviceCMYK")),
        None => Ok(false),
    }
}

/// Write DCT image bodies as `<id>-<gen>.jpg` and, when `fax_images` is
/// set, CCITT bodies wrapped as `<id>-<gen>.tif`
pub fn export_images(document: &Document, dir: &Path, fax_images: bool) -> SlimResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    for object in document.image_streams() {
        let (Some(dict), Some(stream)) = (object.dict(), object.stream()) else {
            continue;
        };
        let (extension, bytes) = match resolve_filter(document, dict)?.as_slice() {
            [Filter::DCTDecode] => ("jpg", stream.data().to_vec()),
            [Filter::CCITTFaxDecode] if fax_images => {
                let params = decode_parms(document, dict)?;
                let params = FaxParams::from_dictionary(params.as_ref(), dict);
                ("tif", wrap_fax(&params, stream.data())?)
            }
            filters => {
                trace!("Not exporting image {} with filters {:?}", object.id, filters);
                continue;
            }
        };

        let path = dir.join(format!(
            "{}-{}.{}",
            object.id.number, object.id.generation, extension
        ));
        fs::write(&path, &bytes)?;
        debug!("Exported image {} to {}", object.id, path.display());
        written.push(path);
    }

    info!("Exported {} images to {}", written.len(), dir.display());
    Ok(written)
}
