//! Turning image XObject streams into files a browser can show.
//!
//! Leading `FlateDecode` filters are undone first. What remains is either a
//! self-contained codec (DCT → `.jpg`, JPX → `.jp2`), written as is, or a
//! raw sample buffer that gets re-encoded as PNG from the stream's
//! `Width`, `Height`, `ColorSpace` and `BitsPerComponent`.

use std::io::Read;

use flate2::read::ZlibDecoder;
use lopdf::{Dictionary, Document, Object, Stream};

use crate::error::{Error, Result};

/// Refuse absurd dimensions before allocating sample buffers.
const MAX_IMAGE_PIXELS: u64 = 64 * 1024 * 1024;

/// Encoded image ready to be written, with its file extension.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub data: Vec<u8>,
    pub extension: &'static str,
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn unsupported(what: impl Into<String>) -> Error {
    Error::PdfError(what.into())
}

fn int_entry(dict: &Dictionary, doc: &Document, key: &[u8]) -> Option<i64> {
    dict.get(key)
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_i64().ok())
}

/// Filter names in decoding order. Abbreviated inline-image names are
/// normalized to their full form.
fn filter_chain(dict: &Dictionary, doc: &Document) -> Result<Vec<Vec<u8>>> {
    let Some(filter) = dict.get(b"Filter").ok().and_then(|f| resolve(doc, f)) else {
        return Ok(Vec::new());
    };
    let names: Vec<&Object> = match filter {
        Object::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    names
        .into_iter()
        .map(|name| match resolve(doc, name) {
            Some(Object::Name(name)) => Ok(match name.as_slice() {
                b"Fl" => b"FlateDecode".to_vec(),
                b"DCT" => b"DCTDecode".to_vec(),
                other => other.to_vec(),
            }),
            _ => Err(unsupported("malformed Filter entry")),
        })
        .collect()
}

/// `DecodeParms` for the filter at `position`; may be a single dictionary or
/// an array parallel to the filter chain.
fn decode_parms<'a>(dict: &'a Dictionary, doc: &'a Document, position: usize) -> Option<&'a Dictionary> {
    let parms = dict.get(b"DecodeParms").ok().and_then(|p| resolve(doc, p))?;
    match parms {
        Object::Dictionary(d) => (position == 0).then_some(d),
        Object::Array(items) => items
            .get(position)
            .and_then(|p| resolve(doc, p))
            .and_then(|p| p.as_dict().ok()),
        _ => None,
    }
}

fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 2);
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| unsupported(format!("FlateDecode failed: {}", e)))?;
    Ok(out)
}

/// Undo PNG row predictors (`Predictor` 10..=15).
fn unpredict(data: &[u8], parms: &Dictionary, doc: &Document) -> Result<Vec<u8>> {
    let predictor = int_entry(parms, doc, b"Predictor").unwrap_or(1);
    if predictor == 1 {
        return Ok(data.to_vec());
    }
    if predictor < 10 {
        return Err(unsupported(format!("predictor {}", predictor)));
    }

    let colors = int_entry(parms, doc, b"Colors").unwrap_or(1).max(1) as usize;
    let bpc = int_entry(parms, doc, b"BitsPerComponent").unwrap_or(8).max(1) as usize;
    let columns = int_entry(parms, doc, b"Columns").unwrap_or(1).max(1) as usize;
    let bpp = (colors * bpc).div_ceil(8).max(1);
    let row_len = (columns * colors * bpc).div_ceil(8);

    let mut out = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row_len];
    for row in data.chunks(row_len + 1) {
        if row.len() < row_len + 1 {
            break;
        }
        let (kind, raw) = (row[0], &row[1..]);
        let mut cur = raw.to_vec();
        for i in 0..row_len {
            let left = if i >= bpp { cur[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            let predicted = match kind {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => return Err(unsupported(format!("PNG row filter {}", other))),
            };
            cur[i] = cur[i].wrapping_add(predicted);
        }
        out.extend_from_slice(&cur);
        prev = cur;
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let (pa, pb, pc) = ((p - a as i16).abs(), (p - b as i16).abs(), (p - c as i16).abs());
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Samples layout derived from the image's color space.
#[derive(Debug, Clone, PartialEq)]
enum Layout {
    Gray,
    Rgb,
    Cmyk,
    /// Palette indices into RGB triplets
    Indexed(Vec<u8>),
}

impl Layout {
    fn components(&self) -> usize {
        match self {
            Layout::Gray | Layout::Indexed(_) => 1,
            Layout::Rgb => 3,
            Layout::Cmyk => 4,
        }
    }
}

fn layout_from_components(n: i64) -> Result<Layout> {
    match n {
        1 => Ok(Layout::Gray),
        3 => Ok(Layout::Rgb),
        4 => Ok(Layout::Cmyk),
        other => Err(unsupported(format!("{} color components", other))),
    }
}

fn color_layout(doc: &Document, object: &Object) -> Result<Layout> {
    let object = resolve(doc, object).ok_or_else(|| unsupported("dangling ColorSpace"))?;
    match object {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"G" | b"CalGray" => Ok(Layout::Gray),
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Ok(Layout::Rgb),
            b"DeviceCMYK" | b"CMYK" => Ok(Layout::Cmyk),
            other => Err(unsupported(format!(
                "color space {}",
                String::from_utf8_lossy(other)
            ))),
        },
        Object::Array(items) => {
            let family = items.first().and_then(|f| f.as_name().ok()).unwrap_or_default();
            match family {
                b"ICCBased" => {
                    let n = items
                        .get(1)
                        .and_then(|s| resolve(doc, s))
                        .and_then(|s| s.as_stream().ok())
                        .and_then(|s| int_entry(&s.dict, doc, b"N"))
                        .unwrap_or(3);
                    layout_from_components(n)
                }
                b"CalGray" => Ok(Layout::Gray),
                b"CalRGB" => Ok(Layout::Rgb),
                b"Indexed" | b"I" => indexed_layout(doc, items),
                other => Err(unsupported(format!(
                    "color space {}",
                    String::from_utf8_lossy(other)
                ))),
            }
        }
        _ => Err(unsupported("malformed ColorSpace")),
    }
}

/// `[/Indexed base hival lookup]` with an RGB or gray base becomes a PNG palette.
fn indexed_layout(doc: &Document, items: &[Object]) -> Result<Layout> {
    let [_, base, hival, lookup] = items else {
        return Err(unsupported("malformed Indexed color space"));
    };
    let base = color_layout(doc, base)?;
    let entries = resolve(doc, hival)
        .and_then(|h| h.as_i64().ok())
        .ok_or_else(|| unsupported("Indexed color space without hival"))?
        .clamp(0, 255) as usize
        + 1;
    let table = match resolve(doc, lookup) {
        Some(Object::String(bytes, _)) => bytes.clone(),
        Some(Object::Stream(stream)) => decode_stream_bytes(doc, stream)?,
        _ => return Err(unsupported("Indexed lookup table")),
    };

    let palette = match base {
        Layout::Rgb => table.get(..entries * 3).map(<[u8]>::to_vec),
        Layout::Gray => table
            .get(..entries)
            .map(|g| g.iter().flat_map(|&v| [v, v, v]).collect()),
        _ => None,
    };
    palette
        .map(Layout::Indexed)
        .ok_or_else(|| unsupported("Indexed lookup table too short or unsupported base"))
}

/// Apply every filter in a non-image stream (palette lookups).
fn decode_stream_bytes(doc: &Document, stream: &Stream) -> Result<Vec<u8>> {
    let mut data = stream.content.clone();
    for (position, filter) in filter_chain(&stream.dict, doc)?.iter().enumerate() {
        if filter.as_slice() != b"FlateDecode" {
            return Err(unsupported(format!(
                "filter {}",
                String::from_utf8_lossy(filter)
            )));
        }
        data = inflate(&data)?;
        if let Some(parms) = decode_parms(&stream.dict, doc, position) {
            data = unpredict(&data, parms, doc)?;
        }
    }
    Ok(data)
}

fn cmyk_to_rgb(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - px[3] as u16;
            px[..3].iter().map(move |&c| ((255 - c as u16) * k / 255) as u8).collect::<Vec<_>>()
        })
        .collect()
}

/// Re-encode raw samples as PNG.
fn encode_png(dict: &Dictionary, doc: &Document, samples: Vec<u8>) -> Result<Vec<u8>> {
    if matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true))) {
        return Err(unsupported("stencil mask"));
    }
    let width = int_entry(dict, doc, b"Width").unwrap_or(0);
    let height = int_entry(dict, doc, b"Height").unwrap_or(0);
    if width <= 0 || height <= 0 || (width as u64) * (height as u64) > MAX_IMAGE_PIXELS {
        return Err(unsupported(format!("image size {}x{}", width, height)));
    }
    let (width, height) = (width as u32, height as u32);

    let layout = match dict.get(b"ColorSpace") {
        Ok(cs) => color_layout(doc, cs)?,
        Err(_) => return Err(unsupported("image without ColorSpace")),
    };
    let bpc = int_entry(dict, doc, b"BitsPerComponent").unwrap_or(8);
    let depth = match bpc {
        1 => png::BitDepth::One,
        2 => png::BitDepth::Two,
        4 => png::BitDepth::Four,
        8 => png::BitDepth::Eight,
        16 => png::BitDepth::Sixteen,
        other => return Err(unsupported(format!("{} bits per component", other))),
    };

    let row_len = (width as usize * layout.components() * bpc as usize).div_ceil(8);
    let expected = row_len * height as usize;
    if samples.len() < expected {
        return Err(unsupported(format!(
            "image data too short: {} of {} bytes",
            samples.len(),
            expected
        )));
    }
    let mut samples = samples;
    samples.truncate(expected);

    let (color, samples, depth) = match &layout {
        Layout::Gray => (png::ColorType::Grayscale, samples, depth),
        Layout::Rgb => (png::ColorType::Rgb, samples, depth),
        Layout::Cmyk if depth == png::BitDepth::Eight => {
            (png::ColorType::Rgb, cmyk_to_rgb(&samples), depth)
        }
        Layout::Cmyk => return Err(unsupported("CMYK image with 16-bit samples")),
        Layout::Indexed(_) if depth == png::BitDepth::Sixteen => {
            return Err(unsupported("16-bit palette indices"))
        }
        Layout::Indexed(_) => (png::ColorType::Indexed, samples, depth),
    };

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(color);
        encoder.set_depth(depth);
        if let Layout::Indexed(palette) = &layout {
            encoder.set_palette(palette.clone());
        }
        let mut writer = encoder
            .write_header()
            .map_err(|e| unsupported(format!("PNG header: {}", e)))?;
        writer
            .write_image_data(&samples)
            .map_err(|e| unsupported(format!("PNG data: {}", e)))?;
        writer
            .finish()
            .map_err(|e| unsupported(format!("PNG finish: {}", e)))?;
    }
    Ok(out)
}

/// Decode one image XObject into a writable file.
pub fn decode_image(doc: &Document, stream: &Stream) -> Result<DecodedImage> {
    let filters = filter_chain(&stream.dict, doc)?;
    let mut data = stream.content.clone();

    for (position, filter) in filters.iter().enumerate() {
        let last = position + 1 == filters.len();
        match filter.as_slice() {
            b"FlateDecode" => {
                data = inflate(&data)?;
                if let Some(parms) = decode_parms(&stream.dict, doc, position) {
                    data = unpredict(&data, parms, doc)?;
                }
            }
            b"DCTDecode" if last => {
                return Ok(DecodedImage {
                    data,
                    extension: "jpg",
                })
            }
            b"JPXDecode" if last => {
                return Ok(DecodedImage {
                    data,
                    extension: "jp2",
                })
            }
            other => {
                return Err(unsupported(format!(
                    "filter {}",
                    String::from_utf8_lossy(other)
                )))
            }
        }
    }

    Ok(DecodedImage {
        data: encode_png(&stream.dict, doc, data)?,
        extension: "png",
    })
}
