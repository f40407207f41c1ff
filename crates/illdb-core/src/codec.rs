//! Payload codec: zlib container and embedded size correction.
//!
//! Stored documents are either plain JSON text or a zlib stream of it,
//! depending on the row's `meta.compression` flag. On write, the document's
//! `_meta.size` is rewritten so that it agrees with the length of the compact
//! serialisation under the legacy convention used by the existing writers:
//!
//! ```text
//! _meta.size = 0
//! n = len(compact_json) - 1
//! n = n + digits(n)
//! _meta.size = n
//! ```
//!
//! Compact JSON means `,`/`:` separators, preserved key order, and every
//! non-ASCII character escaped as `\uXXXX`.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};

/// Compress a payload into a zlib stream (default level, like `zlib.compress`).
pub fn compress(payload: &[u8]) -> CoreResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(payload)
        .map_err(|e| CoreError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CoreError::Compression(e.to_string()))
}

/// Inflate a zlib stream.
pub fn decompress(stored: &[u8]) -> CoreResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(stored);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CoreError::Decompression(e.to_string()))?;
    Ok(out)
}

/// Render a float the way the legacy writers do: shortest round-trip digits,
/// positional between 1e-4 and 1e16, otherwise `d.ddde±XX`.
fn legacy_float_repr(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        return text.to_string();
    }

    let sign = if value.is_sign_negative() { "-" } else { "" };
    let scientific = format!("{:e}", value.abs());
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    if !(-4..16).contains(&exponent) {
        let exponent_sign = if exponent < 0 { '-' } else { '+' };
        return format!("{sign}{mantissa}e{exponent_sign}{:02}", exponent.abs());
    }
    if exponent < 0 {
        let zeros = "0".repeat((-exponent - 1) as usize);
        return format!("{sign}0.{zeros}{digits}");
    }
    let point = exponent as usize + 1;
    if digits.len() <= point {
        let zeros = "0".repeat(point - digits.len());
        format!("{sign}{digits}{zeros}.0")
    } else {
        format!("{sign}{}.{}", &digits[..point], &digits[point..])
    }
}

/// Formatter that writes ASCII only, escaping everything else as `\uXXXX`.
///
/// Numbers arrive as their source text. Integers are kept digit for digit;
/// anything with a fraction or exponent is re-rendered as a float.
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_number_str<W>(&mut self, writer: &mut W, value: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if value.contains(['.', 'e', 'E']) {
            let float: f64 = value
                .parse()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            writer.write_all(legacy_float_repr(float).as_bytes())
        } else if value == "-0" {
            writer.write_all(b"0")
        } else {
            writer.write_all(value.as_bytes())
        }
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        for ch in fragment.chars() {
            if ch.is_ascii() && ch != '\x7f' {
                writer.write_all(&[ch as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

/// Serialise a JSON value in the compact, ASCII-escaped form.
pub fn to_compact_json(value: &Value) -> CoreResult<String> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, AsciiFormatter);
    value
        .serialize(&mut ser)
        .map_err(|e| CoreError::InvalidPayload(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| CoreError::InvalidPayload(e.to_string()))
}

/// Number of decimal digits in `n`.
pub fn digit_count(n: u64) -> u64 {
    n.checked_ilog10().map_or(1, |log| u64::from(log) + 1)
}

/// A document ready to be stored, with its self-consistent size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizedPayload {
    pub json: String,
    pub size: u64,
}

fn meta_object(doc: &mut Value) -> CoreResult<&mut Map<String, Value>> {
    let object = doc.as_object_mut().ok_or_else(|| {
        CoreError::InvalidPayload("top-level value is not an object".to_string())
    })?;
    object
        .get_mut("_meta")
        .and_then(Value::as_object_mut)
        .ok_or(CoreError::MissingMetaField)
}

/// Parse a new document and rewrite its `_meta.size`.
pub fn correct_size(payload: &str) -> CoreResult<SizedPayload> {
    let mut doc: Value =
        serde_json::from_str(payload).map_err(|e| CoreError::InvalidPayload(e.to_string()))?;

    meta_object(&mut doc)?.insert("size".to_string(), Value::from(0u64));
    let measured = to_compact_json(&doc)?.len() as u64 - 1;
    let size = measured + digit_count(measured);

    meta_object(&mut doc)?.insert("size".to_string(), Value::from(size));
    let json = to_compact_json(&doc)?;
    Ok(SizedPayload { json, size })
}
