//! Gzip-framed JSON, the body encoding used in both directions.

use std::io::{Read, Write};

use bytes::Bytes;
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{Error, ErrorKind, Result};

/// Content type sent with every request and response body.
pub const CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// Content type prefixes the dispatcher accepts.
pub const ACCEPTED_CONTENT_TYPES: [&str; 2] = ["application/json", "application/javascript"];

/// Request body for methods without a parameter. Encodes as `{}`.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Empty {}

/// Serializes `value` as JSON into a finished gzip frame.
///
/// # Errors
///
/// Returns `SerializeFailed` if the value cannot be represented as JSON, or
/// `CompressFailed` if the gzip stream cannot be finished.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    serde_json::to_writer(&mut encoder, value)
        .map_err(|e| Error::new(ErrorKind::SerializeFailed, e.to_string()))?;
    let bytes = encoder
        .finish()
        .map_err(|e| Error::new(ErrorKind::CompressFailed, e.to_string()))?;
    Ok(bytes.into())
}

/// Decompresses a gzip frame and deserializes the JSON inside as `T`.
///
/// # Errors
///
/// Returns `DecompressFailed` if `bytes` is not a complete gzip frame and
/// `DeserializeFailed` if the JSON does not map onto `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let json = decompress(bytes)?;
    serde_json::from_slice(&json).map_err(Error::from)
}

/// Converts an argument into a JSON value, as [`Proxy::invoke`](crate::Proxy::invoke)
/// expects.
///
/// # Errors
///
/// Returns `SerializeFailed` if the value cannot be represented as JSON.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| Error::new(ErrorKind::SerializeFailed, e.to_string()))
}

/// # Errors
pub fn compress(bytes: &[u8]) -> Result<Bytes> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| Error::new(ErrorKind::CompressFailed, e.to_string()))?;
    let bytes = encoder
        .finish()
        .map_err(|e| Error::new(ErrorKind::CompressFailed, e.to_string()))?;
    Ok(bytes.into())
}

/// # Errors
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::with_capacity(bytes.len() * 2);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::new(ErrorKind::DecompressFailed, e.to_string()))?;
    Ok(out)
}

/// Whether a `Content-Type` header value names a JSON body.
#[must_use]
pub fn is_json_content_type(content_type: &str) -> bool {
    ACCEPTED_CONTENT_TYPES
        .iter()
        .any(|prefix| content_type.starts_with(prefix))
}
