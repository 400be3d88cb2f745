// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Byte-exact `multipart/form-data` encoding.
//!
//! The async upstream's parser is strict: every line break must be the
//! two-byte CRLF sequence and the declared Content-Length must match the
//! body exactly, so the payload is assembled by hand instead of going
//! through a streaming multipart writer.

use bytes::Bytes;
use rand::Rng;

const CRLF: &str = "\r\n";

/// One file attachment in a multipart body. Request-scoped: built,
/// serialized, discarded.
#[derive(Debug, Clone)]
pub struct MultipartPart {
    pub name: String,
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// An encoded multipart body plus the boundary it was framed with
#[derive(Debug, Clone)]
pub struct MultipartPayload {
    pub boundary: String,
    pub body: Bytes,
}

impl MultipartPayload {
    /// Encode ordered text fields and file parts into a single buffer.
    ///
    /// Field values are written verbatim; file bytes are appended raw and
    /// never round-tripped through a string.
    pub fn encode(fields: &[(&str, String)], files: &[MultipartPart]) -> Self {
        let boundary = generate_boundary();
        let mut body: Vec<u8> = Vec::new();

        for (key, value) in fields {
            body.extend_from_slice(format!("--{}{}", boundary, CRLF).as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"{}{}",
                    key, CRLF, CRLF
                )
                .as_bytes(),
            );
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(CRLF.as_bytes());
        }

        for file in files {
            body.extend_from_slice(format!("--{}{}", boundary, CRLF).as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"{}",
                    file.name, file.filename, CRLF
                )
                .as_bytes(),
            );
            body.extend_from_slice(
                format!("Content-Type: {}{}{}", file.content_type, CRLF, CRLF).as_bytes(),
            );
            body.extend_from_slice(&file.bytes);
            body.extend_from_slice(CRLF.as_bytes());
        }

        body.extend_from_slice(format!("--{}--{}", boundary, CRLF).as_bytes());

        Self {
            boundary,
            body: Bytes::from(body),
        }
    }

    /// Value for the outgoing Content-Type header
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Exact byte length, used verbatim as Content-Length
    pub fn content_length(&self) -> usize {
        self.body.len()
    }
}

/// Generate a browser-style boundary token from the current millis plus a
/// random suffix. Uniqueness is probabilistic, not guaranteed: a collision
/// with attachment content would corrupt the body, which is accepted for
/// non-adversarial inputs.
pub fn generate_boundary() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen();
    format!("----WebKitFormBoundary{:x}{:08x}", millis, suffix)
}

/// A decoded `data:` URI attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Parse a `data:<mime>;base64,<payload>` URI into mime type and raw bytes.
/// Returns `None` for anything that does not match that shape.
pub fn decode_data_uri(input: &str) -> Option<DataUri> {
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    let rest = input.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    if mime.is_empty() || payload.is_empty() {
        return None;
    }
    let bytes = STANDARD.decode(payload).ok()?;
    Some(DataUri {
        mime: mime.to_string(),
        bytes,
    })
}

/// File extension for a mime type: the subtype, defaulting to `png`
pub fn extension_for_mime(mime: &str) -> &str {
    match mime.split('/').nth(1) {
        Some(ext) if !ext.is_empty() => ext,
        _ => "png",
    }
}

/// Build file parts from inline data-URI attachments.
///
/// Malformed entries are skipped silently, matching the tolerance the
/// inbound API promises for attachment lists.
pub fn attachments_from_data_uris(images: &[String]) -> Vec<MultipartPart> {
    let mut parts = Vec::new();
    for (index, image) in images.iter().enumerate() {
        let Some(decoded) = decode_data_uri(image) else {
            tracing::debug!("skipping malformed data URI at index {}", index);
            continue;
        };
        let ext = extension_for_mime(&decoded.mime).to_string();
        parts.push(MultipartPart {
            name: "image".to_string(),
            filename: format!("image_{}.{}", index, ext),
            content_type: decoded.mime,
            bytes: decoded.bytes,
        });
    }
    parts
}
