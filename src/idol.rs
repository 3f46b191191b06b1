//! The idol record and its encoding into the service's external image id.
//!
//! Rekognition persists one free-form string per indexed face, restricted to
//! `[a-zA-Z0-9_.\-:]` and 255 characters. An idol is stored there as
//! `escape(idol_id) ":" escape(bucket) ":" escape(key)`, where `escape` keeps
//! `[A-Za-z0-9.-]` and writes every other UTF-8 byte as `_XX` with uppercase
//! hex. No component can contain a colon, so the encoding splits back
//! unambiguously, and decoding accepts only what encoding produces.

use serde::{Deserialize, Serialize};

use crate::ai::vision::FaceRecord;
use crate::error::{IdolError, Result};

const SEPARATOR: char = ':';
const ESCAPE: u8 = b'_';
const MAX_EXTERNAL_IMAGE_ID_LEN: usize = 255;

/// Where a reference image lives in object storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageLocation {
    pub bucket: String,
    pub key: String,
}

impl ImageLocation {
    /// Builds a location, normalizing the key with [`escape_path`].
    pub fn new(bucket: impl Into<String>, key: &str) -> Self {
        Self {
            bucket: bucket.into(),
            key: escape_path(key),
        }
    }
}

impl std::fmt::Display for ImageLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// One reference face: who it is, which indexed face it is, and its image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Idol {
    pub idol_id: String,
    /// Assigned by the service once the face is indexed.
    pub face_id: Option<String>,
    pub image: ImageLocation,
}

impl Idol {
    /// Builds a not-yet-indexed idol, rejecting ids the service could not store.
    pub fn new(idol_id: &str, image: ImageLocation) -> Result<Self> {
        let invalid = |reason: &str| IdolError::InvalidIdol {
            idol_id: idol_id.to_string(),
            reason: reason.to_string(),
        };
        if idol_id.is_empty() {
            return Err(invalid("idol id is empty"));
        }
        if image.bucket.is_empty() {
            return Err(invalid("bucket is empty"));
        }
        if image.key.is_empty() {
            return Err(invalid("image key is empty"));
        }

        let idol = Self {
            idol_id: idol_id.to_string(),
            face_id: None,
            image,
        };
        let encoded_len = idol.to_external_image_id().len();
        if encoded_len > MAX_EXTERNAL_IMAGE_ID_LEN {
            return Err(invalid(&format!(
                "external image id would be {encoded_len} characters, limit is {MAX_EXTERNAL_IMAGE_ID_LEN}"
            )));
        }
        Ok(idol)
    }

    pub fn to_external_image_id(&self) -> String {
        format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            escape_component(&self.idol_id),
            escape_component(&self.image.bucket),
            escape_component(&self.image.key)
        )
    }

    /// Rebuilds an idol from a face record listed or matched by the service.
    pub fn from_service_record(record: &FaceRecord) -> Result<Self> {
        let external_image_id = record.external_image_id.as_deref().ok_or_else(|| {
            IdolError::MalformedRecord {
                external_image_id: String::new(),
                reason: format!("face {} has no external image id", record.face_id),
            }
        })?;
        let malformed = |reason: String| IdolError::MalformedRecord {
            external_image_id: external_image_id.to_string(),
            reason,
        };

        let parts: Vec<&str> = external_image_id.split(SEPARATOR).collect();
        let [idol_part, bucket_part, key_part] = parts[..] else {
            return Err(malformed(format!(
                "expected 3 {SEPARATOR:?} separated parts, found {}",
                parts.len()
            )));
        };
        let idol_id = unescape_component(idol_part).map_err(malformed)?;
        let bucket = unescape_component(bucket_part).map_err(malformed)?;
        let key = unescape_component(key_part).map_err(malformed)?;
        if idol_id.is_empty() {
            return Err(malformed("empty idol id".to_string()));
        }
        if bucket.is_empty() || key.is_empty() {
            return Err(malformed("empty image location".to_string()));
        }

        Ok(Self {
            idol_id,
            face_id: Some(record.face_id.clone()),
            image: ImageLocation::new(bucket, &key),
        })
    }
}

impl std::fmt::Display for Idol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.face_id {
            Some(face_id) => write!(f, "{} [{}] {}", self.idol_id, face_id, self.image),
            None => write!(f, "{} [unindexed] {}", self.idol_id, self.image),
        }
    }
}

/// Normalizes a storage key: backslashes become `/`, empty and `.` segments
/// are dropped. Applying it twice gives the same key.
pub fn escape_path(key: &str) -> String {
    key.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn is_unescaped(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'.'
}

fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn escape_component(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for byte in value.bytes() {
        if is_unescaped(byte) {
            escaped.push(byte as char);
        } else {
            escaped.push(ESCAPE as char);
            escaped.push_str(&format!("{byte:02X}"));
        }
    }
    escaped
}

fn unescape_component(value: &str) -> std::result::Result<String, String> {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        if byte == ESCAPE {
            let digit = |offset: usize| bytes.get(i + offset).copied().and_then(hex_digit);
            let (Some(high), Some(low)) = (digit(1), digit(2)) else {
                return Err(format!("escape at offset {i} is not two uppercase hex digits"));
            };
            let decoded_byte = (high << 4) | low;
            if is_unescaped(decoded_byte) {
                return Err(format!(
                    "escape at offset {i} encodes {:?}, which is never escaped",
                    decoded_byte as char
                ));
            }
            decoded.push(decoded_byte);
            i += 3;
        } else if is_unescaped(byte) {
            decoded.push(byte);
            i += 1;
        } else {
            return Err(format!("unexpected character {:?} at offset {i}", byte as char));
        }
    }
    String::from_utf8(decoded).map_err(|e| format!("not valid utf-8: {e}"))
}
