//! Photo cache entries and embedded image payloads
//!
//! Photos captured in the field are cached locally as raw bytes until the
//! upload succeeds. Queue payloads carry images as data URLs
//! (`data:image/jpeg;base64,...`) or bare base64.

use super::error::PhotoError;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// MIME type assumed when the payload does not declare one
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Locally cached photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    /// Primary key
    pub id: String,
    /// Job the photo belongs to, if known
    pub job_id: Option<String>,
    /// MIME type
    pub content_type: String,
    /// Raw image bytes
    pub data: Vec<u8>,
    /// Capture time (epoch millis)
    pub created_at: i64,
}

impl Photo {
    /// Build a photo from an embedded payload
    pub fn from_data_url(
        id: impl Into<String>,
        job_id: Option<String>,
        payload: &str,
    ) -> Result<Self, PhotoError> {
        let decoded = DecodedImage::parse(payload)?;
        Ok(Self {
            id: id.into(),
            job_id,
            content_type: decoded.content_type,
            data: decoded.bytes,
            created_at: chrono::Utc::now().timestamp_millis(),
        })
    }

    /// Re-encode as a data URL, e.g. for an `UPLOAD_PHOTO` payload
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            BASE64_STANDARD.encode(&self.data)
        )
    }
}

/// Binary image reconstructed from an embedded payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// MIME type
    pub content_type: String,
    /// Raw bytes
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    /// Decode a `data:<mime>;base64,<body>` URL or a bare base64 string
    ///
    /// Line breaks and other ASCII whitespace inside the body are ignored.
    pub fn parse(payload: &str) -> Result<Self, PhotoError> {
        let payload = payload.trim();
        let (content_type, body) = match payload.strip_prefix("data:") {
            Some(rest) => {
                let (meta, body) = rest.split_once(',').ok_or(PhotoError::MissingSeparator)?;
                let Some(mime) = meta.strip_suffix(";base64") else {
                    return Err(PhotoError::UnsupportedEncoding {
                        encoding: meta.to_string(),
                    });
                };
                let mime = if mime.is_empty() { DEFAULT_CONTENT_TYPE } else { mime };
                (mime.to_string(), body)
            }
            None => (DEFAULT_CONTENT_TYPE.to_string(), payload),
        };

        let body: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        if body.is_empty() {
            return Err(PhotoError::Empty);
        }

        let bytes = BASE64_STANDARD.decode(body)?;

        Ok(Self {
            content_type,
            bytes,
        })
    }

    /// File extension matching the MIME type
    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            "image/heic" => "heic",
            _ => "jpg",
        }
    }
}
