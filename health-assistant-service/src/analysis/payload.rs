use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::AnalysisError;
use crate::config::megabytes;

/// A file taken from a multipart form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// A validated image ready to be sent to a vision model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime: String,
    pub bytes: Vec<u8>,
}

fn invalid_format() -> AnalysisError {
    AnalysisError::Invalid("Invalid image data format".to_string())
}

/// The rejection for an image over `limit_mb`, whether caught here or while
/// the request body was still being read.
pub fn size_exceeded(limit_mb: usize) -> AnalysisError {
    AnalysisError::Invalid(format!("File size exceeds {limit_mb}MB limit"))
}

/// MIME type from the image's magic bytes.
fn sniff_mime(bytes: &[u8]) -> Option<String> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type().to_string())
        .filter(|mime| mime.starts_with("image/"))
}

impl ImagePayload {
    /// Decode a `data:image/...;base64,` URL or bare base64.
    ///
    /// The MIME type comes from the data URL prefix, or from the decoded bytes
    /// when there is no prefix.
    pub fn from_base64(encoded: &str) -> Result<Self, AnalysisError> {
        let encoded = encoded.trim();

        let (declared, data) = match encoded.strip_prefix("data:") {
            Some(rest) => {
                let (header, data) = rest.split_once(',').ok_or_else(invalid_format)?;
                let mime = header.split(';').next().unwrap_or_default();
                if !mime.starts_with("image/") {
                    return Err(invalid_format());
                }
                (Some(mime.to_string()), data)
            }
            None => (None, encoded),
        };

        let bytes = STANDARD.decode(data).map_err(|_| invalid_format())?;
        let mime = match declared {
            Some(mime) => mime,
            None => sniff_mime(&bytes).ok_or_else(invalid_format)?,
        };
        Ok(Self { mime, bytes })
    }

    /// Wrap an uploaded file, trusting its declared content type when present.
    pub fn from_upload(file: UploadedFile) -> Result<Self, AnalysisError> {
        let UploadedFile {
            content_type,
            bytes,
            ..
        } = file;
        let mime = match content_type.as_deref().filter(|ct| !ct.is_empty()) {
            Some(ct) if ct.starts_with("image/") => Some(ct.to_string()),
            Some(_) => None,
            None => sniff_mime(&bytes),
        };

        match mime {
            Some(mime) => Ok(Self { mime, bytes }),
            None => Err(AnalysisError::Invalid(
                "Uploaded file is not an image".to_string(),
            )),
        }
    }

    pub fn ensure_within(&self, limit_mb: usize) -> Result<(), AnalysisError> {
        if self.bytes.len() > megabytes(limit_mb) {
            return Err(size_exceeded(limit_mb));
        }
        Ok(())
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}
