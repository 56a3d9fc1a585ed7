//! Conversion of captured media and signatures into uploadable files and stored metadata.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::work_order::{MediaKind, MediaMetadata};
use crate::ports::{PortError, StoredFile, UploadFile};
use crate::wizard::form::{MediaFile, SignatureImage};

pub const DEFAULT_MEDIA_MIME: &str = "image/jpeg";
pub const DEFAULT_SIGNATURE_MIME: &str = "image/png";

/// Decodes `data:[<mime>][;base64],<payload>`. Payloads without the base64 marker are taken
/// as raw bytes.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), PortError> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| PortError::InvalidPayload("signature is not a data URI".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| PortError::InvalidPayload("data URI has no payload separator".to_string()))?;

    let (mime, is_base64) = match header.strip_suffix(";base64") {
        Some(mime) => (mime, true),
        None => (header, false),
    };
    let mime = if mime.trim().is_empty() { DEFAULT_SIGNATURE_MIME } else { mime.trim() };

    let bytes = if is_base64 {
        BASE64
            .decode(payload.trim())
            .map_err(|error| PortError::InvalidPayload(format!("data URI payload: {error}")))?
    } else {
        payload.as_bytes().to_vec()
    };
    if bytes.is_empty() {
        return Err(PortError::InvalidPayload("data URI payload is empty".to_string()));
    }

    Ok((mime.to_string(), bytes))
}

fn extension_for(mime: &str) -> &str {
    match mime {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        _ => "bin",
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).map(str::trim).filter(|value| !value.is_empty())
}

pub fn signature_upload(signature: &SignatureImage, now: DateTime<Utc>) -> Result<UploadFile, PortError> {
    let (mime, bytes, filename) = match signature {
        SignatureImage::DataUri(uri) => {
            let (mime, bytes) = decode_data_uri(uri)?;
            (mime, bytes, None)
        }
        SignatureImage::File { filename, mime, bytes } => (
            non_empty(mime.as_ref()).unwrap_or(DEFAULT_SIGNATURE_MIME).to_string(),
            bytes.clone(),
            non_empty(filename.as_ref()).map(str::to_string),
        ),
    };
    let filename = filename
        .unwrap_or_else(|| format!("signature-{}.{}", now.timestamp_millis(), extension_for(&mime)));
    Ok(UploadFile { filename, mime, bytes })
}

/// Media that was already stored upstream is described without another upload.
pub fn existing_metadata(file: &MediaFile) -> Option<MediaMetadata> {
    let MediaFile::Uploaded { id, mime, filename, url, thumb_url } = file else {
        return None;
    };
    let mime = non_empty(mime.as_ref()).unwrap_or(DEFAULT_MEDIA_MIME).to_string();
    Some(MediaMetadata {
        id: non_empty(id.as_ref()).map(str::to_string).unwrap_or_else(new_media_id),
        kind: MediaKind::from_mime(&mime),
        filename: non_empty(filename.as_ref()).map(str::to_string).unwrap_or_else(|| file_name_from_url(url)),
        thumb_url: non_empty(thumb_url.as_ref()).unwrap_or(url).to_string(),
        public_url: url.clone(),
        mime,
    })
}

pub fn media_upload(file: &MediaFile, position: usize, now: DateTime<Utc>) -> Option<UploadFile> {
    let MediaFile::Local { filename, mime, bytes } = file else {
        return None;
    };
    let mime = non_empty(mime.as_ref()).unwrap_or(DEFAULT_MEDIA_MIME).to_string();
    let filename = non_empty(filename.as_ref()).map(str::to_string).unwrap_or_else(|| {
        format!("media-{}-{position}.{}", now.timestamp_millis(), extension_for(&mime))
    });
    Some(UploadFile { filename, mime, bytes: bytes.clone() })
}

pub fn uploaded_metadata(upload: &UploadFile, stored: &StoredFile) -> MediaMetadata {
    MediaMetadata {
        id: new_media_id(),
        kind: MediaKind::from_mime(&upload.mime),
        mime: upload.mime.clone(),
        filename: upload.filename.clone(),
        public_url: stored.url.clone(),
        thumb_url: stored.url.clone(),
    }
}

fn new_media_id() -> String {
    format!("ph-{}", Uuid::new_v4())
}

fn file_name_from_url(url: &str) -> String {
    url.rsplit('/').next().filter(|segment| !segment.is_empty()).unwrap_or("media").to_string()
}
