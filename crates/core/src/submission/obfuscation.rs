//! Reversible obfuscation for device credentials (password, PIN, unlock pattern).
//!
//! This is base64, not encryption. It only keeps credentials from being readable at a
//! glance in stored records; anyone with the record can recover them via [`reveal`].

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::domain::work_order::ObfuscatedSecurity;
use crate::wizard::form::SecurityFields;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RevealError {
    #[error("obfuscated value is not valid base64")]
    InvalidEncoding,
    #[error("obfuscated value is not valid utf-8")]
    InvalidUtf8,
}

pub fn obfuscate(value: &str) -> String {
    BASE64.encode(value.as_bytes())
}

pub fn reveal(encoded: &str) -> Result<String, RevealError> {
    let bytes = BASE64.decode(encoded.trim()).map_err(|_| RevealError::InvalidEncoding)?;
    String::from_utf8(bytes).map_err(|_| RevealError::InvalidUtf8)
}

fn obfuscate_non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| obfuscate(value))
}

/// Empty credentials stay absent. The pattern image is a drawing of the pattern, not the
/// pattern itself, and passes through unchanged.
pub fn obfuscate_security(fields: &SecurityFields) -> ObfuscatedSecurity {
    ObfuscatedSecurity {
        device_password: obfuscate_non_empty(fields.device_password.expose_secret()),
        device_pin: obfuscate_non_empty(fields.device_pin.expose_secret()),
        pattern_vector: fields
            .pattern_vector
            .as_ref()
            .and_then(|vector| obfuscate_non_empty(vector.expose_secret())),
        pattern_image: fields.pattern_image.clone(),
    }
}
