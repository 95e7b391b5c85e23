//! Base32 (RFC 4648) handling for OTP secrets.

use crate::{AuthenticatorError, Result};
use data_encoding::{BASE32, BASE32_NOPAD};

/// Decode a base32 secret. Case-insensitive; embedded spaces and `-`
/// separators are stripped first. Correct or absent padding is accepted.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    let normalized = strip(text);
    if normalized.is_empty() {
        return Err(AuthenticatorError::Format(
            "secret cannot be empty".to_string(),
        ));
    }

    let decoded = BASE32_NOPAD
        .decode(normalized.as_bytes())
        .or_else(|_| BASE32.decode(normalized.as_bytes()))
        .map_err(|_| AuthenticatorError::Format("secret must be valid base32".to_string()))?;

    if decoded.is_empty() {
        return Err(AuthenticatorError::Format(
            "secret decodes to empty bytes".to_string(),
        ));
    }

    Ok(decoded)
}

/// `decode` reduced to success/failure.
pub fn is_valid(text: &str) -> bool {
    decode(text).is_ok()
}

/// The stored form of a secret: uppercased, separators stripped. Errors if
/// the result does not decode.
pub fn normalize(text: &str) -> Result<String> {
    let normalized = strip(text);
    decode(&normalized)?;
    Ok(normalized)
}

fn strip(text: &str) -> String {
    text.trim().replace([' ', '-'], "").to_ascii_uppercase()
}
