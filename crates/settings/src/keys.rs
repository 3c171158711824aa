use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine as _;

use crate::{Result, SettingsError};

/// Normalise a key written as hex or base64 into hex.
///
/// Valid even-length hex is returned verbatim. Otherwise a single trailing
/// `=` is dropped and the rest decoded as unpadded base64: the standard
/// alphabet if the text contains `+` or `/`, the URL-safe one otherwise.
pub fn parse_key(key: &str) -> Result<String> {
    if key.len() % 2 == 0 && hex::decode(key).is_ok() {
        return Ok(key.to_string());
    }

    let trimmed = key.strip_suffix('=').unwrap_or(key);
    let decoded = if trimmed.contains('+') || trimmed.contains('/') {
        STANDARD_NO_PAD.decode(trimmed)
    } else {
        URL_SAFE_NO_PAD.decode(trimmed)
    };

    decoded
        .map(hex::encode)
        .map_err(|e| SettingsError::InvalidKey(e.to_string()))
}
