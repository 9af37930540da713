//! URL-safe base64 as used for group directory names and subscriber
//! message payloads: unpadded on encode, tolerant of either padding style
//! on decode (peers on the other end of the wire may pad).

use base64::engine::general_purpose::{GeneralPurpose, NO_PAD};
use base64::engine::{DecodePaddingMode, GeneralPurposeConfig};
use base64::{alphabet, Engine as _};

use crate::error::{Error, Result};

const TOLERANT_CONFIG: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const ENGINE: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, NO_PAD);
const DECODE_ENGINE: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, TOLERANT_CONFIG);

pub fn b64_url_encode(bytes: &[u8]) -> String {
    ENGINE.encode(bytes)
}

pub fn b64_url_decode(text: &str) -> Result<Vec<u8>> {
    DECODE_ENGINE
        .decode(text)
        .map_err(|e| Error::Encoding(e.to_string()))
}
