//! Telephony audio payload framing
//!
//! The media stream carries 8kHz mono G.711 mu-law audio, base64-encoded
//! per frame. Both the transport and the AI speech session are negotiated
//! to the same codec at stream start, so the relay never transcodes; it
//! only validates and forwards the framed payloads.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::error::{Error, Result};

/// Decode a base64 media payload into raw mu-law bytes.
///
/// The payload arrives exactly as the transport framed it; decoding must
/// be lossless, so any base64 error is surfaced rather than truncated.
pub fn decode_media_payload(payload: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(payload)
        .map_err(|e| Error::Transport(format!("invalid media payload: {}", e)))
}

/// Encode raw mu-law bytes into a base64 media payload.
pub fn encode_media_payload(mulaw: &[u8]) -> String {
    BASE64.encode(mulaw)
}
