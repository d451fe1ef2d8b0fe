//! `X-Line-Signature` verification

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Verify the base64 HMAC-SHA256 of the raw request body
pub fn verify_line_signature(
    body: &[u8],
    signature_header: &str,
    channel_secret: &str,
) -> Result<(), &'static str> {
    let expected = STANDARD
        .decode(signature_header.trim())
        .map_err(|_| "Invalid signature encoding")?;
    let mut mac = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes())
        .map_err(|_| "HMAC key error")?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| "LINE signature mismatch")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(body: &[u8], secret: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        STANDARD.encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature() {
        let body = br#"{"events":[]}"#;
        let sig = sign(body, "channel-secret");
        assert!(verify_line_signature(body, &sig, "channel-secret").is_ok());
    }

    #[test]
    fn test_rejects_tampering() {
        let sig = sign(br#"{"events":[]}"#, "channel-secret");
        assert!(verify_line_signature(br#"{"events":[1]}"#, &sig, "channel-secret").is_err());
        assert!(verify_line_signature(br#"{"events":[]}"#, &sig, "other").is_err());
        assert!(verify_line_signature(b"{}", "%%%", "channel-secret").is_err());
    }
}
