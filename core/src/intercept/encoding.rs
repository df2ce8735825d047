//! Text payloads for `Fetch` command arguments.
//!
//! Bodies cross the protocol as base64 of their UTF-8 bytes so any Unicode
//! text survives the transport.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

pub fn encode(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Invalid UTF-8 in the decoded bytes becomes U+FFFD
pub fn decode(encoded: &str) -> Result<String, base64::DecodeError> {
    let bytes = STANDARD.decode(encoded)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Encode a payload, treating an empty string as no payload
pub(crate) fn encode_non_empty(text: Option<&str>) -> Option<String> {
    text.filter(|t| !t.is_empty()).map(encode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        assert_eq!(encode("hello"), "aGVsbG8=");
        assert_eq!(decode("aGVsbG8=").unwrap(), "hello");
    }

    #[test]
    fn unicode_survives() {
        for sample in [
            "plain ascii",
            "emoji 🎉🚀",
            "日本語テキスト",
            "",
            "\u{0}\u{1}\t\r\n\u{7f}",
            r#"{"key":"välue"}"#,
        ] {
            assert_eq!(decode(&encode(sample)).unwrap(), sample, "sample {sample:?}");
        }
    }

    #[test]
    fn invalid_input_is_an_error() {
        assert!(decode("not base64!").is_err());
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        // 0xFF is never valid UTF-8
        assert_eq!(decode("/w==").unwrap(), "\u{FFFD}");
    }

    #[test]
    fn empty_payload_is_dropped() {
        assert_eq!(encode_non_empty(Some("")), None);
        assert_eq!(encode_non_empty(None), None);
        assert_eq!(encode_non_empty(Some("hi")).as_deref(), Some("aGk="));
    }
}
