//! Response decoding
//!
//! Provider adapters extract candidate image fields from their own response
//! schemas; this module turns those candidates into one canonical result.
//! Three mutually exclusive shapes are recognized, in a fixed priority order
//! so ambiguous bodies resolve deterministically: remote URL, inline binary,
//! base64 text.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;

use crate::error::GenerationError;

/// Canonical image result returned to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageResult {
    /// A fetchable remote URL
    Reference(String),
    /// Image bytes, ready to use
    Inline(Bytes),
}

/// Candidate image fields extracted from a provider response body.
///
/// An adapter fills in whichever fields its schema carried; more than one may
/// be present for ambiguous bodies.
#[derive(Debug, Default)]
pub struct RawResult {
    /// A field holding a fetchable remote URL
    pub url: Option<String>,
    /// A field holding already-binary image data
    pub binary: Option<Bytes>,
    /// A field holding base64-encoded image data
    pub base64: Option<String>,
    /// Provider-supplied diagnostic, attached to empty-result errors
    pub provider_message: Option<String>,
}

impl RawResult {
    /// Resolve the candidates into a canonical result.
    ///
    /// Priority is fixed: URL, then inline binary, then base64. A body with
    /// none of the three shapes fails with `EmptyResult`.
    pub fn resolve(self) -> Result<ImageResult, GenerationError> {
        if let Some(url) = self.url {
            return Ok(ImageResult::Reference(url));
        }
        if let Some(binary) = self.binary {
            return Ok(ImageResult::Inline(binary));
        }
        if let Some(b64) = self.base64 {
            let bytes = BASE64
                .decode(strip_data_uri(&b64))
                .map_err(|e| GenerationError::Decode(format!("invalid base64 image: {}", e)))?;
            return Ok(ImageResult::Inline(Bytes::from(bytes)));
        }
        Err(GenerationError::EmptyResult(
            self.provider_message
                .unwrap_or_else(|| "response contained no image".to_string()),
        ))
    }
}

/// Drop a `data:image/...;base64,` prefix if the provider included one
fn strip_data_uri(b64: &str) -> &str {
    match b64.split_once(',') {
        Some((head, rest)) if head.starts_with("data:image") => rest,
        _ => b64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_shape() {
        let raw = RawResult {
            url: Some("https://cdn.example.com/img.png".to_string()),
            ..Default::default()
        };
        assert_eq!(
            raw.resolve().unwrap(),
            ImageResult::Reference("https://cdn.example.com/img.png".to_string())
        );
    }

    #[test]
    fn test_base64_shape_decodes_exactly() {
        let payload = b"not really a png but good enough";
        let raw = RawResult {
            base64: Some(BASE64.encode(payload)),
            ..Default::default()
        };
        assert_eq!(
            raw.resolve().unwrap(),
            ImageResult::Inline(Bytes::from_static(payload))
        );
    }

    #[test]
    fn test_base64_with_data_uri_prefix() {
        let payload = b"pixels";
        let raw = RawResult {
            base64: Some(format!("data:image/png;base64,{}", BASE64.encode(payload))),
            ..Default::default()
        };
        assert_eq!(
            raw.resolve().unwrap(),
            ImageResult::Inline(Bytes::from_static(payload))
        );
    }

    #[test]
    fn test_invalid_base64_is_decode_error() {
        let raw = RawResult {
            base64: Some("!!!not-base64!!!".to_string()),
            ..Default::default()
        };
        assert!(matches!(raw.resolve(), Err(GenerationError::Decode(_))));
    }

    #[test]
    fn test_priority_url_beats_base64() {
        let raw = RawResult {
            url: Some("https://cdn.example.com/img.png".to_string()),
            base64: Some(BASE64.encode(b"bytes")),
            ..Default::default()
        };
        assert!(matches!(raw.resolve().unwrap(), ImageResult::Reference(_)));
    }

    #[test]
    fn test_priority_binary_beats_base64() {
        let raw = RawResult {
            binary: Some(Bytes::from_static(b"raw")),
            base64: Some(BASE64.encode(b"encoded")),
            ..Default::default()
        };
        assert_eq!(
            raw.resolve().unwrap(),
            ImageResult::Inline(Bytes::from_static(b"raw"))
        );
    }

    #[test]
    fn test_empty_result_carries_provider_message() {
        let raw = RawResult {
            provider_message: Some("model does not support image output".to_string()),
            ..Default::default()
        };
        match raw.resolve() {
            Err(GenerationError::EmptyResult(msg)) => {
                assert!(msg.contains("does not support"));
            }
            other => panic!("expected EmptyResult, got {:?}", other),
        }
    }
}
