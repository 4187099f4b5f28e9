//! Google Gemini `generateContent` adapter
//!
//! A different prompt envelope entirely: parts arrays in, parts arrays out.
//! Images come back inline as base64, never as URLs, and the model must be
//! asked for IMAGE response modality explicitly.

use serde_json::{json, Value};

use super::{bare_key, detect_mime, full_prompt, FormatAdapter, ProviderPayload, RequestFlow};
use crate::decode::RawResult;
use crate::error::GenerationError;
use crate::registry::ModelProfile;
use crate::request::GenerationRequest;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

pub struct GeminiAdapter;

impl FormatAdapter for GeminiAdapter {
    fn encode(
        &self,
        profile: &ModelProfile,
        request: &GenerationRequest,
    ) -> Result<ProviderPayload, GenerationError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            profile.base_url.trim_end_matches('/'),
            profile.model_name
        );

        let mut parts = vec![json!({"text": full_prompt(request)})];
        if let Some(image) = &request.source_image {
            parts.push(json!({
                "inline_data": {
                    "mime_type": detect_mime(image),
                    "data": BASE64.encode(image),
                }
            }));
        }

        // responseModalities is what turns a chat model into an image model;
        // without it Gemini answers with text only
        let body = json!({
            "contents": [{"parts": parts}],
            "generationConfig": {"responseModalities": ["TEXT", "IMAGE"]},
        });

        Ok(ProviderPayload {
            url,
            headers: vec![(
                "x-goog-api-key".to_string(),
                bare_key(&profile.api_key).to_string(),
            )],
            body,
            flow: RequestFlow::Single,
        })
    }

    /// The image part is `candidates[0].content.parts[*].inlineData.data`;
    /// some deployments emit snake_case `inline_data`
    fn extract(&self, body: &Value) -> RawResult {
        let mut raw = RawResult::default();
        let parts = body
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|a| a.first())
            .and_then(|cand| cand.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(|p| p.as_array());
        if let Some(parts) = parts {
            for part in parts {
                let data = part
                    .get("inlineData")
                    .or_else(|| part.get("inline_data"))
                    .and_then(|inline| inline.get("data"))
                    .and_then(|v| v.as_str());
                if let Some(b64) = data {
                    raw.base64 = Some(b64.to_string());
                    break;
                }
            }
        }
        // 2xx bodies can still carry an error object and no image
        raw.provider_message = body
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .map(ToString::to_string);
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::format::ProviderFormat;
    use crate::request::{GenerationMode, ImageSize, ProviderOverrides};
    use bytes::Bytes;

    fn profile() -> ModelProfile {
        ModelProfile {
            id: "gm".to_string(),
            display_name: "Gemini".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: "goog-key".to_string(),
            format: ProviderFormat::Gemini,
            model_name: "gemini-2.5-flash-image-preview".to_string(),
            support_img2img: true,
            fixed_size_enabled: false,
            default_size: "1024x1024".to_string(),
            overrides: ProviderOverrides::default(),
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            mode: GenerationMode::TextToImage,
            downgraded: false,
            prompt: "a koi pond".to_string(),
            negative_prompt: None,
            size: ImageSize::Auto,
            source_image: None,
            model_id: "gm".to_string(),
            style_id: None,
            overrides: ProviderOverrides::default(),
        }
    }

    #[test]
    fn test_encode_envelope() {
        let payload = GeminiAdapter.encode(&profile(), &request()).unwrap();
        assert_eq!(
            payload.url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-image-preview:generateContent"
        );
        assert_eq!(payload.body["contents"][0]["parts"][0]["text"], "a koi pond");
        assert_eq!(
            payload.body["generationConfig"]["responseModalities"],
            serde_json::json!(["TEXT", "IMAGE"])
        );
        assert!(payload
            .headers
            .iter()
            .any(|(k, v)| k == "x-goog-api-key" && v == "goog-key"));
    }

    #[test]
    fn test_encode_img2img_adds_inline_part() {
        let mut r = request();
        r.mode = GenerationMode::ImageToImage;
        r.source_image = Some(Bytes::from_static(b"RIFF\x00\x00\x00\x00WEBPVP8 "));
        let payload = GeminiAdapter.encode(&profile(), &r).unwrap();
        let part = &payload.body["contents"][0]["parts"][1]["inline_data"];
        assert_eq!(part["mime_type"], "image/webp");
        assert!(part["data"].is_string());
    }

    #[test]
    fn test_extract_camel_and_snake_case() {
        for key in ["inlineData", "inline_data"] {
            let body = serde_json::json!({
                "candidates": [{"content": {"parts": [
                    {"text": "here you go"},
                    {key: {"mimeType": "image/png", "data": "cGl4ZWxz"}}
                ]}}]
            });
            assert_eq!(
                GeminiAdapter.extract(&body).base64.as_deref(),
                Some("cGl4ZWxz")
            );
        }
    }

    #[test]
    fn test_text_only_answer_is_empty_result() {
        let body = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "cannot draw that"}]}}]
        });
        assert!(matches!(
            GeminiAdapter.extract(&body).resolve(),
            Err(GenerationError::EmptyResult(_))
        ));
    }

    #[test]
    fn test_error_body_message_surfaces() {
        let body = serde_json::json!({"error": {"message": "model overloaded"}});
        match GeminiAdapter.extract(&body).resolve() {
            Err(GenerationError::EmptyResult(msg)) => assert_eq!(msg, "model overloaded"),
            other => panic!("expected EmptyResult, got {:?}", other),
        }
    }
}
