//! Doubao (Volcano Ark) native API adapter
//!
//! Same endpoint path as the OpenAI shape but a different parameter set:
//! Bearer auth, `response_format: "url"`, a watermark toggle, and no
//! negative prompt or tuning knobs.

use serde_json::{json, Value};

use super::{bare_key, data_uri, full_prompt, FormatAdapter, ProviderPayload, RequestFlow};
use crate::decode::RawResult;
use crate::error::GenerationError;
use crate::registry::ModelProfile;
use crate::request::GenerationRequest;

pub struct DoubaoAdapter;

impl FormatAdapter for DoubaoAdapter {
    fn encode(
        &self,
        profile: &ModelProfile,
        request: &GenerationRequest,
    ) -> Result<ProviderPayload, GenerationError> {
        let url = format!(
            "{}/images/generations",
            profile.base_url.trim_end_matches('/')
        );

        let mut body = json!({
            "model": profile.model_name,
            "prompt": full_prompt(request),
            "size": request.size.as_wire(),
            "response_format": "url",
            "watermark": request.overrides.watermark.unwrap_or(true),
        });

        if let Some(image) = &request.source_image {
            body["image"] = json!(data_uri(image));
        }

        Ok(ProviderPayload {
            url,
            headers: vec![(
                "Authorization".to_string(),
                format!("Bearer {}", bare_key(&profile.api_key)),
            )],
            body,
            flow: RequestFlow::Single,
        })
    }

    /// Doubao answers with `data[0].url`
    fn extract(&self, body: &Value) -> RawResult {
        RawResult {
            url: body
                .get("data")
                .and_then(|d| d.as_array())
                .and_then(|a| a.first())
                .and_then(|first| first.get("url"))
                .and_then(|v| v.as_str())
                .map(ToString::to_string),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ProviderFormat;
    use crate::request::{GenerationMode, ImageSize, ProviderOverrides};
    use bytes::Bytes;

    fn profile() -> ModelProfile {
        ModelProfile {
            id: "db".to_string(),
            display_name: "Doubao".to_string(),
            base_url: "https://ark.cn-beijing.volces.com/api/v3/".to_string(),
            // Prefix pasted from the provider console; must be stripped once
            api_key: "Bearer ark-key".to_string(),
            format: ProviderFormat::Doubao,
            model_name: "doubao-seedream-3-0".to_string(),
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
            prompt: "a harbor at night".to_string(),
            negative_prompt: None,
            size: ImageSize::Pixels {
                width: 512,
                height: 512,
            },
            source_image: None,
            model_id: "db".to_string(),
            style_id: None,
            overrides: ProviderOverrides::default(),
        }
    }

    #[test]
    fn test_encode_bearer_prefix_not_doubled() {
        let payload = DoubaoAdapter.encode(&profile(), &request()).unwrap();
        let auth = &payload.headers.iter().find(|(k, _)| k == "Authorization").unwrap().1;
        assert_eq!(auth, "Bearer ark-key");
        assert_eq!(payload.body["response_format"], "url");
        assert_eq!(payload.body["watermark"], true);
        assert!(payload.body.get("negative_prompt").is_none());
    }

    #[test]
    fn test_encode_img2img() {
        let mut r = request();
        r.mode = GenerationMode::ImageToImage;
        r.source_image = Some(Bytes::from_static(b"\xff\xd8\xffjpegdata"));
        let payload = DoubaoAdapter.encode(&profile(), &r).unwrap();
        assert!(payload.body["image"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_extract_url() {
        let body = serde_json::json!({"data": [{"url": "https://ark/img.png"}]});
        assert_eq!(
            DoubaoAdapter.extract(&body).url.as_deref(),
            Some("https://ark/img.png")
        );
    }

    #[test]
    fn test_extract_empty_data() {
        let body = serde_json::json!({"data": []});
        assert!(DoubaoAdapter.extract(&body).url.is_none());
    }
}
