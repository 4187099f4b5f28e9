//! OpenAI-style image API adapter
//!
//! `POST {base_url}/images/generations`. This is the catch-all format: the
//! same wire shape is spoken (with small parameter differences) by
//! SiliconFlow, ModelScope's synchronous endpoint and Volcano Ark's
//! OpenAI-compatible surface.

use serde_json::{json, Value};

use super::{data_uri, full_negative_prompt, full_prompt, FormatAdapter, ProviderPayload, RequestFlow};
use crate::decode::RawResult;
use crate::error::GenerationError;
use crate::registry::ModelProfile;
use crate::request::GenerationRequest;

/// Volcano Ark's OpenAI-compatible endpoint takes `watermark` instead of
/// guidance/steps
const VOLCANO_ARK_BASE: &str = "https://ark.cn-beijing.volces.com/api/v3";

pub struct OpenAiAdapter;

impl FormatAdapter for OpenAiAdapter {
    fn encode(
        &self,
        profile: &ModelProfile,
        request: &GenerationRequest,
    ) -> Result<ProviderPayload, GenerationError> {
        let base = profile.base_url.trim_end_matches('/');
        let url = format!("{}/images/generations", base);

        let mut body = json!({
            "model": profile.model_name,
            "prompt": full_prompt(request),
            "negative_prompt": full_negative_prompt(request),
            "size": request.size.as_wire(),
            "seed": request.overrides.seed.unwrap_or(42),
        });

        if base == VOLCANO_ARK_BASE {
            body["watermark"] = json!(request.overrides.watermark.unwrap_or(true));
        } else {
            body["guidance_scale"] = json!(request.overrides.guidance_scale.unwrap_or(2.5));
            body["num_inference_steps"] =
                json!(request.overrides.num_inference_steps.unwrap_or(20));
        }

        if let Some(image) = &request.source_image {
            body["image"] = json!(data_uri(image));
            if let Some(strength) = request.overrides.strength {
                body["strength"] = json!(strength);
            }
        }

        Ok(ProviderPayload {
            url,
            // The key goes in Authorization verbatim; some gateways expect it
            // without the Bearer prefix and break when one is added
            headers: vec![
                ("Authorization".to_string(), profile.api_key.clone()),
                ("Accept".to_string(), "application/json".to_string()),
            ],
            body,
            flow: RequestFlow::Single,
        })
    }

    /// Recognized shapes: `data[0].b64_json`, `data[0].url`, `images[0].url`
    /// (ModelScope sync), top-level `url`
    fn extract(&self, body: &Value) -> RawResult {
        let mut raw = RawResult::default();
        if let Some(first) = body.get("data").and_then(|d| d.as_array()).and_then(|a| a.first()) {
            if let Some(b64) = first.get("b64_json").and_then(|v| v.as_str()) {
                raw.base64 = Some(b64.to_string());
            }
            if let Some(url) = first.get("url").and_then(|v| v.as_str()) {
                raw.url = Some(url.to_string());
            }
        }
        if raw.url.is_none() {
            raw.url = body
                .get("images")
                .and_then(|i| i.as_array())
                .and_then(|a| a.first())
                .and_then(|img| img.get("url"))
                .and_then(|v| v.as_str())
                .map(ToString::to_string)
                .or_else(|| {
                    body.get("url")
                        .and_then(|v| v.as_str())
                        .map(ToString::to_string)
                });
        }
        raw
    }
}
