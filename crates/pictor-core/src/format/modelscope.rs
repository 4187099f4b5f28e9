//! ModelScope async task API adapter
//!
//! Submission and result are two different exchanges: POST the generation as
//! an async task, then poll `/v1/tasks/{task_id}` until it settles. The
//! adapter stays pure - it emits a submit-and-poll payload and decodes the
//! final task body; the polling loop itself lives in the transport.

use serde_json::{json, Value};

use super::{bare_key, data_uri, full_prompt, FormatAdapter, ProviderPayload, RequestFlow};
use crate::decode::RawResult;
use crate::error::GenerationError;
use crate::registry::ModelProfile;
use crate::request::GenerationRequest;

pub struct ModelScopeAdapter;

impl FormatAdapter for ModelScopeAdapter {
    fn encode(
        &self,
        profile: &ModelProfile,
        request: &GenerationRequest,
    ) -> Result<ProviderPayload, GenerationError> {
        let base = profile.base_url.trim_end_matches('/');
        let auth = format!("Bearer {}", bare_key(&profile.api_key));

        // Size is not part of the task schema; the model decides
        let mut body = json!({
            "model": profile.model_name,
            "prompt": full_prompt(request),
            "guidance_scale": request.overrides.guidance_scale.unwrap_or(2.5),
            "num_inference_steps": request.overrides.num_inference_steps.unwrap_or(20),
        });

        if let Some(image) = &request.source_image {
            body["image"] = json!(data_uri(image));
        }

        Ok(ProviderPayload {
            url: format!("{}/images/generations", base),
            headers: vec![
                ("Authorization".to_string(), auth.clone()),
                ("X-ModelScope-Async-Mode".to_string(), "true".to_string()),
            ],
            body,
            flow: RequestFlow::SubmitPoll {
                poll_url_base: format!("{}/v1/tasks", base),
                poll_headers: vec![
                    ("Authorization".to_string(), auth),
                    (
                        "X-ModelScope-Task-Type".to_string(),
                        "image_generation".to_string(),
                    ),
                ],
            },
        })
    }

    /// Decodes the final task body: `output_images[0]` on success,
    /// `error_message` when the task failed
    fn extract(&self, body: &Value) -> RawResult {
        RawResult {
            url: body
                .get("output_images")
                .and_then(|o| o.as_array())
                .and_then(|a| a.first())
                .and_then(|v| v.as_str())
                .map(ToString::to_string),
            provider_message: body
                .get("error_message")
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

    fn profile() -> ModelProfile {
        ModelProfile {
            id: "ms".to_string(),
            display_name: "ModelScope".to_string(),
            base_url: "https://api-inference.modelscope.cn".to_string(),
            api_key: "ms-key".to_string(),
            format: ProviderFormat::ModelScope,
            model_name: "MusePublic/489_ckpt_FLUX_1".to_string(),
            support_img2img: false,
            fixed_size_enabled: false,
            default_size: "1024x1024".to_string(),
            overrides: ProviderOverrides::default(),
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            mode: GenerationMode::TextToImage,
            downgraded: false,
            prompt: "make it a beach".to_string(),
            negative_prompt: None,
            size: ImageSize::Pixels {
                width: 1024,
                height: 1024,
            },
            source_image: None,
            model_id: "ms".to_string(),
            style_id: None,
            overrides: ProviderOverrides::default(),
        }
    }

    #[test]
    fn test_encode_submit_poll_flow() {
        let payload = ModelScopeAdapter.encode(&profile(), &request()).unwrap();
        assert_eq!(
            payload.url,
            "https://api-inference.modelscope.cn/images/generations"
        );
        assert!(payload
            .headers
            .iter()
            .any(|(k, v)| k == "X-ModelScope-Async-Mode" && v == "true"));
        match payload.flow {
            RequestFlow::SubmitPoll {
                poll_url_base,
                poll_headers,
            } => {
                assert_eq!(
                    poll_url_base,
                    "https://api-inference.modelscope.cn/v1/tasks"
                );
                assert!(poll_headers
                    .iter()
                    .any(|(k, v)| k == "X-ModelScope-Task-Type" && v == "image_generation"));
            }
            RequestFlow::Single => panic!("expected submit-poll flow"),
        }
    }

    #[test]
    fn test_encode_has_no_size_field() {
        let payload = ModelScopeAdapter.encode(&profile(), &request()).unwrap();
        assert!(payload.body.get("size").is_none());
        assert_eq!(payload.body["guidance_scale"], 2.5);
    }

    #[test]
    fn test_extract_succeeded_task() {
        let body = serde_json::json!({
            "task_status": "SUCCEED",
            "output_images": ["https://modelscope/out.png"]
        });
        assert_eq!(
            ModelScopeAdapter.extract(&body).url.as_deref(),
            Some("https://modelscope/out.png")
        );
    }

    #[test]
    fn test_extract_failed_task_surfaces_message() {
        let body = serde_json::json!({
            "task_status": "FAILED",
            "error_message": "nsfw content detected"
        });
        match ModelScopeAdapter.extract(&body).resolve() {
            Err(GenerationError::EmptyResult(msg)) => assert_eq!(msg, "nsfw content detected"),
            other => panic!("expected EmptyResult, got {:?}", other),
        }
    }
}
