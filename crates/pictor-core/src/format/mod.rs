//! Provider wire-format handling
//!
//! Abstracts the differences between the OpenAI, Doubao, Gemini and
//! ModelScope image APIs. Each format adapter knows how to build its request
//! payload and where its response schema hides the image. Adapters are pure:
//! no network I/O, no state; the HTTP call belongs to [`crate::transport`].

pub mod doubao;
pub mod gemini;
pub mod modelscope;
pub mod openai;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decode::{ImageResult, RawResult};
use crate::error::GenerationError;
use crate::registry::ModelProfile;
use crate::request::{GenerationMode, GenerationRequest};

/// The closed set of supported provider wire formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProviderFormat {
    /// OpenAI-style `/images/generations` (also SiliconFlow, ModelScope's
    /// synchronous endpoint, Volcano Ark's OpenAI-compatible surface)
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// Doubao / Volcano Ark native API
    #[serde(rename = "doubao")]
    Doubao,
    /// Google Gemini `generateContent`
    #[serde(rename = "gemini")]
    Gemini,
    /// ModelScope async task API (submit, then poll)
    #[serde(rename = "modelscope")]
    ModelScope,
}

impl std::fmt::Display for ProviderFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Doubao => write!(f, "doubao"),
            Self::Gemini => write!(f, "gemini"),
            Self::ModelScope => write!(f, "modelscope"),
        }
    }
}

/// How the transport should drive the HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFlow {
    /// One POST, one response
    Single,
    /// POST a task submission, then poll `{poll_url_base}/{task_id}` until
    /// the task settles; the final task body is what gets decoded
    SubmitPoll {
        poll_url_base: String,
        poll_headers: Vec<(String, String)>,
    },
}

/// A fully encoded provider request, ready for the transport
#[derive(Debug, Clone)]
pub struct ProviderPayload {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
    pub flow: RequestFlow,
}

/// Trait for handling different provider API formats
///
/// Implementations convert between the canonical request and one
/// provider-specific schema. Adding a format means adding one implementation;
/// existing ones must not change behavior.
pub trait FormatAdapter: Send + Sync {
    /// Build the provider-specific HTTP payload for a canonical request
    fn encode(
        &self,
        profile: &ModelProfile,
        request: &GenerationRequest,
    ) -> Result<ProviderPayload, GenerationError>;

    /// Pull the candidate image fields out of a 2xx response body
    fn extract(&self, body: &Value) -> RawResult;
}

/// Select the adapter for a wire format. The single dispatch point: every
/// encode and decode in the broker goes through here.
pub fn adapter_for(format: ProviderFormat) -> Box<dyn FormatAdapter> {
    match format {
        ProviderFormat::OpenAi => Box::new(openai::OpenAiAdapter),
        ProviderFormat::Doubao => Box::new(doubao::DoubaoAdapter),
        ProviderFormat::Gemini => Box::new(gemini::GeminiAdapter),
        ProviderFormat::ModelScope => Box::new(modelscope::ModelScopeAdapter),
    }
}

/// Encode a canonical request for its profile's format
pub fn encode(
    profile: &ModelProfile,
    request: &GenerationRequest,
) -> Result<ProviderPayload, GenerationError> {
    if request.mode == GenerationMode::ImageToImage && request.source_image.is_none() {
        return Err(GenerationError::Config(
            "image-to-image request without a source image".to_string(),
        ));
    }
    adapter_for(profile.format).encode(profile, request)
}

/// Decode a provider HTTP response into a canonical result.
///
/// Status is inspected first; only 2xx bodies reach the response decoder.
pub fn decode(
    format: ProviderFormat,
    status: u16,
    body: &[u8],
) -> Result<ImageResult, GenerationError> {
    if let Some(err) = classify_status(status, body) {
        return Err(err);
    }
    let json: Value = serde_json::from_slice(body)
        .map_err(|e| GenerationError::Decode(format!("response is not valid JSON: {}", e)))?;
    adapter_for(format).extract(&json).resolve()
}

/// Map a non-2xx status to its error kind, keeping the provider message
/// verbatim so limit dimensions (RPM/RPD/TPM/TPD/IPM/IPD) stay visible.
fn classify_status(status: u16, body: &[u8]) -> Option<GenerationError> {
    if (200..300).contains(&status) {
        return None;
    }
    let message = provider_message(body);
    Some(match status {
        400 => GenerationError::BadRequest(message),
        401 => GenerationError::Auth(message),
        403 => GenerationError::Permission(message),
        429 => GenerationError::RateLimited(message),
        503 | 504 => GenerationError::UpstreamOverloaded(message),
        _ => GenerationError::UnknownProvider { status, message },
    })
}

/// Prefer the JSON error message when the body carries one
fn provider_message(body: &[u8]) -> String {
    if let Ok(json) = serde_json::from_slice::<Value>(body) {
        for path in [&["error", "message"][..], &["message"][..]] {
            let mut node = &json;
            for &key in path {
                match node.get(key) {
                    Some(next) => node = next,
                    None => {
                        node = &Value::Null;
                        break;
                    }
                }
            }
            if let Some(text) = node.as_str() {
                return text.to_string();
            }
        }
    }
    String::from_utf8_lossy(body).into_owned()
}

/// Strip the `Bearer ` prefix some operators paste into their config; the
/// adapter decides whether to re-add it
pub(crate) fn bare_key(api_key: &str) -> &str {
    api_key.strip_prefix("Bearer ").unwrap_or(api_key)
}

/// Sniff the image mime type from its leading bytes (jpeg by default)
pub(crate) fn detect_mime(image: &[u8]) -> &'static str {
    if image.starts_with(b"\x89PNG") {
        "image/png"
    } else if image.len() >= 12 && &image[..4] == b"RIFF" && &image[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

/// Encode source image bytes as the `data:image/...;base64,` URI the OpenAI,
/// Doubao and ModelScope schemas expect
pub(crate) fn data_uri(image: &[u8]) -> String {
    format!("data:{};base64,{}", detect_mime(image), BASE64.encode(image))
}

/// Effective prompt: canonical prompt plus the model's enhancer fragment
pub(crate) fn full_prompt(request: &GenerationRequest) -> String {
    match request.overrides.custom_prompt_add.as_deref() {
        Some(add) if !add.is_empty() => format!("{}{}", request.prompt, add),
        _ => request.prompt.clone(),
    }
}

/// Effective negative prompt: canonical plus the model's enhancer fragment
pub(crate) fn full_negative_prompt(request: &GenerationRequest) -> String {
    let base = request.negative_prompt.as_deref().unwrap_or("");
    match request.overrides.negative_prompt_add.as_deref() {
        Some(add) if !add.is_empty() => format!("{}{}", base, add),
        _ => base.to_string(),
    }
}
