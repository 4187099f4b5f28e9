//! Canonical generation requests and cache fingerprints
//!
//! The canonical request is the format-agnostic representation of a
//! generation intent after model, style and size resolution. It is immutable
//! once built; adapters read from it, never write to it.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants;

/// Whether the request synthesizes a new image or edits an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Prompt only
    #[default]
    TextToImage,
    /// Prompt plus a source image to transform
    ImageToImage,
}

/// Target image size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    /// Let the provider pick
    Auto,
    /// Explicit width and height in pixels
    Pixels { width: u32, height: u32 },
}

impl ImageSize {
    /// Parse a size string like `1024x1024` or `512*768`.
    ///
    /// The separator is a case-insensitive `x` or a `*`; dimensions must fall
    /// in 64..=4096. Returns `None` for anything else, including `""`.
    pub fn parse(size: &str) -> Option<Self> {
        let lowered = size.trim().to_lowercase();
        if lowered == "auto" {
            return Some(Self::Auto);
        }
        let (w, h) = lowered
            .split_once('x')
            .or_else(|| lowered.split_once('*'))?;
        let width: u32 = w.trim().parse().ok()?;
        let height: u32 = h.trim().parse().ok()?;
        let valid = |d: u32| {
            (constants::generation::MIN_DIMENSION..=constants::generation::MAX_DIMENSION)
                .contains(&d)
        };
        if valid(width) && valid(height) {
            Some(Self::Pixels { width, height })
        } else {
            None
        }
    }

    /// Render as the `WxH` string providers expect, or `auto`
    pub fn as_wire(&self) -> String {
        match self {
            Self::Auto => "auto".to_string(),
            Self::Pixels { width, height } => format!("{}x{}", width, height),
        }
    }
}

/// Model-scoped tuning knobs passed through to the provider.
///
/// Provider-specific tuning knobs; the broker carries them opaquely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderOverrides {
    /// Classifier-free guidance scale
    pub guidance_scale: Option<f64>,
    /// Denoising step count
    pub num_inference_steps: Option<u32>,
    /// Fixed seed for reproducible output
    pub seed: Option<i64>,
    /// Provider watermarking toggle (Doubao / Volcano Ark)
    pub watermark: Option<bool>,
    /// Fragment appended to every prompt for this model
    pub custom_prompt_add: Option<String>,
    /// Fragment appended to the negative prompt for this model
    pub negative_prompt_add: Option<String>,
    /// Image-to-image strength, 0.1..=1.0
    pub strength: Option<f64>,
}

/// Canonical, fully resolved generation request
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Effective mode after any downgrade
    pub mode: GenerationMode,
    /// True when an image-to-image intent was downgraded because the model
    /// lacks img2img support; part of the fingerprint so the downgraded
    /// request never collides with a genuine text-to-image one
    pub downgraded: bool,
    /// Effective prompt (style fragment already appended)
    pub prompt: String,
    /// Negative prompt, empty string when unset
    pub negative_prompt: Option<String>,
    /// Resolved target size
    pub size: ImageSize,
    /// Source image bytes; present iff `mode` is image-to-image
    pub source_image: Option<Bytes>,
    /// Resolved model id (registry key, not the provider's model name)
    pub model_id: String,
    /// Resolved style id, if a style was requested
    pub style_id: Option<String>,
    /// Model-scoped tuning knobs
    pub overrides: ProviderOverrides,
}

impl GenerationRequest {
    /// Compute the cache fingerprint over all semantically relevant fields.
    ///
    /// Fields are length-delimited before hashing so no two field sequences
    /// can collapse to the same byte stream. Source images contribute a hash
    /// of their bytes rather than the bytes themselves.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        let mut field = |bytes: &[u8]| {
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        };
        field(match self.mode {
            GenerationMode::TextToImage => b"t2i",
            GenerationMode::ImageToImage => b"i2i",
        });
        field(if self.downgraded { b"downgraded" } else { b"direct" });
        field(self.prompt.as_bytes());
        field(self.negative_prompt.as_deref().unwrap_or("").as_bytes());
        field(self.size.as_wire().as_bytes());
        field(self.model_id.as_bytes());
        field(self.style_id.as_deref().unwrap_or("").as_bytes());
        match &self.source_image {
            Some(image) => field(Sha256::digest(image).as_slice()),
            None => field(b""),
        }
        // Tuning knobs vary per caller (strength) and per model; serialized
        // as one canonical JSON field, struct field order is fixed
        field(&serde_json::to_vec(&self.overrides).unwrap_or_default());
        Fingerprint(hasher.finalize().into())
    }
}

/// Content hash identifying a canonical request in the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short hex prefix is enough for log correlation
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
