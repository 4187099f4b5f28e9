//! Generation broker
//!
//! Composes the registry, style table, cache, adapters and transport into
//! one call surface. Per request: resolve model and style, downgrade
//! image-to-image when the model cannot do it, fingerprint, consult the
//! cache, and on a miss perform exactly one upstream call - concurrent
//! identical requests collapse onto the first one in flight.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::cache::{GenerationCache, Outcome};
use crate::config::PictorConfig;
use crate::constants;
use crate::decode::ImageResult;
use crate::error::GenerationError;
use crate::format;
use crate::registry::{ModelProfile, ModelRegistry};
use crate::request::{Fingerprint, GenerationMode, GenerationRequest, ImageSize};
use crate::styles::{StyleEntry, StyleTable};
use crate::transport::Transport;

/// A caller's raw generation intent, before resolution
#[derive(Debug, Clone, Default)]
pub struct GenerationIntent {
    pub mode: GenerationMode,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    /// Requested size string (e.g. "1024x1024"); invalid or absent falls
    /// back to the model default
    pub size: Option<String>,
    /// Required iff mode is image-to-image
    pub source_image: Option<Bytes>,
    /// Registry key; absent means the default model (or the command-scope
    /// model when a style is named)
    pub model_id: Option<String>,
    /// Style id or alias, any locale
    pub style: Option<String>,
    /// Image-to-image strength, clamped to 0.1..=1.0, default 0.7
    pub strength: Option<f64>,
}

/// Snapshot of the broker's runtime configuration, for the admin surface
#[derive(Debug, Clone)]
pub struct BrokerStatus {
    pub default_model: String,
    pub command_model: String,
    pub cache_enabled: bool,
    pub cached_outcomes: usize,
    pub debug: bool,
}

/// The generation broker
pub struct Broker {
    registry: Arc<ModelRegistry>,
    styles: Arc<StyleTable>,
    cache: Arc<GenerationCache>,
    transport: Arc<dyn Transport>,
    /// Log the resolved generation parameters for every request
    debug: bool,
}

impl Broker {
    pub fn new(
        registry: ModelRegistry,
        styles: StyleTable,
        cache: GenerationCache,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            styles: Arc::new(styles),
            cache: Arc::new(cache),
            transport,
            debug: false,
        }
    }

    /// Toggle per-request parameter logging
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Build a broker straight from a configuration document
    pub fn from_config(
        config: &PictorConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, GenerationError> {
        Ok(Self::new(
            config.build_registry()?,
            config.build_styles(),
            config.build_cache(),
            transport,
        )
        .with_debug(config.components.debug))
    }

    /// Generate one image. Returns exactly one complete result or one error;
    /// never a partial answer.
    pub async fn generate(
        &self,
        intent: GenerationIntent,
    ) -> Result<ImageResult, GenerationError> {
        let request = self.resolve(intent)?;
        let profile = self.registry.get(&request.model_id)?.clone();
        let fingerprint = request.fingerprint();
        debug!(
            "request resolved: model={} mode={:?} fingerprint={}",
            request.model_id, request.mode, fingerprint
        );
        if self.debug {
            info!(
                "generation parameters: model={} mode={:?} size={} style={:?} overrides={:?}",
                request.model_id,
                request.mode,
                request.size.as_wire(),
                request.style_id,
                request.overrides
            );
        }

        if let Some(entry) = self.cache.lookup(&fingerprint) {
            info!("cache hit for {}", fingerprint);
            return Self::unpack(entry.outcome);
        }

        // First identical request in wins; the rest queue here and then
        // re-check the cache instead of paying for a duplicate upstream call
        let guard = self.cache.inflight_guard(fingerprint);
        let permit = guard.lock_owned().await;
        if let Some(entry) = self.cache.lookup(&fingerprint) {
            info!("cache hit for {} after awaiting in-flight twin", fingerprint);
            return Self::unpack(entry.outcome);
        }

        // Spawned rather than awaited inline, with the owned permit moved
        // into the task: the upstream call is not cancelable, so even when
        // the caller abandons the request the in-flight marker stays held
        // until the outcome is committed and duplicates keep collapsing.
        let task = tokio::spawn(Self::call_upstream(
            self.cache.clone(),
            self.transport.clone(),
            profile,
            request,
            fingerprint,
            permit,
        ));
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(GenerationError::Transport(format!(
                "generation task failed: {}",
                e
            ))),
        }
    }

    /// Encode, dispatch, decode, commit. One upstream call, no internal
    /// retries; runs to completion even if the caller goes away.
    async fn call_upstream(
        cache: Arc<GenerationCache>,
        transport: Arc<dyn Transport>,
        profile: ModelProfile,
        request: GenerationRequest,
        fingerprint: Fingerprint,
        permit: OwnedMutexGuard<()>,
    ) -> Result<ImageResult, GenerationError> {
        let outcome = async {
            let payload = format::encode(&profile, &request)?;
            let reply = transport.dispatch(&payload).await?;
            format::decode(profile.format, reply.status, &reply.body)
        }
        .await;
        match &outcome {
            Ok(result) => cache.store(fingerprint, Outcome::Success(result.clone())),
            Err(err) if err.is_cacheable() => {
                cache.store(fingerprint, Outcome::Failure(err.clone()));
            }
            Err(_) => {}
        }
        // Unregister first, then wake the waiters; they re-check the cache
        cache.release_inflight(&fingerprint);
        drop(permit);
        outcome
    }

    /// Turn an intent into a canonical request: pick the model, apply the
    /// style fragment, downgrade if needed, settle the size.
    fn resolve(&self, intent: GenerationIntent) -> Result<GenerationRequest, GenerationError> {
        let profile = match &intent.model_id {
            Some(id) => self.registry.get(id)?.clone(),
            // Style commands go to the command-scope model, everything else
            // to the default
            None if intent.style.is_some() => self.registry.command_model().clone(),
            None => self.registry.default_model().clone(),
        };
        profile.validate_credentials()?;

        let style = intent
            .style
            .as_deref()
            .map(|name| self.styles.resolve(name))
            .transpose()?;

        let mut prompt = intent.prompt.trim().to_string();
        if let Some(entry) = style {
            prompt = if prompt.is_empty() {
                entry.prompt.clone()
            } else {
                format!("{}, {}", prompt, entry.prompt)
            };
        }
        if prompt.is_empty() {
            return Err(GenerationError::Config(
                "prompt is empty and no style was named".to_string(),
            ));
        }
        if prompt.chars().count() > constants::generation::MAX_PROMPT_LEN {
            prompt = prompt
                .chars()
                .take(constants::generation::MAX_PROMPT_LEN)
                .collect();
            debug!("prompt truncated to {} chars", constants::generation::MAX_PROMPT_LEN);
        }

        let mut mode = intent.mode;
        let mut source_image = intent.source_image;
        let mut downgraded = false;
        match mode {
            GenerationMode::ImageToImage if source_image.is_none() => {
                return Err(GenerationError::Config(
                    "image-to-image request without a source image".to_string(),
                ));
            }
            GenerationMode::ImageToImage if !profile.support_img2img => {
                warn!(
                    "model '{}' does not support image-to-image, downgrading to text-to-image",
                    profile.id
                );
                mode = GenerationMode::TextToImage;
                source_image = None;
                downgraded = true;
            }
            _ => {}
        }
        if mode == GenerationMode::TextToImage && !downgraded {
            source_image = None;
        }

        let size = if profile.fixed_size_enabled {
            Self::model_size(&profile)
        } else {
            match intent.size.as_deref().map(ImageSize::parse) {
                Some(Some(parsed)) => parsed,
                Some(None) => {
                    warn!("invalid size requested, using the model default");
                    Self::model_size(&profile)
                }
                None => Self::model_size(&profile),
            }
        };

        let mut overrides = profile.overrides.clone();
        if mode == GenerationMode::ImageToImage {
            let strength = intent.strength.unwrap_or(0.7);
            overrides.strength = Some(if (0.1..=1.0).contains(&strength) {
                strength
            } else {
                0.7
            });
        }

        Ok(GenerationRequest {
            mode,
            downgraded,
            prompt,
            negative_prompt: intent.negative_prompt,
            size,
            source_image,
            model_id: profile.id,
            style_id: style.map(|entry| entry.id.clone()),
            overrides,
        })
    }

    fn model_size(profile: &ModelProfile) -> ImageSize {
        ImageSize::parse(&profile.default_size).unwrap_or(ImageSize::Pixels {
            width: 1024,
            height: 1024,
        })
    }

    fn unpack(outcome: Outcome) -> Result<ImageResult, GenerationError> {
        match outcome {
            Outcome::Success(result) => Ok(result),
            Outcome::Failure(err) => Err(err),
        }
    }

    // Admin surface

    /// All configured models, insertion order
    pub fn list_models(&self) -> Vec<ModelProfile> {
        self.registry.list().to_vec()
    }

    /// Point the command-scope selector at another model
    pub fn set_model(&self, id: &str) -> Result<(), GenerationError> {
        self.registry.set_command_model(id)
    }

    /// Snapshot of the current runtime configuration
    pub fn current_config(&self) -> BrokerStatus {
        BrokerStatus {
            default_model: self.registry.default_model().id.clone(),
            command_model: self.registry.command_model().id.clone(),
            cache_enabled: self.cache.is_enabled(),
            cached_outcomes: self.cache.len(),
            debug: self.debug,
        }
    }

    /// Clear the command-scope override back to the default
    pub fn reset_config(&self) {
        self.registry.reset();
    }

    /// All styles, insertion order
    pub fn list_styles(&self) -> Vec<StyleEntry> {
        self.styles.list().to_vec()
    }

    /// One style by id or alias
    pub fn describe_style(&self, id: &str) -> Result<StyleEntry, GenerationError> {
        self.styles.resolve(id).cloned()
    }
}
