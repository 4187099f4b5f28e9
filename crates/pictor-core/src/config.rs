//! Configuration document
//!
//! One TOML file describes everything the broker needs: the model profiles,
//! generation defaults, the command-scope model, cache settings, and the
//! style table. The document is read-only input; profiles never change after
//! load, only the model selectors do.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;

use crate::cache::GenerationCache;
use crate::constants;
use crate::error::GenerationError;
use crate::format::ProviderFormat;
use crate::registry::{ModelProfile, ModelRegistry};
use crate::request::ProviderOverrides;
use crate::styles::StyleTable;

/// Top-level configuration document
///
/// Model keys load in lexicographic order (`model1`, `model2`, ...), which
/// makes the no-default fallback (first loaded profile) deterministic.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PictorConfig {
    #[serde(default)]
    pub plugin: PluginSection,
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub components: ComponentsSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub models: BTreeMap<String, ModelSection>,
    #[serde(default)]
    pub styles: BTreeMap<String, String>,
    /// Style id → comma-separated alias list, any locale
    #[serde(default)]
    pub style_aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginSection {
    pub enabled: bool,
}

impl Default for PluginSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationSection {
    /// Model serving requests that name no model
    pub default_model: Option<String>,
    /// Size used when neither request nor model specifies one
    pub default_size: Option<String>,
    /// Global tuning fallbacks, overridden per model
    pub guidance_scale: Option<f64>,
    pub num_inference_steps: Option<u32>,
    pub custom_prompt_add: Option<String>,
    pub negative_prompt_add: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ComponentsSection {
    /// Model serving command-scope (style command) requests
    #[serde(alias = "pic_command_model")]
    pub command_model: Option<String>,
    /// Emit the resolved generation parameters into the log for every request
    #[serde(alias = "enable_debug_info")]
    pub debug: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSection {
    pub enabled: bool,
    pub max_size: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: constants::cache::DEFAULT_MAX_SIZE,
        }
    }
}

/// One `[models.<key>]` block
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSection {
    pub display_name: Option<String>,
    pub base_url: String,
    pub api_key: String,
    #[serde(default)]
    pub format: ProviderFormat,
    /// The provider's own model identifier
    pub model: String,
    #[serde(default = "default_true")]
    pub support_img2img: bool,
    #[serde(default)]
    pub fixed_size_enabled: bool,
    pub default_size: Option<String>,
    pub guidance_scale: Option<f64>,
    pub num_inference_steps: Option<u32>,
    pub seed: Option<i64>,
    pub watermark: Option<bool>,
    pub custom_prompt_add: Option<String>,
    pub negative_prompt_add: Option<String>,
}

fn default_true() -> bool {
    true
}

impl PictorConfig {
    /// Parse a configuration document
    pub fn from_toml_str(raw: &str) -> Result<Self, GenerationError> {
        toml::from_str(raw).map_err(|e| GenerationError::Config(e.to_string()))
    }

    /// Load a configuration file from disk
    pub fn load(path: &Path) -> Result<Self, GenerationError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GenerationError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Build the model registry from the `[models.*]` blocks
    pub fn build_registry(&self) -> Result<ModelRegistry, GenerationError> {
        let fallback_size = self
            .generation
            .default_size
            .clone()
            .unwrap_or_else(|| constants::generation::DEFAULT_SIZE.to_string());
        let profiles = self
            .models
            .iter()
            .map(|(id, m)| ModelProfile {
                id: id.clone(),
                display_name: m.display_name.clone().unwrap_or_else(|| id.clone()),
                base_url: m.base_url.clone(),
                api_key: m.api_key.clone(),
                format: m.format,
                model_name: m.model.clone(),
                support_img2img: m.support_img2img,
                fixed_size_enabled: m.fixed_size_enabled,
                default_size: m.default_size.clone().unwrap_or_else(|| fallback_size.clone()),
                overrides: ProviderOverrides {
                    guidance_scale: m.guidance_scale.or(self.generation.guidance_scale),
                    num_inference_steps: m
                        .num_inference_steps
                        .or(self.generation.num_inference_steps),
                    seed: m.seed,
                    watermark: m.watermark,
                    custom_prompt_add: m
                        .custom_prompt_add
                        .clone()
                        .or_else(|| self.generation.custom_prompt_add.clone()),
                    negative_prompt_add: m
                        .negative_prompt_add
                        .clone()
                        .or_else(|| self.generation.negative_prompt_add.clone()),
                    strength: None,
                },
            })
            .collect();
        let registry = ModelRegistry::new(profiles, self.generation.default_model.as_deref())?;
        if let Some(command_model) = &self.components.command_model {
            registry.set_command_model(command_model)?;
        }
        Ok(registry)
    }

    /// Build the style table from `[styles]` and `[style_aliases]`
    pub fn build_styles(&self) -> StyleTable {
        let aliases: HashMap<String, Vec<String>> = self
            .style_aliases
            .iter()
            .map(|(id, csv)| {
                let list = csv
                    .split(',')
                    .map(|alias| alias.trim().to_string())
                    .filter(|alias| !alias.is_empty())
                    .collect();
                (id.clone(), list)
            })
            .collect();
        let styles = self
            .styles
            .iter()
            .map(|(id, prompt)| (id.clone(), prompt.clone()))
            .collect();
        StyleTable::new(styles, &aliases)
    }

    /// Build the outcome cache from `[cache]`
    pub fn build_cache(&self) -> GenerationCache {
        GenerationCache::new(self.cache.enabled, self.cache.max_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[plugin]
enabled = true

[generation]
default_model = "model1"
default_size = "1024x1024"
negative_prompt_add = ", lowres"

[components]
command_model = "model2"
debug = false

[cache]
enabled = true
max_size = 10

[models.model1]
display_name = "Kolors"
base_url = "https://api.siliconflow.cn/v1"
api_key = "sk-live"
format = "openai"
model = "Kwai-Kolors/Kolors"
support_img2img = true

[models.model2]
base_url = "https://api-inference.modelscope.cn"
api_key = "Bearer ms-live"
format = "modelscope"
model = "MusePublic/489_ckpt_FLUX_1"
support_img2img = false
guidance_scale = 3.5

[styles]
cartoon = "cartoon style, bold outlines"

[style_aliases]
cartoon = "卡通, 动漫"
"#;

    #[test]
    fn test_parse_and_build_registry() {
        let config = PictorConfig::from_toml_str(SAMPLE).unwrap();
        assert!(config.plugin.enabled);
        let registry = config.build_registry().unwrap();
        assert_eq!(registry.default_model().id, "model1");
        assert_eq!(registry.command_model().id, "model2");
        let m2 = registry.get("model2").unwrap();
        assert_eq!(m2.format, ProviderFormat::ModelScope);
        assert!(!m2.support_img2img);
        assert_eq!(m2.overrides.guidance_scale, Some(3.5));
        // generation-level fallback applies where the model is silent
        assert_eq!(
            registry.get("model1").unwrap().overrides.negative_prompt_add,
            Some(", lowres".to_string())
        );
    }

    #[test]
    fn test_build_styles_with_aliases() {
        let config = PictorConfig::from_toml_str(SAMPLE).unwrap();
        let styles = config.build_styles();
        assert_eq!(
            styles.resolve("动漫").unwrap().id,
            styles.resolve("cartoon").unwrap().id
        );
    }

    #[test]
    fn test_defaults_for_missing_sections() {
        let config = PictorConfig::from_toml_str(
            r#"
[models.only]
base_url = "https://x"
api_key = "k"
model = "m"
"#,
        )
        .unwrap();
        assert!(config.plugin.enabled);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.max_size, 10);
        let registry = config.build_registry().unwrap();
        assert_eq!(registry.default_model().id, "only");
        assert_eq!(registry.default_model().format, ProviderFormat::OpenAi);
        assert!(registry.default_model().support_img2img);
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = PictorConfig::load(&path).unwrap();
        assert_eq!(config.models.len(), 2);
        assert!(matches!(
            PictorConfig::load(&dir.path().join("missing.toml")),
            Err(GenerationError::Config(_))
        ));
    }

    #[test]
    fn test_component_field_aliases() {
        let config = PictorConfig::from_toml_str(
            "[components]\npic_command_model = \"model2\"\nenable_debug_info = true",
        )
        .unwrap();
        assert_eq!(config.components.command_model.as_deref(), Some("model2"));
        assert!(config.components.debug);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            PictorConfig::from_toml_str("[plugin]\nenabeld = true"),
            Err(GenerationError::Config(_))
        ));
    }

    #[test]
    fn test_no_models_is_config_error() {
        let config = PictorConfig::from_toml_str("").unwrap();
        assert!(matches!(
            config.build_registry(),
            Err(GenerationError::Config(_))
        ));
    }
}
