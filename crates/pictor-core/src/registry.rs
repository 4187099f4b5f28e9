//! Model profiles and the runtime-mutable model selectors
//!
//! The set of profiles is loaded once from configuration and read-only
//! afterwards. Two selectors point into that set: the default model and the
//! command-scope model. Both are swapped atomically under one lock so a
//! concurrent reader never observes a half-applied switch.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::format::ProviderFormat;
use crate::request::ProviderOverrides;

/// One configured upstream model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Registry key, unique and stable (e.g. "model1")
    pub id: String,
    /// Human-readable name for listings
    pub display_name: String,
    /// Provider endpoint base URL
    pub base_url: String,
    /// Opaque credential; Doubao/ModelScope strip a "Bearer " prefix before use
    pub api_key: String,
    /// Which wire format this endpoint speaks
    pub format: ProviderFormat,
    /// The provider's own model identifier
    pub model_name: String,
    /// Whether the model accepts a source image
    pub support_img2img: bool,
    /// When true, the configured default size always wins over the request's
    pub fixed_size_enabled: bool,
    /// Size used when the request does not carry a valid one
    pub default_size: String,
    /// Model-scoped tuning knobs
    #[serde(default)]
    pub overrides: ProviderOverrides,
}

impl ModelProfile {
    /// Reject placeholder credentials before any dispatch
    pub fn validate_credentials(&self) -> Result<(), GenerationError> {
        if self.base_url.is_empty() || self.api_key.is_empty() {
            return Err(GenerationError::Config(format!(
                "model '{}' is missing base_url or api_key",
                self.id
            )));
        }
        if self.api_key.contains("YOUR_API_KEY_HERE") || self.api_key.contains("xxxxxxxxxxxxxx") {
            return Err(GenerationError::Config(format!(
                "model '{}' still has a placeholder api_key",
                self.id
            )));
        }
        Ok(())
    }
}

/// Selector indices, swapped as one unit
#[derive(Debug, Clone, Copy)]
struct Selectors {
    default: usize,
    /// None means "follow the default"
    command: Option<usize>,
}

/// Central model registry
///
/// Profiles keep insertion order; `list()` is stable across calls.
pub struct ModelRegistry {
    profiles: Vec<ModelProfile>,
    selectors: RwLock<Selectors>,
}

impl ModelRegistry {
    /// Build a registry from loaded profiles.
    ///
    /// `default_id` is the configured default model; when it is absent or
    /// names an unknown profile, the first loaded profile becomes the
    /// default. At least one profile is required.
    pub fn new(
        profiles: Vec<ModelProfile>,
        default_id: Option<&str>,
    ) -> Result<Self, GenerationError> {
        if profiles.is_empty() {
            return Err(GenerationError::Config(
                "no models configured".to_string(),
            ));
        }
        let default = default_id
            .and_then(|id| profiles.iter().position(|p| p.id == id))
            .unwrap_or(0);
        Ok(Self {
            profiles,
            selectors: RwLock::new(Selectors {
                default,
                command: None,
            }),
        })
    }

    /// All profiles in insertion order
    pub fn list(&self) -> &[ModelProfile] {
        &self.profiles
    }

    /// Look up a profile by registry key
    pub fn get(&self, id: &str) -> Result<&ModelProfile, GenerationError> {
        self.profiles
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| GenerationError::ModelNotFound(id.to_string()))
    }

    /// The configured default model (falls back to the first loaded profile)
    pub fn default_model(&self) -> &ModelProfile {
        let idx = self.selectors.read().default;
        &self.profiles[idx]
    }

    /// The model serving command-scope requests; follows the default until
    /// explicitly switched
    pub fn command_model(&self) -> &ModelProfile {
        let selectors = *self.selectors.read();
        let idx = selectors.command.unwrap_or(selectors.default);
        &self.profiles[idx]
    }

    /// Point the command-scope selector at another profile.
    ///
    /// Visible to every subsequent read as soon as this returns.
    pub fn set_command_model(&self, id: &str) -> Result<(), GenerationError> {
        let idx = self
            .profiles
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| GenerationError::ModelNotFound(id.to_string()))?;
        self.selectors.write().command = Some(idx);
        tracing::info!("command-scope model switched to '{}'", id);
        Ok(())
    }

    /// Clear the command-scope override back to the default
    pub fn reset(&self) {
        self.selectors.write().command = None;
        tracing::info!("command-scope model reset to default");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str) -> ModelProfile {
        ModelProfile {
            id: id.to_string(),
            display_name: id.to_uppercase(),
            base_url: "https://api.example.com/v1".to_string(),
            api_key: "sk-test".to_string(),
            format: ProviderFormat::OpenAi,
            model_name: format!("{}-wire", id),
            support_img2img: true,
            fixed_size_enabled: false,
            default_size: "1024x1024".to_string(),
            overrides: ProviderOverrides::default(),
        }
    }

    fn registry() -> ModelRegistry {
        ModelRegistry::new(
            vec![profile("model1"), profile("model2"), profile("model3")],
            Some("model1"),
        )
        .unwrap()
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let reg = registry();
        let ids: Vec<_> = reg.list().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["model1", "model2", "model3"]);
    }

    #[test]
    fn test_get_unknown_model() {
        assert!(matches!(
            registry().get("model9"),
            Err(GenerationError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_default_falls_back_to_first_profile() {
        let reg = ModelRegistry::new(vec![profile("a"), profile("b")], Some("missing")).unwrap();
        assert_eq!(reg.default_model().id, "a");
        let reg = ModelRegistry::new(vec![profile("a"), profile("b")], None).unwrap();
        assert_eq!(reg.default_model().id, "a");
    }

    #[test]
    fn test_empty_registry_rejected() {
        assert!(matches!(
            ModelRegistry::new(vec![], None),
            Err(GenerationError::Config(_))
        ));
    }

    #[test]
    fn test_command_model_follows_default_until_switched() {
        let reg = registry();
        assert_eq!(reg.command_model().id, "model1");
        reg.set_command_model("model2").unwrap();
        assert_eq!(reg.command_model().id, "model2");
        assert_eq!(reg.default_model().id, "model1");
        reg.reset();
        assert_eq!(reg.command_model().id, "model1");
    }

    #[test]
    fn test_switch_to_unknown_model_rejected() {
        let reg = registry();
        assert!(reg.set_command_model("model9").is_err());
        assert_eq!(reg.command_model().id, "model1");
    }

    #[test]
    fn test_placeholder_key_rejected() {
        let mut p = profile("model1");
        p.api_key = "YOUR_API_KEY_HERE".to_string();
        assert!(matches!(
            p.validate_credentials(),
            Err(GenerationError::Config(_))
        ));
    }
}
