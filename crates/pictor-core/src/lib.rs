//! Pictor core library
//!
//! A generation broker for AI image providers. Normalizes a caller's intent
//! (text-to-image or image-to-image) into a canonical request, maps it onto
//! one of several incompatible provider wire formats, classifies failures,
//! and caches outcomes so identical requests are not regenerated.
//!
//! Supports multiple API formats: OpenAI, Doubao, Gemini, and ModelScope.

pub mod broker;
pub mod cache;
pub mod config;
pub mod constants;
pub mod decode;
pub mod error;
pub mod format;
pub mod registry;
pub mod request;
pub mod styles;
pub mod transport;

pub use broker::{Broker, GenerationIntent};
pub use config::PictorConfig;
pub use decode::ImageResult;
pub use error::GenerationError;
pub use registry::{ModelProfile, ModelRegistry};
pub use request::{Fingerprint, GenerationMode, GenerationRequest, ImageSize};
pub use styles::{StyleEntry, StyleTable};
