//! Application constants and configuration defaults
//!
//! Centralized location for magic numbers and default values

use std::time::Duration;

/// HTTP client configuration
pub mod http {
    use super::*;

    /// Connection timeout for HTTP requests
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Overall timeout for a single generation request - image synthesis can
    /// take minutes on busy upstreams
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

    /// Timeout for one ModelScope task-status poll
    pub const POLL_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Generation configuration
pub mod generation {
    /// Default image size when neither caller nor model specifies one
    pub const DEFAULT_SIZE: &str = "1024x1024";

    /// Prompts longer than this are truncated before canonicalization
    pub const MAX_PROMPT_LEN: usize = 1000;

    /// Smallest accepted image dimension in pixels
    pub const MIN_DIMENSION: u32 = 64;

    /// Largest accepted image dimension in pixels
    pub const MAX_DIMENSION: u32 = 4096;
}

/// Cache configuration
pub mod cache {
    /// Default bound on cached outcomes
    pub const DEFAULT_MAX_SIZE: usize = 10;
}

/// ModelScope async task polling
pub mod polling {
    use super::*;

    /// Delay between task-status polls
    pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

    /// Maximum polls before the task is declared timed out (~2 minutes)
    pub const MAX_ATTEMPTS: usize = 24;
}
