//! Engine configuration

/// Default maximum input size: 100 M code points
pub const DEFAULT_MAX_INPUT_SIZE: usize = 100 * 1024 * 1024;

/// Default prefix for worker thread names
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "ambiparse-worker";

/// Configuration options for a [`ParseEngine`](super::parser::ParseEngine)
///
/// Use [`EngineConfig::default()`] for sensible defaults, or customize
/// individual fields with the `with_*` methods.
///
/// # Example
///
/// ```rust
/// use ambiparse::engine::config::EngineConfig;
///
/// let config = EngineConfig::new()
///     .with_num_threads(4)
///     .with_max_input_size(1024 * 1024);
/// assert_eq!(config.num_threads, Some(4));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Worker threads in the pool (`None` = rayon's default)
    pub num_threads: Option<usize>,

    /// Maximum allowed document size in code points (0 = unlimited)
    pub max_input_size: usize,

    /// Worker threads are named `{prefix}-{index}`
    pub thread_name_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads
    pub fn with_num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    /// Set the maximum input size
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// Set the worker thread name prefix
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}
