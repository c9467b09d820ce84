//! Storage location and cleanup policy for snapshots.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where snapshots are written and what happens to them afterwards.
///
/// Deserializes with defaults for every missing field, so it can be embedded
/// in an application's own configuration file.
///
/// # Example
///
/// ```rust
/// use resumable::checkpoint::StoreConfig;
///
/// let config = StoreConfig::new("/var/lib/myapp/tx")
///     .with_prefix("import")
///     .with_cleanup(false);
///
/// assert_eq!(config.prefix, "import");
/// assert!(!config.cleanup);
/// assert!(config.verbose_errors);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding snapshot files. Must live on one filesystem so the
    /// final rename is atomic.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// File name prefix, followed by a timestamp and a random suffix
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Delete the snapshot once a transaction finishes successfully
    #[serde(default = "default_true")]
    pub cleanup: bool,

    /// Include the snapshot path in step failure messages
    #[serde(default = "default_true")]
    pub verbose_errors: bool,
}

fn default_directory() -> PathBuf {
    std::env::temp_dir()
}

fn default_prefix() -> String {
    "transaction".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            prefix: default_prefix(),
            cleanup: true,
            verbose_errors: true,
        }
    }
}

impl StoreConfig {
    /// Defaults, rooted at `directory`.
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn with_verbose_errors(mut self, verbose: bool) -> Self {
        self.verbose_errors = verbose;
        self
    }
}
