//! TOML-based configuration for a synchronization run.
//!
//! Every setting can also be given on the command line; the CLI loads an
//! optional file first and then overrides individual fields.
//!
//! ```toml
//! source = "old-server/users.cfg"
//! target = "/opt/kerio/mailserver/users.cfg"
//! skip_admin = true
//! on_unresolved = "keep"
//! backup = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;
use crate::sync_engine::SyncOptions;

/// What to do with a target account that has no counterpart in the source.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedPolicy {
    /// Leave the target password as it is and report the account.
    #[default]
    Keep,
    /// Fail the whole run before anything is written.
    Abort,
}

/// Settings for one synchronization run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    /// Document the passwords are read from.
    #[serde(default)]
    pub source: PathBuf,

    /// Document whose passwords are overwritten.
    #[serde(default)]
    pub target: PathBuf,

    /// Leave the `Admin` account alone (default true).
    #[serde(default = "default_true")]
    pub skip_admin: bool,

    /// Handling of target accounts missing from the source.
    #[serde(default)]
    pub on_unresolved: UnresolvedPolicy,

    /// Copy the target to a timestamped `.bak` file before overwriting it.
    #[serde(default)]
    pub backup: bool,

    /// Compute and report the changes without writing anything.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_true() -> bool {
    true
}

impl SyncConfig {
    /// Configuration with default options for the given pair of documents.
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            skip_admin: true,
            on_unresolved: UnresolvedPolicy::default(),
            backup: false,
            dry_run: false,
        }
    }

    /// Load a [`SyncConfig`] from a TOML file.
    ///
    /// Relative `source` / `target` paths are taken relative to the directory
    /// containing the file. The result is not validated; call
    /// [`validate`](Self::validate) once all overrides are applied.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let mut config: SyncConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(base) = path.parent() {
            config.source = rebase(base, &config.source);
            config.target = rebase(base, &config.target);
        }

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that both documents are named.
    ///
    /// Source and target may be the same file; every password then resolves
    /// to itself and the run rewrites identical content.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "source".into(),
                detail: "source document path must not be empty".into(),
            });
        }
        if self.target.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "target".into(),
                detail: "target document path must not be empty".into(),
            });
        }
        Ok(())
    }

    /// The subset of settings that affects the in-memory merge.
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            skip_admin: self.skip_admin,
            on_unresolved: self.on_unresolved,
        }
    }
}

fn rebase(base: &Path, path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() || path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
