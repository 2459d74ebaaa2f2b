//! Error types for pwsync.
//!
//! Document, sync and configuration failures each get their own enum.
//! Document errors surface through [`SyncError::DocumentError`] when they
//! happen during a run.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Document errors
// ---------------------------------------------------------------------------

/// Errors from loading, navigating, or saving a users.cfg document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The file is not valid UTF-8.
    #[error("document is not valid UTF-8: {0}")]
    Encoding(String),

    /// XML syntax error.
    #[error("malformed XML at line {line}: {detail}")]
    Malformed {
        line: usize,
        detail: String,
    },

    /// The document contains no element at the top level.
    #[error("document has no root element")]
    NoRootElement,

    /// No `<list name="User">` element exists anywhere in the document.
    #[error("document has no <list name=\"User\"> element")]
    MissingUserGroup,

    /// A user item lacks one of the variables the synchronizer relies on.
    #[error("user item #{item} has no <variable name=\"{field}\">")]
    MissingField {
        item: usize,
        field: String,
    },

    /// Generic I/O wrapper.
    #[error("document I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Sync errors
// ---------------------------------------------------------------------------

/// Errors from the password synchronizer.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The source document does not exist.
    #[error("source users.cfg not found at {0}")]
    SourceNotFound(String),

    /// The target document does not exist.
    #[error("target users.cfg not found at {0}")]
    TargetNotFound(String),

    /// The target's user group holds no items.
    #[error("didn't find any users in the target users.cfg, nothing to update")]
    NoTargetUsers,

    /// Some eligible target accounts have no counterpart in the source and
    /// the configured policy is to abort.
    #[error("no source password for {count} account(s): {accounts}")]
    UnresolvedAccounts {
        count: usize,
        accounts: String,
    },

    /// Underlying document error during sync.
    #[error("sync document error: {0}")]
    DocumentError(#[from] DocumentError),

    /// Generic I/O wrapper (path resolution, backups).
    #[error("sync I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
