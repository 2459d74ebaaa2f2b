//! Shared data models used across the pwsync crates.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Composite identity of an account: exact, case-sensitive (domain, name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountKey {
    pub domain: String,
    pub name: String,
}

impl AccountKey {
    pub fn new(domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.domain)
    }
}

/// One account entry read from a users.cfg document.
///
/// The password is opaque (usually a `D3S:` or `SHA:` hash) and never
/// interpreted.
#[derive(Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub domain: String,
    pub name: String,
    pub password: String,
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("domain", &self.domain)
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Sync report
// ---------------------------------------------------------------------------

/// What happened to a single target account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Password replaced with the source value.
    Updated,
    /// Source password already equal to the target's.
    Unchanged,
    /// Excluded by the admin-skip rule.
    Skipped,
    /// No source account with the same (domain, name).
    Unresolved,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Updated => write!(f, "updated"),
            AccountStatus::Unchanged => write!(f, "unchanged"),
            AccountStatus::Skipped => write!(f, "skipped"),
            AccountStatus::Unresolved => write!(f, "unresolved"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOutcome {
    pub domain: String,
    pub name: String,
    pub status: AccountStatus,
}

impl AccountOutcome {
    pub fn new(key: AccountKey, status: AccountStatus) -> Self {
        Self {
            domain: key.domain,
            name: key.name,
            status,
        }
    }
}

/// Summary of one synchronization run. Never contains passwords.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// User items found in the target.
    pub target_users: usize,
    /// Items excluded by the admin-skip rule.
    pub skipped: usize,
    /// Items eligible for an update.
    pub candidates: usize,
    /// Candidates with a matching source account.
    pub resolved: usize,
    /// Passwords actually rewritten.
    pub updated: usize,
    /// Resolved candidates whose password was already current.
    pub unchanged: usize,
    /// Per-item outcome, in target document order.
    pub accounts: Vec<AccountOutcome>,
    /// Whether the target file was written.
    pub written: bool,
    /// Copy of the original target, when backups are enabled.
    pub backup_path: Option<PathBuf>,
}

impl SyncReport {
    pub fn unresolved(&self) -> impl Iterator<Item = &AccountOutcome> {
        self.accounts
            .iter()
            .filter(|a| a.status == AccountStatus::Unresolved)
    }

    pub fn unresolved_count(&self) -> usize {
        self.unresolved().count()
    }
}
