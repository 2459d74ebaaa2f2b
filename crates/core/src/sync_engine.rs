//! Password synchronizer.
//!
//! Copies the `Password` of every eligible target account from the source
//! account with the same (domain, name). [`sync_documents`] is the pure
//! in-memory merge; [`PasswordSync::run`] wraps it with path checks, an
//! optional backup and the final write.

use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info, warn};

use crate::config::{SyncConfig, UnresolvedPolicy};
use crate::document::Document;
use crate::errors::SyncError;
use crate::models::{AccountKey, AccountOutcome, AccountStatus, SyncReport};
use crate::users::{self, UserIndex, ADMIN_ACCOUNT};

/// Options that shape the merge itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub skip_admin: bool,
    pub on_unresolved: UnresolvedPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            skip_admin: true,
            on_unresolved: UnresolvedPolicy::default(),
        }
    }
}

/// Whether an account named `name` may receive a new password.
pub fn is_eligible(name: &str, options: &SyncOptions) -> bool {
    !(options.skip_admin && name == ADMIN_ACCOUNT)
}

/// Copy passwords from `source` into `target` in memory.
///
/// `target` is only modified once every lookup has succeeded, so on error it
/// is left exactly as it was.
pub fn sync_documents(
    source: &Document,
    target: &mut Document,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError> {
    let mut report = SyncReport::default();

    // Candidates: eligible target accounts.
    let mut candidates: Vec<AccountKey> = Vec::new();
    {
        let items = users::user_items(target)?;
        if items.is_empty() {
            return Err(SyncError::NoTargetUsers);
        }
        report.target_users = items.len();
        info!(count = items.len(), "found users in target");

        for (index, item) in items.into_iter().enumerate() {
            let key = users::account_key(item, index)?;
            if !is_eligible(&key.name, options) {
                debug!(account = %key, "skipping admin account");
                report.skipped += 1;
                continue;
            }
            candidates.push(key);
        }
    }
    report.candidates = candidates.len();

    // Resolve each candidate against the source.
    let index = UserIndex::build(source)?;
    info!(accounts = index.len(), "indexed source users");

    let mut resolved: HashMap<&AccountKey, Option<String>> =
        HashMap::with_capacity(candidates.len());
    for key in &candidates {
        let password = index.resolve(key)?.map(|record| record.password);
        if password.is_some() {
            report.resolved += 1;
        }
        resolved.insert(key, password);
    }
    info!(
        resolved = report.resolved,
        candidates = report.candidates,
        "found new password for accounts"
    );

    let mut unresolved: Vec<&AccountKey> = Vec::new();
    let mut seen: HashSet<&AccountKey> = HashSet::new();
    for key in &candidates {
        if matches!(resolved.get(key), Some(None)) && seen.insert(key) {
            unresolved.push(key);
        }
    }
    for key in &unresolved {
        warn!(account = %key, "no matching account in source, password left unchanged");
    }
    if !unresolved.is_empty() && options.on_unresolved == UnresolvedPolicy::Abort {
        return Err(SyncError::UnresolvedAccounts {
            count: unresolved.len(),
            accounts: unresolved
                .iter()
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        });
    }

    // Apply, walking the target items in the same order.
    for (index, item) in users::user_items_mut(target)?.into_iter().enumerate() {
        let key = users::account_key(item, index)?;
        if !is_eligible(&key.name, options) {
            report
                .accounts
                .push(AccountOutcome::new(key, AccountStatus::Skipped));
            continue;
        }
        let status = match resolved.get(&key) {
            Some(Some(password)) => {
                if users::set_password(item, index, password)? {
                    report.updated += 1;
                    debug!(account = %key, "password updated");
                    AccountStatus::Updated
                } else {
                    report.unchanged += 1;
                    AccountStatus::Unchanged
                }
            }
            _ => AccountStatus::Unresolved,
        };
        report.accounts.push(AccountOutcome::new(key, status));
    }

    info!(
        updated = report.updated,
        unchanged = report.unchanged,
        unresolved = unresolved.len(),
        "target passwords updated"
    );
    Ok(report)
}

/// File-level synchronizer: validates paths, loads both documents, merges,
/// and writes the target back.
pub struct PasswordSync {
    config: SyncConfig,
}

impl PasswordSync {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one synchronization.
    ///
    /// The target file is written at most once, at the very end, and only
    /// when every earlier step succeeded. The source file is never written.
    pub fn run(&self) -> Result<SyncReport, SyncError> {
        let source = absolute(&self.config.source)?;
        if !source.is_file() {
            return Err(SyncError::SourceNotFound(source.display().to_string()));
        }
        let target = absolute(&self.config.target)?;
        if !target.is_file() {
            return Err(SyncError::TargetNotFound(target.display().to_string()));
        }
        info!(
            source = %source.display(),
            target = %target.display(),
            skip_admin = self.config.skip_admin,
            "starting password sync"
        );

        let mut target_doc = Document::load(&target)?;
        if users::user_items(&target_doc)?.is_empty() {
            return Err(SyncError::NoTargetUsers);
        }
        let source_doc = Document::load(&source)?;

        let mut report = sync_documents(&source_doc, &mut target_doc, &self.config.options())?;

        if self.config.dry_run {
            info!("dry run, target left untouched");
            return Ok(report);
        }

        if self.config.backup {
            report.backup_path = Some(backup(&target)?);
        }
        target_doc.save(&target)?;
        report.written = true;

        info!(path = %target.display(), "target users.cfg written");
        Ok(report)
    }
}

fn absolute(path: &Path) -> Result<PathBuf, SyncError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Copy `path` to `<path>.<timestamp>.bak` beside it.
///
/// An existing backup is never replaced: when the name is taken, a `-N`
/// counter is appended to the timestamp.
fn backup(path: &Path) -> Result<PathBuf, SyncError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "users.cfg".to_string());
    let stamp = Local::now().format("%Y%m%d%H%M%S").to_string();
    let mut original = File::open(path)?;

    let mut attempt = 0u32;
    loop {
        let name = match attempt {
            0 => format!("{}.{}.bak", file_name, stamp),
            n => format!("{}.{}-{}.bak", file_name, stamp, n),
        };
        let backup_path = path.with_file_name(name);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&backup_path)
        {
            Ok(mut file) => {
                io::copy(&mut original, &mut file)?;
                file.sync_all()?;
                info!(path = %backup_path.display(), "backup written");
                return Ok(backup_path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(path = %backup_path.display(), "backup name taken");
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_cfg(users: &[(&str, &str, &str)]) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<config>\n  <list name=\"User\">\n",
        );
        for (domain, name, password) in users {
            xml.push_str(&format!(
                "    <listitem>\n      <variable name=\"Domain\">{}</variable>\n      \
<variable name=\"Name\">{}</variable>\n      <variable name=\"Password\">{}</variable>\n      \
<variable name=\"FullName\">{} Example</variable>\n    </listitem>\n",
                domain, name, password, name
            ));
        }
        xml.push_str("  </list>\n</config>\n");
        xml
    }

    fn doc(users: &[(&str, &str, &str)]) -> Document {
        Document::parse(&users_cfg(users)).unwrap()
    }

    fn passwords(doc: &Document) -> Vec<(String, String)> {
        users::user_items(doc)
            .unwrap()
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let r = users::read_record(item, i).unwrap();
                (r.name, r.password)
            })
            .collect()
    }

    #[test]
    fn test_admin_skipped_by_default() {
        let source = doc(&[("acme", "alice", "new1"), ("acme", "Admin", "newadmin")]);
        let mut target = doc(&[("acme", "alice", "old1"), ("acme", "Admin", "adminpw")]);

        let report = sync_documents(&source, &mut target, &SyncOptions::default()).unwrap();

        assert_eq!(report.resolved, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(
            passwords(&target),
            vec![
                ("alice".to_string(), "new1".to_string()),
                ("Admin".to_string(), "adminpw".to_string()),
            ]
        );
        assert_eq!(report.accounts[1].status, AccountStatus::Skipped);
    }

    #[test]
    fn test_admin_updated_when_not_skipped() {
        let source = doc(&[("acme", "alice", "new1"), ("acme", "Admin", "newadmin")]);
        let mut target = doc(&[("acme", "alice", "old1"), ("acme", "Admin", "adminpw")]);
        let options = SyncOptions {
            skip_admin: false,
            ..Default::default()
        };

        let report = sync_documents(&source, &mut target, &options).unwrap();

        assert_eq!(report.resolved, 2);
        assert_eq!(passwords(&target)[1].1, "newadmin");
    }

    #[test]
    fn test_admin_match_is_case_sensitive() {
        let source = doc(&[("acme", "admin", "new")]);
        let mut target = doc(&[("acme", "admin", "old")]);
        let report = sync_documents(&source, &mut target, &SyncOptions::default()).unwrap();
        assert_eq!(report.skipped, 0);
        assert_eq!(report.updated, 1);
    }

    #[test]
    fn test_unresolved_kept_by_default() {
        let source = doc(&[("other.test", "alice", "new1")]);
        let mut target = doc(&[("acme", "alice", "old1")]);
        let before = target.to_xml_string();

        let report = sync_documents(&source, &mut target, &SyncOptions::default()).unwrap();

        assert_eq!(report.resolved, 0);
        assert_eq!(report.updated, 0);
        assert_eq!(report.unresolved_count(), 1);
        assert_eq!(target.to_xml_string(), before);
    }

    #[test]
    fn test_unresolved_abort_leaves_target_untouched() {
        let source = doc(&[("acme", "alice", "new1")]);
        let mut target = doc(&[("acme", "alice", "old1"), ("acme", "bob", "old2")]);
        let before = target.clone();
        let options = SyncOptions {
            on_unresolved: UnresolvedPolicy::Abort,
            ..Default::default()
        };

        let err = sync_documents(&source, &mut target, &options).unwrap_err();

        match err {
            SyncError::UnresolvedAccounts { count, accounts } => {
                assert_eq!(count, 1);
                assert_eq!(accounts, "bob@acme");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(target, before);
    }

    #[test]
    fn test_empty_target_group() {
        let source = doc(&[("acme", "alice", "new1")]);
        let mut target = doc(&[]);
        let err = sync_documents(&source, &mut target, &SyncOptions::default()).unwrap_err();
        assert!(matches!(err, SyncError::NoTargetUsers));
    }

    #[test]
    fn test_only_password_text_changes() {
        let source = doc(&[("acme", "alice", "n&amp;w&lt;1&gt;")]);
        let mut target = doc(&[("acme", "alice", "old1")]);
        let expected = users_cfg(&[("acme", "alice", "n&amp;w&lt;1&gt;")]);

        sync_documents(&source, &mut target, &SyncOptions::default()).unwrap();

        assert_eq!(target.to_xml_string(), expected);
    }

    #[test]
    fn test_duplicate_target_entries_all_updated() {
        let source = doc(&[("acme", "alice", "first"), ("acme", "alice", "second")]);
        let mut target = doc(&[("acme", "alice", "a"), ("acme", "alice", "b")]);

        let report = sync_documents(&source, &mut target, &SyncOptions::default()).unwrap();

        assert_eq!(report.candidates, 2);
        assert_eq!(report.resolved, 2);
        assert!(passwords(&target).iter().all(|(_, p)| p == "first"));
    }

    #[test]
    fn test_unchanged_passwords_counted() {
        let source = doc(&[("acme", "alice", "same"), ("acme", "bob", "new")]);
        let mut target = doc(&[("acme", "alice", "same"), ("acme", "bob", "old")]);
        let report = sync_documents(&source, &mut target, &SyncOptions::default()).unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.accounts[0].status, AccountStatus::Unchanged);
    }

    #[test]
    fn test_source_without_user_group_is_an_error() {
        let source = Document::parse("<config/>").unwrap();
        let mut target = doc(&[("acme", "alice", "old1")]);
        let err = sync_documents(&source, &mut target, &SyncOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            SyncError::DocumentError(crate::errors::DocumentError::MissingUserGroup)
        ));
    }

    #[test]
    fn test_run_missing_source_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target.cfg");
        std::fs::write(&target, users_cfg(&[("acme", "alice", "old1")])).unwrap();

        let sync = PasswordSync::new(SyncConfig::new(dir.path().join("missing.cfg"), &target));
        match sync.run().unwrap_err() {
            SyncError::SourceNotFound(path) => assert!(path.ends_with("missing.cfg")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_run_missing_target_reports_target_path() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.cfg");
        std::fs::write(&source, users_cfg(&[("acme", "alice", "new1")])).unwrap();

        let sync = PasswordSync::new(SyncConfig::new(&source, dir.path().join("nope.cfg")));
        match sync.run().unwrap_err() {
            SyncError::TargetNotFound(path) => assert!(path.ends_with("nope.cfg")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_backup_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.cfg");
        std::fs::write(&path, "x").unwrap();

        let backup_path = backup(&path).unwrap();
        let name = backup_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("users.cfg."));
        assert!(name.ends_with(".bak"));
        assert_eq!(std::fs::read_to_string(&backup_path).unwrap(), "x");
    }

    #[test]
    fn test_backup_never_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.cfg");
        std::fs::write(&path, "first").unwrap();
        let first = backup(&path).unwrap();

        // Occupy the next names a same-second backup could pick.
        let stamp = first
            .file_name()
            .unwrap()
            .to_string_lossy()
            .trim_start_matches("users.cfg.")
            .trim_end_matches(".bak")
            .to_string();
        std::fs::write(dir.path().join(format!("users.cfg.{}-1.bak", stamp)), "taken").unwrap();

        std::fs::write(&path, "second").unwrap();
        let second = backup(&path).unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "first");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "second");
    }

    #[test]
    fn test_unresolved_duplicates_reported_once() {
        let source = doc(&[("acme", "alice", "new1")]);
        let mut target = doc(&[
            ("acme", "bob", "old1"),
            ("acme", "alice", "old2"),
            ("acme", "bob", "old3"),
        ]);
        let options = SyncOptions {
            on_unresolved: UnresolvedPolicy::Abort,
            ..Default::default()
        };

        match sync_documents(&source, &mut target, &options).unwrap_err() {
            SyncError::UnresolvedAccounts { count, accounts } => {
                assert_eq!(count, 1);
                assert_eq!(accounts, "bob@acme");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_is_eligible() {
        let skip = SyncOptions::default();
        let keep = SyncOptions {
            skip_admin: false,
            ..Default::default()
        };
        assert!(!is_eligible("Admin", &skip));
        assert!(is_eligible("Admin", &keep));
        assert!(is_eligible("alice", &skip));
    }
}
