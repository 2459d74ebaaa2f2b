//! Console rendering of a synchronization run.

use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

use pwsync_core::models::SyncReport;
use pwsync_core::SyncConfig;

use crate::style;

/// Print what is about to happen.
pub fn print_header(config: &SyncConfig) {
    println!();
    println!("{}", style::header("pwsync"));
    println!("{}", "═".repeat(6));
    println!();
    println!("  Source       {}", config.source.display());
    println!("  Target       {}", config.target.display());
    println!(
        "  Skip Admin   {}",
        if config.skip_admin { "yes" } else { "no" }
    );
    if config.dry_run {
        println!("  Mode         {}", style::dim("dry run"));
    }
    println!();
}

/// Print the step-by-step counts of a finished run.
pub fn print_summary(report: &SyncReport) {
    println!(
        "  Found {} users in the target users.cfg.",
        report.target_users
    );
    if report.skipped > 0 {
        println!(
            "  {}",
            style::dim(&format!("Skipped {} admin account(s).", report.skipped))
        );
    }
    println!(
        "  Found new password for {} of {} accounts.",
        report.resolved, report.candidates
    );

    let unresolved = report.unresolved_count();
    if unresolved > 0 {
        println!(
            "  {}",
            style::warn(&format!(
                "{} account(s) not found in the source; passwords left unchanged.",
                unresolved
            ))
        );
        for account in report.unresolved() {
            println!("      {}@{}", account.name, account.domain);
        }
    }

    println!(
        "  Updated {} password(s), {} already current.",
        report.updated, report.unchanged
    );
    if let Some(ref backup) = report.backup_path {
        println!("  Backup       {}", backup.display());
    }

    println!();
    if report.written {
        println!("  {}", style::success("Target users.cfg saved."));
    } else {
        println!(
            "  {}",
            style::warn("Dry run: target users.cfg was not modified.")
        );
    }
    println!();
}

/// Print one table row per target account.
pub fn print_accounts(report: &SyncReport) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["", "Domain", "Name", "Status"]);

    for account in &report.accounts {
        table.add_row(vec![
            Cell::new(style::status_marker(account.status)),
            Cell::new(&account.domain),
            Cell::new(&account.name),
            Cell::new(account.status.to_string()),
        ]);
    }

    println!("{table}");
    println!();
}
