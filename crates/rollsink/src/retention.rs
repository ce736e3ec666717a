//! Retention sweep: best-effort deletion of backup files older than the
//! configured retention window.

use std::path::Path;

use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, Utc};
use tokio::fs;
use tracing::debug;

use crate::config::RotationPolicy;
use crate::naming;

/// Deletes backups of `path` older than the policy's retention window.
///
/// Only entries matching the backup shape `<stem>-<timestamp><ext>` (with a
/// trailing `.gz` when compression is enabled) are considered; anything
/// else, including names whose timestamp fails to parse, is left untouched.
/// Per-entry deletion errors are skipped so one unremovable file never
/// blocks the rest of the sweep.
pub(crate) async fn sweep(path: &Path, policy: &RotationPolicy) {
    let Some(retention) = policy.retention() else {
        return;
    };
    let Some(dir) = path.parent() else {
        return;
    };
    let Ok(cutoff) = ChronoDuration::from_std(retention) else {
        return;
    };

    let (stem, ext) = naming::split_name(path);
    let prefix = format!("{stem}-");
    let suffix = if policy.compress {
        format!("{ext}.gz")
    } else {
        ext
    };
    let active = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Age is measured in the same basis the backup name was rendered in.
    let now: NaiveDateTime = if policy.local_time {
        Local::now().naive_local()
    } else {
        Utc::now().naive_utc()
    };

    let Ok(mut entries) = fs::read_dir(dir).await else {
        return;
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if name == active {
            continue;
        }
        if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
            continue;
        }
        let Some(stamp) = naming::parse_backup_timestamp(name, &prefix, &suffix) else {
            continue;
        };

        if now - stamp > cutoff
            && let Err(e) = fs::remove_file(entry.path()).await
        {
            debug!("failed to remove expired backup {name}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    use tempfile::{TempDir, tempdir};

    fn seed_backup(dir: &TempDir, age_days: i64, suffix: &str) -> PathBuf {
        let stamp = Utc::now().naive_utc() - ChronoDuration::days(age_days);
        let backup = naming::backup_path(&dir.path().join("app.log"), stamp);
        let backup = PathBuf::from(format!("{}{suffix}", backup.display()));
        std::fs::write(&backup, b"old logs").unwrap();
        backup
    }

    #[tokio::test]
    async fn expired_backups_are_deleted_and_recent_ones_kept() {
        let dir = tempdir().unwrap();
        let day_old = seed_backup(&dir, 1, "");
        let week_old = seed_backup(&dir, 7, "");
        let month_old = seed_backup(&dir, 31, "");

        let policy = RotationPolicy {
            retention_days: 10,
            ..RotationPolicy::default()
        };
        sweep(&dir.path().join("app.log"), &policy).await;

        assert!(day_old.exists());
        assert!(week_old.exists());
        assert!(!month_old.exists());
    }

    #[tokio::test]
    async fn compressed_backups_use_the_gz_suffix() {
        let dir = tempdir().unwrap();
        let expired_gz = seed_backup(&dir, 31, ".gz");
        // Wrong shape for a compressing policy; must survive the sweep.
        let expired_plain = seed_backup(&dir, 31, "");

        let policy = RotationPolicy {
            retention_days: 10,
            compress: true,
            ..RotationPolicy::default()
        };
        sweep(&dir.path().join("app.log"), &policy).await;

        assert!(!expired_gz.exists());
        assert!(expired_plain.exists());
    }

    #[tokio::test]
    async fn unparsable_names_and_the_active_file_are_never_deleted() {
        let dir = tempdir().unwrap();
        let active = dir.path().join("app.log");
        let stray = dir.path().join("app-not-a-timestamp.log");
        std::fs::write(&active, b"live").unwrap();
        std::fs::write(&stray, b"stray").unwrap();

        let policy = RotationPolicy {
            retention_days: 1,
            ..RotationPolicy::default()
        };
        sweep(&active, &policy).await;

        assert!(active.exists());
        assert!(stray.exists());
    }

    #[tokio::test]
    async fn zero_retention_keeps_everything() {
        let dir = tempdir().unwrap();
        let ancient = seed_backup(&dir, 365, "");

        sweep(&dir.path().join("app.log"), &RotationPolicy::default()).await;

        assert!(ancient.exists());
    }
}
