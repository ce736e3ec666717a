//! Backup-file naming: the canonical active path, timestamped backup names,
//! and the inverse parse used by the retention sweep.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

/// Timestamp layout embedded into backup file names. Millisecond resolution
/// keeps names collision-free under rapid rotation.
pub(crate) const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";

/// Resolves the active log path: the configured path verbatim, or a default
/// under the platform temp directory named after the running program.
pub(crate) fn canonical_path(configured: Option<PathBuf>) -> PathBuf {
    configured.unwrap_or_else(|| {
        let stem = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "rollsink".to_owned());

        std::env::temp_dir()
            .join("rollsink")
            .join(format!("{stem}.log"))
    })
}

/// Returns the backup path for `path` at time `at`: the timestamp is inserted
/// immediately before the extension, e.g. `app.log` becomes
/// `app-2024-01-02T03-04-05.678.log`. The caller picks UTC or local
/// wall-clock time for `at`.
pub(crate) fn backup_path(path: &Path, at: NaiveDateTime) -> PathBuf {
    let (stem, ext) = split_name(path);
    let name = format!("{stem}-{}{ext}", at.format(BACKUP_TIME_FORMAT));
    path.with_file_name(name)
}

/// Splits the file name of `path` into stem and extension, the extension
/// keeping its leading dot.
pub(crate) fn split_name(path: &Path) -> (String, String) {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match file_name.rfind('.') {
        Some(idx) if idx > 0 => (file_name[..idx].to_owned(), file_name[idx..].to_owned()),
        _ => (file_name, String::new()),
    }
}

/// Parses the timestamp embedded in a backup file name. `prefix` is the
/// active file's stem plus the joining `-`; `suffix` is the expected tail
/// (the extension, plus `.gz` for compressed backups). Returns `None` for
/// any name that does not match the backup shape exactly.
pub(crate) fn parse_backup_timestamp(
    file_name: &str,
    prefix: &str,
    suffix: &str,
) -> Option<NaiveDateTime> {
    let rest = file_name.strip_prefix(prefix)?;
    let stamp = rest.strip_suffix(suffix)?;
    NaiveDateTime::parse_from_str(stamp, BACKUP_TIME_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveDate;

    fn fixed_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_milli_opt(3, 4, 5, 678)
            .unwrap()
    }

    #[test]
    fn backup_path_inserts_timestamp_before_extension() {
        let backup = backup_path(Path::new("/var/log/app.log"), fixed_time());
        assert_eq!(
            backup,
            PathBuf::from("/var/log/app-2024-01-02T03-04-05.678.log")
        );
    }

    #[test]
    fn backup_path_without_extension_appends_timestamp() {
        let backup = backup_path(Path::new("/var/log/app"), fixed_time());
        assert_eq!(backup, PathBuf::from("/var/log/app-2024-01-02T03-04-05.678"));
    }

    #[test]
    fn split_name_handles_extensions() {
        assert_eq!(
            split_name(Path::new("app.log")),
            ("app".to_owned(), ".log".to_owned())
        );
        assert_eq!(split_name(Path::new("app")), ("app".to_owned(), String::new()));
    }

    #[test]
    fn backup_timestamp_round_trips() {
        let stamp = parse_backup_timestamp("app-2024-01-02T03-04-05.678.log", "app-", ".log");
        assert_eq!(stamp, Some(fixed_time()));

        let stamp = parse_backup_timestamp("app-2024-01-02T03-04-05.678.log.gz", "app-", ".log.gz");
        assert_eq!(stamp, Some(fixed_time()));
    }

    #[test]
    fn malformed_names_do_not_parse() {
        assert_eq!(parse_backup_timestamp("app.log", "app-", ".log"), None);
        assert_eq!(
            parse_backup_timestamp("app-notatimestamp.log", "app-", ".log"),
            None
        );
        assert_eq!(
            parse_backup_timestamp("other-2024-01-02T03-04-05.678.log", "app-", ".log"),
            None
        );
        // Uncompressed shape must not match when the compressed suffix is
        // expected.
        assert_eq!(
            parse_backup_timestamp("app-2024-01-02T03-04-05.678.log", "app-", ".log.gz"),
            None
        );
    }

    #[test]
    fn canonical_path_prefers_configured_path() {
        let configured = PathBuf::from("/var/log/app.log");
        assert_eq!(canonical_path(Some(configured.clone())), configured);
    }

    #[test]
    fn canonical_path_defaults_under_temp_dir() {
        let path = canonical_path(None);
        assert!(path.starts_with(std::env::temp_dir().join("rollsink")));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("log"));
    }
}
