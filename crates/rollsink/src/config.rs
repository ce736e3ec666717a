//! Rotation policy and its defaults.

use std::time::Duration;

/// Default rotation threshold in megabytes.
pub const DEFAULT_MAX_SIZE_MB: u64 = 10;

/// Default maximum age of the active file before a forced rotation.
pub const DEFAULT_MAX_PERIOD: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const MEGABYTE: u64 = 1024 * 1024;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Policy governing when the active file rotates, how long backups are kept,
/// and whether retired files are compressed. Immutable once the logger is
/// constructed.
#[derive(Clone, Debug)]
pub struct RotationPolicy {
    /// Maximum size in megabytes of the active file before it is rotated.
    /// `0` uses [`DEFAULT_MAX_SIZE_MB`].
    pub size: u64,

    /// Maximum age of the active file before it is rotated. A zero duration
    /// uses [`DEFAULT_MAX_PERIOD`].
    pub period: Duration,

    /// Days to retain backup files; `0` keeps them forever.
    pub retention_days: u64,

    /// Whether rotated backups are gzip-compressed.
    pub compress: bool,

    /// Gzip level: `0` = none, `1` = fastest, `9` = best. Any other value
    /// silently normalizes to `0`.
    pub compression_level: u32,

    /// Render backup-name timestamps (and measure retention age) in local
    /// wall-clock time instead of UTC.
    pub local_time: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            size: DEFAULT_MAX_SIZE_MB,
            period: DEFAULT_MAX_PERIOD,
            retention_days: 0,
            compress: false,
            compression_level: 0,
            local_time: false,
        }
    }
}

impl RotationPolicy {
    /// Applies defaults for zero-valued fields and clamps the compression
    /// level to the supported set.
    #[must_use]
    pub(crate) fn normalized(mut self) -> Self {
        if self.size == 0 {
            self.size = DEFAULT_MAX_SIZE_MB;
        }
        if self.period.is_zero() {
            self.period = DEFAULT_MAX_PERIOD;
        }
        if !matches!(self.compression_level, 0 | 1 | 9) {
            self.compression_level = 0;
        }
        self
    }

    /// Rotation threshold in bytes.
    pub(crate) const fn max_size_bytes(&self) -> u64 {
        self.size * MEGABYTE
    }

    /// Retention window, or `None` when backups are kept forever.
    pub(crate) const fn retention(&self) -> Option<Duration> {
        if self.retention_days == 0 {
            None
        } else {
            Some(Duration::from_secs(self.retention_days * SECONDS_PER_DAY))
        }
    }
}
