//! Self-rotating log sink.
//!
//! [`RotatingLogger`] is a write destination that manages the lifecycle of
//! its own on-disk log files:
//! - rotates the active file when a write would push it past a size
//!   threshold, and on a fixed age interval
//! - optionally gzip-compresses retired backups
//! - deletes backups older than a configured retention window
//! - reports each rotation's final resting path to a user-supplied callback
//!
//! The sink is format-agnostic: it accepts raw byte buffers and appends them
//! verbatim. A single writer process is assumed to own a given log path;
//! concurrent processes targeting the same path produce undefined file
//! contents.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod compress;
mod config;
mod error;
mod lifecycle;
mod naming;
mod retention;

pub use config::{DEFAULT_MAX_PERIOD, DEFAULT_MAX_SIZE_MB, RotationPolicy};
pub use error::{Error, Result};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::File;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::warn;

/// Callback invoked once per completed rotation with the final resting path
/// of the retired file: the `.gz` path when compression succeeded, the plain
/// backup path otherwise.
///
/// Invocations are serialized on a dedicated task, so the callback never
/// needs to be reentrant. A callback that stalls will eventually
/// back-pressure pending rotations' post-processing; it must not block
/// forever.
pub type RotationCallback = Box<dyn FnMut(PathBuf) + Send>;

/// Options for creating a [`RotatingLogger`].
pub struct RotatingLoggerOptions {
    /// Path of the active log file. `None` derives a default under the
    /// platform temp directory from the running program's name.
    pub path: Option<PathBuf>,

    /// Rotation, compression, and retention policy.
    pub policy: RotationPolicy,

    /// Post-rotation callback. `None` installs a no-op.
    pub on_rotate: Option<RotationCallback>,
}

/// Handle and size counter for the currently open file. `file` is `None`
/// while the logger is unopened; at most one live handle ever exists for the
/// active path.
pub(crate) struct LoggerState {
    pub(crate) file: Option<File>,
    pub(crate) size: u64,
}

/// State shared between the writer and the background tasks.
pub(crate) struct Shared {
    pub(crate) path: PathBuf,
    pub(crate) policy: RotationPolicy,
    pub(crate) state: Mutex<LoggerState>,
    pub(crate) notify_tx: mpsc::Sender<PathBuf>,
    pub(crate) tracker: TaskTracker,
}

/// A write destination that rotates, compresses, and prunes its own files.
pub struct RotatingLogger {
    shared: Arc<Shared>,
    shutdown_token: CancellationToken,
}

impl RotatingLogger {
    /// Creates the logger, establishes the log directory, and starts the
    /// background rotation and retention timers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CreateDirectory`] if the log directory cannot be
    /// created.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(
        RotatingLoggerOptions {
            path,
            policy,
            on_rotate,
        }: RotatingLoggerOptions,
    ) -> Result<Self> {
        let path = naming::canonical_path(path);
        let policy = policy.normalized();

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| Error::CreateDirectory {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        // Capacity 1: one finished rotation can queue its notification
        // without waiting on the consumer.
        let (notify_tx, notify_rx) = mpsc::channel(1);

        let logger = Self {
            shared: Arc::new(Shared {
                path,
                policy,
                state: Mutex::new(LoggerState {
                    file: None,
                    size: 0,
                }),
                notify_tx,
                tracker: TaskTracker::new(),
            }),
            shutdown_token: CancellationToken::new(),
        };

        logger.spawn_notifier(notify_rx, on_rotate.unwrap_or_else(|| Box::new(|_| {})));
        logger.spawn_rotation_ticker();
        logger.spawn_retention_sweeper();

        Ok(logger)
    }

    /// Appends `buf` to the active file, rotating first when the write would
    /// push the file past the configured maximum size. The triggering write
    /// always lands in the fresh file, never the old one.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriteTooLarge`] when `buf` itself is larger than the
    /// configured maximum file size (nothing is written and no file is
    /// created), or [`Error::Io`] for an underlying filesystem failure. An
    /// I/O failure leaves the logger unopened; the next write retries from
    /// scratch.
    pub async fn write(&self, buf: &[u8]) -> Result<usize> {
        let max = self.shared.policy.max_size_bytes();
        let requested = buf.len() as u64;
        if requested > max {
            return Err(Error::WriteTooLarge { requested, max });
        }

        let mut state = self.shared.state.lock().await;

        if state.file.is_none() {
            self.shared.ensure_open_locked(&mut state).await?;
        }

        if state.size + requested > max {
            self.shared.rotate_locked(&mut state).await?;
        }

        self.shared.write_locked(&mut state, buf).await
    }

    /// Forces a rotation outside the size and age triggers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on any filesystem failure during the
    /// close/rename/create sequence.
    pub async fn rotate(&self) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        self.shared.rotate_locked(&mut state).await
    }

    /// Stops the background timers and releases the file handle. Idempotent.
    /// In-flight compression tasks are not waited on and their notifications
    /// may be dropped; use [`Self::shutdown`] to drain them.
    ///
    /// # Errors
    ///
    /// Returns the error from flushing the open file, if any.
    pub async fn close(&self) -> Result<()> {
        self.shutdown_token.cancel();
        let mut state = self.shared.state.lock().await;
        self.shared.close_locked(&mut state).await
    }

    /// Closes the logger and then waits for the background tasks, pending
    /// compressions included, to finish.
    ///
    /// # Errors
    ///
    /// Returns the error from flushing the open file, if any.
    pub async fn shutdown(&self) -> Result<()> {
        let result = self.close().await;
        self.shared.tracker.close();
        self.shared.tracker.wait().await;
        result
    }

    /// The resolved path of the active log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    fn spawn_notifier(&self, mut rx: mpsc::Receiver<PathBuf>, mut on_rotate: RotationCallback) {
        let token = self.shutdown_token.clone();

        self.shared.tracker.spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Some(final_path) => on_rotate(final_path),
                        None => break,
                    },
                }
            }
        });
    }

    fn spawn_rotation_ticker(&self) {
        let shared = Arc::clone(&self.shared);
        let token = self.shutdown_token.clone();
        let period = self.shared.policy.period;

        self.shared.tracker.spawn(async move {
            // First tick fires one full period after start, not immediately.
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let mut state = shared.state.lock().await;
                        if let Err(e) = shared.rotate_locked(&mut state).await {
                            warn!("time-based rotation failed: {e}");
                        }
                    }
                }
            }
        });
    }

    fn spawn_retention_sweeper(&self) {
        let Some(retention) = self.shared.policy.retention() else {
            return;
        };
        let shared = Arc::clone(&self.shared);
        let token = self.shutdown_token.clone();

        self.shared.tracker.spawn(async move {
            // Sweep once at startup so backups left over from earlier runs
            // are pruned without waiting a full tick.
            retention::sweep(&shared.path, &shared.policy).await;

            let mut ticker = time::interval_at(time::Instant::now() + retention, retention);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => retention::sweep(&shared.path, &shared.policy).await,
                }
            }
        });
    }
}

impl Drop for RotatingLogger {
    fn drop(&mut self) {
        // Stop the timer and notifier tasks even if the caller never closed
        // the logger explicitly.
        self.shutdown_token.cancel();
    }
}
