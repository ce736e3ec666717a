//! Active-file lifecycle: open-existing-or-new, the close/rename/create
//! rotation sequence, and the locked write path.

use std::io;

use chrono::{Local, Utc};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{Error, Result};
use crate::{LoggerState, Shared, compress, naming};

impl Shared {
    /// Opens the active path for append, adopting its current size, or
    /// creates it fresh when it does not exist. Failure to reopen an
    /// existing file degrades to create-new rather than propagating;
    /// directory-level stat errors do propagate.
    pub(crate) async fn ensure_open_locked(&self, state: &mut LoggerState) -> Result<()> {
        match fs::metadata(&self.path).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.open_new_locked(state).await,
            Err(e) => Err(Error::Io("failed to stat log file", e)),
            Ok(meta) => match OpenOptions::new().append(true).open(&self.path).await {
                Ok(file) => {
                    state.file = Some(file);
                    state.size = meta.len();
                    Ok(())
                }
                Err(e) => {
                    debug!(
                        "failed to reopen {} for append: {e}; creating a new file",
                        self.path.display()
                    );
                    self.open_new_locked(state).await
                }
            },
        }
    }

    /// The close/rename/create rotation sequence. On failure the logger is
    /// left with no open handle, so the next write retries from scratch.
    pub(crate) async fn rotate_locked(&self, state: &mut LoggerState) -> Result<()> {
        self.close_locked(state).await?;
        self.open_new_locked(state).await
    }

    /// Retires any file occupying the active path under a timestamped backup
    /// name, hands the backup to the post-rotation pipeline, and creates a
    /// fresh file carrying the prior permission mode.
    pub(crate) async fn open_new_locked(&self, state: &mut LoggerState) -> Result<()> {
        let mut prior_permissions = None;

        match fs::metadata(&self.path).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Io("failed to stat log file", e)),
            Ok(meta) => {
                let now = if self.policy.local_time {
                    Local::now().naive_local()
                } else {
                    Utc::now().naive_utc()
                };
                let backup = naming::backup_path(&self.path, now);

                fs::rename(&self.path, &backup)
                    .await
                    .map_err(|e| Error::Io("failed to rename log file", e))?;
                prior_permissions = Some(meta.permissions());

                // Compression and notification run outside the lock; a slow
                // gzip never holds up the next write.
                compress::spawn_finalize(self, backup);
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .await
            .map_err(|e| Error::Io("failed to create log file", e))?;

        if let Some(permissions) = prior_permissions {
            fs::set_permissions(&self.path, permissions)
                .await
                .map_err(|e| Error::Io("failed to set log file permissions", e))?;
        }

        state.file = Some(file);
        state.size = 0;
        Ok(())
    }

    /// Flushes and releases the open handle. A no-op when nothing is open.
    pub(crate) async fn close_locked(&self, state: &mut LoggerState) -> Result<()> {
        let Some(mut file) = state.file.take() else {
            return Ok(());
        };
        file.flush()
            .await
            .map_err(|e| Error::Io("failed to flush log file", e))
    }

    /// Appends `buf` to the open handle, accounting every byte that reached
    /// the file even when the write fails part-way through. A write or flush
    /// failure drops the handle so the next write reopens from scratch.
    pub(crate) async fn write_locked(&self, state: &mut LoggerState, buf: &[u8]) -> Result<usize> {
        let Some(file) = state.file.as_mut() else {
            return Err(Error::Io(
                "log file is not open",
                io::Error::from(io::ErrorKind::NotFound),
            ));
        };

        let mut written = 0;
        while written < buf.len() {
            match file.write(&buf[written..]).await {
                Ok(0) => {
                    state.size += written as u64;
                    state.file = None;
                    return Err(Error::Io(
                        "failed to write log file",
                        io::Error::from(io::ErrorKind::WriteZero),
                    ));
                }
                Ok(n) => written += n,
                Err(e) => {
                    state.size += written as u64;
                    state.file = None;
                    return Err(Error::Io("failed to write log file", e));
                }
            }
        }

        // tokio files buffer internally; flush so the on-disk size always
        // matches the size counter.
        if let Err(e) = file.flush().await {
            state.size += written as u64;
            state.file = None;
            return Err(Error::Io("failed to flush log file", e));
        }

        state.size += written as u64;
        Ok(written)
    }
}
