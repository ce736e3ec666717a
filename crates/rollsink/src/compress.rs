//! Post-rotation pipeline: gzip a retired backup and report whichever path
//! survives to the notification channel.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::warn;

use crate::Shared;

/// Spawns the tracked post-rotation task for `backup`: compress when the
/// policy asks for it, then push the surviving path onto the notification
/// channel. Never blocks the caller; compression failures are contained
/// here and fall back to reporting the uncompressed path.
pub(crate) fn spawn_finalize(shared: &Shared, backup: PathBuf) {
    let compress = shared.policy.compress;
    let level = shared.policy.compression_level;
    let tx = shared.notify_tx.clone();

    shared.tracker.spawn(async move {
        let final_path = if compress {
            finalize(backup, level).await
        } else {
            backup
        };

        // The receiver is gone once the logger has shut down; nothing left
        // to notify.
        let _ = tx.send(final_path).await;
    });
}

/// Compresses `backup` to `<backup>.gz`, returning whichever path now holds
/// the data: the `.gz` on success, the untouched original on any failure.
async fn finalize(backup: PathBuf, level: u32) -> PathBuf {
    let destination = gz_path(&backup);

    let source = backup.clone();
    let dest = destination.clone();
    let outcome = tokio::task::spawn_blocking(move || compress_file(&source, &dest, level)).await;

    match outcome {
        Ok(Ok(())) => destination,
        Ok(Err(e)) => {
            warn!("failed to compress {}: {e}", backup.display());
            backup
        }
        Err(e) => {
            warn!("compression task for {} panicked: {e}", backup.display());
            backup
        }
    }
}

/// `app-<timestamp>.log` becomes `app-<timestamp>.log.gz`.
fn gz_path(backup: &Path) -> PathBuf {
    let mut name = backup.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

/// Streams `source` through gzip into `destination`. Any failure removes the
/// partial destination so the uncompressed backup remains the sole copy.
fn compress_file(source: &Path, destination: &Path, level: u32) -> io::Result<()> {
    match try_compress(source, destination, level) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(destination);
            Err(e)
        }
    }
}

/// Writes the `.gz` with the source's permission mode, then deletes the
/// uncompressed source only once the compressed copy is fully on disk.
fn try_compress(source: &Path, destination: &Path, level: u32) -> io::Result<()> {
    let meta = fs::metadata(source)?;
    let input = File::open(source)?;

    let output = File::create(destination)?;
    output.set_permissions(meta.permissions())?;

    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::new(level));
    io::copy(&mut BufReader::new(input), &mut encoder)?;

    let output = encoder
        .finish()?
        .into_inner()
        .map_err(io::IntoInnerError::into_error)?;
    output.sync_all()?;

    fs::remove_file(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Read;

    use flate2::read::GzDecoder;
    use tempfile::tempdir;

    #[test]
    fn compressed_file_round_trips_and_source_is_removed() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("app-2024-01-02T03-04-05.678.log");
        let destination = gz_path(&source);
        fs::write(&source, b"the quick brown fox").unwrap();

        compress_file(&source, &destination, 9).unwrap();

        assert!(!source.exists());
        let mut decoder = GzDecoder::new(File::open(&destination).unwrap());
        let mut contents = Vec::new();
        decoder.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"the quick brown fox");
    }

    #[test]
    fn missing_source_leaves_no_partial_destination() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("app-2024-01-02T03-04-05.678.log");
        let destination = gz_path(&source);

        assert!(compress_file(&source, &destination, 9).is_err());
        assert!(!destination.exists());
    }

    #[test]
    fn gz_path_appends_suffix() {
        assert_eq!(
            gz_path(Path::new("/logs/app-2024-01-02T03-04-05.678.log")),
            PathBuf::from("/logs/app-2024-01-02T03-04-05.678.log.gz")
        );
    }
}
