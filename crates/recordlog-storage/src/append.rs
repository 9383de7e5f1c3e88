//! Append-mode writes with bounded retries

use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Pause between attempts, multiplied by the attempt number
const RETRY_BACKOFF: Duration = Duration::from_millis(5);

/// Errors worth another attempt (locked or briefly unavailable files)
fn is_transient(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
            | ErrorKind::PermissionDenied
    )
}

/// Append `bytes` to the file at `path`, creating it if needed
///
/// A missing parent directory is created once. Transient failures are
/// retried until `max_attempts` writes have been tried. Any other error is
/// returned immediately. A write that fails partway is cut back to the old
/// file length first, so fixed-size blocks never straddle an attempt.
pub(crate) async fn append_bytes(
    path: &Path,
    bytes: &[u8],
    max_attempts: u32,
    sync_on_write: bool,
) -> std::io::Result<()> {
    let max_attempts = max_attempts.max(1);
    let mut created_dir = false;
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match write_once(path, bytes, sync_on_write).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        if err.kind() == ErrorKind::NotFound && !created_dir {
            if let Some(parent) = path.parent() {
                debug!(dir = %parent.display(), "Creating missing directory");
                tokio::fs::create_dir_all(parent).await?;
            }
            created_dir = true;
            continue;
        }

        if is_transient(err.kind()) && attempt < max_attempts {
            warn!(
                path = %path.display(),
                attempt,
                error = %err,
                "Append failed, retrying"
            );
            tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            continue;
        }

        return Err(err);
    }
}

async fn write_once(path: &Path, bytes: &[u8], sync_on_write: bool) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    let start_len = file.metadata().await?.len();

    if let Err(err) = write_and_flush(&mut file, bytes, sync_on_write).await {
        truncate_to(&file, start_len, path).await;
        return Err(err);
    }
    Ok(())
}

async fn write_and_flush(file: &mut File, bytes: &[u8], sync_on_write: bool) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    if sync_on_write {
        file.sync_data().await
    } else {
        file.flush().await
    }
}

/// Cut a partially written tail so the next attempt starts on the old end
async fn truncate_to(file: &File, len: u64, path: &Path) {
    if let Err(err) = file.set_len(len).await {
        warn!(path = %path.display(), len, error = %err, "Failed to cut partial write");
    }
}
