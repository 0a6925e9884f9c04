use super::error::SaveError;
use super::format::{decompress_and_deserialize, serialize_and_compress, GridSave};

use std::fs::{rename, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Write a snapshot to `path`.
///
/// Atomic: the payload goes to a temp file first, is synced, then renamed
/// over the target, so a crash mid-write leaves either the old snapshot or
/// the new one, never a torn file.
pub fn save_to_path(path: &Path, save: &GridSave) -> Result<(), SaveError> {
    // Ensure save directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let data = serialize_and_compress(save)?;

    let temp_path = path.with_extension("tmp");

    {
        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.flush()?;

        // sync_all ensures data is written to disk (portable fsync)
        file.sync_all()?;
    }

    rename(&temp_path, path)?;

    log::debug!("Saved {} bytes to {:?}", data.len(), path);
    Ok(())
}

/// Read a snapshot from `path`.
pub fn load_from_path(path: &Path) -> Result<GridSave, SaveError> {
    if !path.exists() {
        return Err(SaveError::FileNotFound { path: path.display().to_string() });
    }

    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    let save = decompress_and_deserialize(&data)?;

    log::debug!("Loaded {} bytes from {:?}", data.len(), path);
    Ok(save)
}

enum WriterCommand {
    /// Replace the pending snapshot and restart the debounce window.
    Queue(GridSave),
    /// Write the pending snapshot now, without waiting out the window.
    Flush,
}

/// Debounced background snapshot writer.
///
/// Capture latency must be independent of disk speed, so writes happen on a
/// dedicated thread. Queued snapshots collapse: each `queue` call replaces
/// the pending payload and restarts the debounce window (trailing edge),
/// and only the latest state reaches disk once activity pauses. Dropping
/// the scheduler flushes whatever is still pending and joins the thread, so
/// graceful shutdown never loses the last capture.
pub struct SaveScheduler {
    tx: Option<Sender<WriterCommand>>,
    handle: Option<JoinHandle<()>>,
}

impl SaveScheduler {
    pub fn spawn(path: PathBuf, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::channel();

        let handle = std::thread::Builder::new()
            .name("gridlock-save".to_string())
            .spawn(move || writer_loop(rx, &path, debounce))
            .expect("failed to spawn snapshot writer thread");

        Self { tx: Some(tx), handle: Some(handle) }
    }

    /// Schedule a durable write of `save`. Returns immediately.
    pub fn queue(&self, save: GridSave) {
        if let Some(tx) = &self.tx {
            // Send only fails if the writer thread died
            if tx.send(WriterCommand::Queue(save)).is_err() {
                log::error!("snapshot writer is gone; dropping queued save");
            }
        }
    }

    /// Ask the writer to persist the pending snapshot without waiting out
    /// the debounce window.
    pub fn flush(&self) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(WriterCommand::Flush);
        }
    }
}

impl Drop for SaveScheduler {
    fn drop(&mut self) {
        // Closing the channel makes the writer loop exit after one final
        // flush of the pending snapshot
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn writer_loop(rx: Receiver<WriterCommand>, path: &Path, debounce: Duration) {
    let mut pending: Option<GridSave> = None;

    loop {
        let command = if pending.is_some() {
            match rx.recv_timeout(debounce) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match rx.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            }
        };

        match command {
            Some(WriterCommand::Queue(save)) => pending = Some(save),
            Some(WriterCommand::Flush) | None => write_pending(&mut pending, path),
        }
    }

    // Channel closed: shutdown flush so a pending snapshot is not lost
    write_pending(&mut pending, path);
}

fn write_pending(pending: &mut Option<GridSave>, path: &Path) {
    if let Some(save) = pending.take() {
        if let Err(err) = save_to_path(path, &save) {
            // Non-fatal: the next capture queues the full state again
            log::warn!("Failed to save snapshot to {:?}: {}", path, err);
        }
    }
}
