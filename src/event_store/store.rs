//! Usage Store - buffered append-only usage log
//!
//! Events are appended to an in-memory buffer and persisted to a JSON Lines
//! file in batches. A batch is written when the buffer reaches the flush
//! threshold, when the background scheduler ticks, or when the store is
//! closed.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::scheduler::FlushScheduler;
use crate::types::UsageEvent;

/// Default number of buffered events that triggers a synchronous flush
pub const DEFAULT_FLUSH_THRESHOLD: usize = 50;

/// Default period of the background flush
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for the UsageStore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageStoreConfig {
    /// Path to the usage log (JSON Lines)
    pub path: PathBuf,
    /// Buffer occupancy that forces a flush inside `write`
    pub flush_threshold: usize,
    /// Period of the background flush
    pub flush_interval: Duration,
}

impl Default for UsageStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("usage").join("usage.jsonl"),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl UsageStoreConfig {
    /// Create config for a log at `path` with default flush policy
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold.max(1);
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Get the usage log path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Step of a flush that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushStage {
    CreateDir,
    Open,
    Write,
    Sync,
}

impl fmt::Display for FlushStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushStage::CreateDir => write!(f, "cannot create directory for"),
            FlushStage::Open => write!(f, "cannot open"),
            FlushStage::Write => write!(f, "cannot write"),
            FlushStage::Sync => write!(f, "cannot sync"),
        }
    }
}

/// Result type for UsageStore operations
pub type UsageStoreResult<T> = Result<T, UsageStoreError>;

/// Errors that can occur in UsageStore operations
#[derive(Debug, Error)]
pub enum UsageStoreError {
    #[error("flush failed: {stage} {}: {source}", .path.display())]
    Flush {
        stage: FlushStage,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("flush failed: cannot encode usage event: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to read usage log {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl UsageStoreError {
    /// Whether the error came from the flush path
    pub fn is_flush_failure(&self) -> bool {
        matches!(self, UsageStoreError::Flush { .. } | UsageStoreError::Encode(_))
    }

    fn flush(stage: FlushStage, path: &Path, source: io::Error) -> Self {
        UsageStoreError::Flush {
            stage,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// The buffer and the log file it drains into.
///
/// One mutex guards the buffer and is held for the whole flush, so writes,
/// flushes and loads never interleave.
pub(crate) struct UsageLog {
    config: UsageStoreConfig,
    buffer: Mutex<Vec<UsageEvent>>,
}

impl UsageLog {
    fn new(config: UsageStoreConfig) -> Self {
        let capacity = config.flush_threshold;
        Self {
            config,
            buffer: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    fn write(&self, event: UsageEvent) -> UsageStoreResult<()> {
        let mut buffer = self.buffer.lock();
        buffer.push(event);

        if buffer.len() >= self.config.flush_threshold {
            return self.flush_locked(&mut buffer);
        }

        Ok(())
    }

    pub(crate) fn flush(&self) -> UsageStoreResult<()> {
        let mut buffer = self.buffer.lock();
        self.flush_locked(&mut buffer)
    }

    /// Persist the whole buffer as one batch, clearing it only on success.
    ///
    /// The batch is encoded up front and appended with a single write. If the
    /// write or sync fails the file is cut back to its previous length, so
    /// retrying the batch does not duplicate lines already on disk.
    fn flush_locked(&self, buffer: &mut Vec<UsageEvent>) -> UsageStoreResult<()> {
        if buffer.is_empty() {
            return Ok(());
        }

        let mut batch = Vec::with_capacity(buffer.len() * 192);
        for event in buffer.iter() {
            let line = event.to_json_line().map_err(UsageStoreError::Encode)?;
            batch.extend_from_slice(line.as_bytes());
            batch.push(b'\n');
        }

        let path = self.config.path();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| UsageStoreError::flush(FlushStage::CreateDir, path, e))?;
            }
        }

        let mut file =
            open_append(path).map_err(|e| UsageStoreError::flush(FlushStage::Open, path, e))?;
        let committed_len = file
            .metadata()
            .map_err(|e| UsageStoreError::flush(FlushStage::Open, path, e))?
            .len();

        // A crash can leave a torn last line; start the batch on a fresh one
        let torn_tail = committed_len > 0
            && !ends_with_newline(&mut file)
                .map_err(|e| UsageStoreError::flush(FlushStage::Open, path, e))?;
        if torn_tail {
            warn!(path = %path.display(), "usage log ends mid-line; starting batch on a new line");
            batch.insert(0, b'\n');
        }

        let written = match file.write_all(&batch) {
            Ok(()) => file
                .sync_all()
                .map_err(|e| UsageStoreError::flush(FlushStage::Sync, path, e)),
            Err(e) => Err(UsageStoreError::flush(FlushStage::Write, path, e)),
        };

        if let Err(err) = written {
            rollback(&file, path, committed_len);
            return Err(err);
        }

        debug!(count = buffer.len(), bytes = batch.len(), "flushed usage events");
        buffer.clear();
        Ok(())
    }

    fn load(&self) -> UsageStoreResult<Vec<UsageEvent>> {
        let _buffer = self.buffer.lock();
        let path = self.config.path();

        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(UsageStoreError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let mut reader = BufReader::new(file);
        let mut events = Vec::new();
        let mut line = Vec::new();
        let mut line_num = 0usize;

        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| UsageStoreError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            if read == 0 {
                break;
            }
            line_num += 1;

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match UsageEvent::from_json_line(&line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!(line = line_num, error = %e, "skipping malformed usage event");
                }
            }
        }

        Ok(events)
    }

    fn len(&self) -> usize {
        self.buffer.lock().len()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true).create(true).append(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options.open(path)
}

fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn rollback(file: &File, path: &Path, committed_len: u64) {
    if let Err(e) = file.set_len(committed_len).and_then(|_| file.sync_all()) {
        error!(
            path = %path.display(),
            error = %e,
            "could not roll back partial usage batch; a retry may duplicate events"
        );
    }
}

/// Buffered, crash-tolerant usage event store
///
/// `write` is cheap (memory append under a lock) except when it fills the
/// buffer to the flush threshold. Events reach disk at the next threshold
/// flush, scheduler tick, explicit `flush` or `close`.
pub struct UsageStore {
    log: Arc<UsageLog>,
    scheduler: Mutex<Option<FlushScheduler>>,
}

impl UsageStore {
    /// Create a store and start its periodic flush.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: UsageStoreConfig) -> Self {
        let interval = config.flush_interval;
        let log = Arc::new(UsageLog::new(config));
        let scheduler = FlushScheduler::spawn(Arc::clone(&log), interval);

        info!(
            path = %log.config.path().display(),
            interval_secs = interval.as_secs_f64(),
            threshold = log.config.flush_threshold,
            "usage store opened"
        );

        Self {
            log,
            scheduler: Mutex::new(Some(scheduler)),
        }
    }

    /// Create a store without a background flush
    pub fn with_manual_flush(config: UsageStoreConfig) -> Self {
        Self {
            log: Arc::new(UsageLog::new(config)),
            scheduler: Mutex::new(None),
        }
    }

    /// Buffer an event, flushing synchronously when the threshold is reached.
    ///
    /// On error the event stays buffered and is retried with the next flush.
    pub fn write(&self, event: UsageEvent) -> UsageStoreResult<()> {
        self.log.write(event)
    }

    /// Persist all buffered events
    pub fn flush(&self) -> UsageStoreResult<()> {
        self.log.flush()
    }

    /// Read every persisted event in log order.
    ///
    /// Buffered events are not included; call `flush` first for full freshness.
    pub fn load(&self) -> UsageStoreResult<Vec<UsageEvent>> {
        self.log.load()
    }

    /// Number of buffered (not yet durable) events
    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the periodic flush is running
    pub fn is_scheduled(&self) -> bool {
        self.scheduler.lock().is_some()
    }

    /// Stop the periodic flush and persist whatever is still buffered
    pub async fn close(&self) -> UsageStoreResult<()> {
        let scheduler = self.scheduler.lock().take();
        if let Some(scheduler) = scheduler {
            scheduler.stop().await;
        }

        self.log.flush()?;
        info!(path = %self.log.config.path().display(), "usage store closed");
        Ok(())
    }
}

impl Drop for UsageStore {
    fn drop(&mut self) {
        let pending = self.log.len();
        if pending > 0 {
            warn!(pending, "usage store dropped with unflushed events");
        }
    }
}
