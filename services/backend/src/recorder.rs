//! Hourly-rotated NDJSON event log.
//!
//! `enqueue` hands the serialized line to a bounded channel and never
//! blocks the ingest caller; overflow drops the line and counts it.  A
//! consumer task owns the open hour file exclusively: it appends one line
//! per event, flushes after every write, rotates when the UTC hour key
//! changes, and prunes expired files after each rotation when a retention
//! is configured.

use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub const DEFAULT_QUEUE_MAX: usize = 10_000;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Counters exposed for observability and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderStats {
    pub total_written: u64,
    pub dropped: u64,
    pub write_errors: u64,
}

#[derive(Default)]
struct Counters {
    total_written: AtomicU64,
    dropped: AtomicU64,
    write_errors: AtomicU64,
}

/// Cheap cloneable handle to the recorder task.
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::Sender<String>,
    counters: Arc<Counters>,
    shutdown_tx: watch::Sender<bool>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RecorderHandle {
    /// Spawn the consumer task writing under `dir`.
    pub fn spawn(dir: PathBuf, retention: Option<Duration>) -> Self {
        Self::spawn_with(dir, retention, DEFAULT_QUEUE_MAX, Arc::new(Utc::now))
    }

    /// Full-control constructor; tests inject a clock and a small queue.
    pub fn spawn_with(
        dir: PathBuf,
        retention: Option<Duration>,
        queue_max: usize,
        clock: Clock,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_max);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counters = Arc::new(Counters::default());
        let writer = Writer {
            dir,
            retention,
            clock,
            counters: Arc::clone(&counters),
            hour_key: None,
            file: None,
        };
        let task = tokio::spawn(run_consumer(writer, rx, shutdown_rx));
        RecorderHandle {
            tx,
            counters,
            shutdown_tx,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Non-blocking enqueue; drops and counts on overflow.
    pub fn enqueue(&self, line: String) {
        if self.tx.try_send(line).is_err() {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> RecorderStats {
        RecorderStats {
            total_written: self.counters.total_written.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            write_errors: self.counters.write_errors.load(Ordering::Relaxed),
        }
    }

    /// Stop the consumer after draining already-queued lines.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        let task = self.task.lock().expect("recorder task lock poisoned").take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

struct Writer {
    dir: PathBuf,
    retention: Option<Duration>,
    clock: Clock,
    counters: Arc<Counters>,
    hour_key: Option<String>,
    file: Option<File>,
}

async fn run_consumer(
    mut writer: Writer,
    mut rx: mpsc::Receiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    if let Err(e) = std::fs::create_dir_all(&writer.dir) {
        error!(dir = %writer.dir.display(), error = %e, "cannot create record directory");
    }
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    // Drain whatever is already queued, then exit.
                    while let Ok(line) = rx.try_recv() {
                        writer.write_line(&line);
                    }
                    break;
                }
            }
            line = rx.recv() => {
                match line {
                    Some(line) => writer.write_line(&line),
                    None => break,
                }
            }
        }
    }
    writer.close();
}

impl Writer {
    /// Append one line to the current hour file, rotating first if the
    /// UTC hour key moved on.
    fn write_line(&mut self, line: &str) {
        let now = (self.clock)();
        let key = now.format("%Y%m%d_%H").to_string();
        if self.file.is_none() || self.hour_key.as_deref() != Some(key.as_str()) {
            if let Err(e) = self.rotate(&key) {
                // Retry on the next write; the line is lost but counted.
                self.counters.write_errors.fetch_add(1, Ordering::Relaxed);
                error!(key, error = %e, "rotation failed");
                return;
            }
        }
        let Some(file) = self.file.as_mut() else { return };
        let result = file
            .write_all(line.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .and_then(|()| file.flush());
        match result {
            Ok(()) => {
                self.counters.total_written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.write_errors.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "record write failed");
                // Force a reopen on the next write.
                self.file = None;
                self.hour_key = None;
            }
        }
    }

    fn rotate(&mut self, key: &str) -> std::io::Result<()> {
        self.close();
        let path = self.dir.join(format!("{key}.ndjson"));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), "record file opened");
        self.hour_key = Some(key.to_owned());
        self.file = Some(file);
        if let Some(retention) = self.retention {
            prune_expired(&self.dir, retention);
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }
        self.hour_key = None;
    }
}

/// Remove `.ndjson` files whose mtime is older than `now - retention`.
fn prune_expired(dir: &Path, retention: Duration) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "retention scan failed");
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "ndjson") {
            continue;
        }
        let expired = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|mtime| mtime.elapsed().ok())
            .is_some_and(|age| age > retention);
        if expired {
            match std::fs::remove_file(&path) {
                Ok(()) => info!(path = %path.display(), "expired record file removed"),
                Err(e) => warn!(path = %path.display(), error = %e, "retention prune failed"),
            }
        }
    }
}
