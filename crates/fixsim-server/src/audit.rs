//! Audit sinks for the processes.
//!
//! Session callbacks publish into a [`ChannelSink`]; an [`AuditConsumer`]
//! task drains the channel into the real sink, so a slow disk never stalls a
//! session reader.

use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, SystemTime},
};

use fixsim_core::AuditSink;
use tokio::sync::mpsc;

/// Default audit file, relative to the working directory.
pub const DEFAULT_AUDIT_FILE: &str = "log/fix_audit.log";

/// Idle time after which a new run is separated by a blank line.
pub const RUN_GAP: Duration = Duration::from_secs(5);

struct FileState {
    file: File,
    first_line: bool,
}

/// Appends `[yyyy-mm-dd HH:MM:SS.mmm] line` entries to a file.
///
/// The first line of a process is preceded by a blank line when the file
/// already existed and was last written more than [`RUN_GAP`] ago.
pub struct FileAuditSink {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileAuditSink {
    /// Open `path` for appending, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, state: Mutex::new(FileState { file, first_line: true }) })
    }

    /// File being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.first_line {
            state.first_line = false;
            let metadata = state.file.metadata()?;
            let idle = metadata
                .modified()
                .ok()
                .and_then(|modified| SystemTime::now().duration_since(modified).ok())
                .unwrap_or_default();
            if metadata.len() > 0 && idle > RUN_GAP {
                state.file.write_all(b"\n")?;
            }
        }

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        writeln!(state.file, "[{timestamp}] {line}")?;
        state.file.flush()
    }
}

impl AuditSink for FileAuditSink {
    fn publish(&self, line: &str) {
        if let Err(e) = self.write_line(line) {
            tracing::error!(path = %self.path.display(), "audit write failed: {}", e);
        }
    }
}

/// Sink half of the audit channel.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl AuditSink for ChannelSink {
    fn publish(&self, line: &str) {
        if self.tx.send(line.to_string()).is_err() {
            tracing::debug!("audit consumer gone, line dropped");
        }
    }
}

/// Drains the audit channel into `inner`.
pub struct AuditConsumer {
    rx: mpsc::UnboundedReceiver<String>,
    inner: Arc<dyn AuditSink>,
}

impl AuditConsumer {
    /// Consume until every [`ChannelSink`] is dropped.
    pub async fn run(self) -> usize {
        self.run_until(std::future::pending()).await
    }

    /// Consume until every [`ChannelSink`] is dropped or `shutdown`
    /// resolves.
    ///
    /// On shutdown the channel is closed and lines already published are
    /// still written; later publishes are dropped.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> usize {
        let mut shutdown = std::pin::pin!(shutdown);
        let mut consumed = 0;
        loop {
            tokio::select! {
                biased;
                line = self.rx.recv() => match line {
                    Some(line) => {
                        self.inner.publish(&line);
                        consumed += 1;
                    },
                    None => break,
                },
                () = &mut shutdown => {
                    self.rx.close();
                    while let Some(line) = self.rx.recv().await {
                        self.inner.publish(&line);
                        consumed += 1;
                    }
                    break;
                },
            }
        }
        tracing::debug!(consumed, "audit consumer stopped");
        consumed
    }
}

/// Audit channel feeding `inner`.
pub fn audit_channel(inner: Arc<dyn AuditSink>) -> (ChannelSink, AuditConsumer) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSink { tx }, AuditConsumer { rx, inner })
}
