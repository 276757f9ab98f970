use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use obscore_types::{Event, StoredEvent};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::filter::EventFilter;

/// Scanner buffer size floor: readers must tolerate lines up to at least
/// 1 MiB.
const MIN_LINE_BUFFER: usize = 1024 * 1024;
/// Depth of the channel `Stream` emits on.
const STREAM_CHANNEL_DEPTH: usize = 100;

/// Append-only, per-session, line-delimited event log.
///
/// Sequence numbers are assigned from a single atomic counter shared across
/// every session this store instance touches: sequence numbers are strictly
/// increasing across all sessions. The counter resets to zero each time a
/// new `EventStore` is constructed; it is not seeded by scanning existing
/// files for the current maximum, so sequence numbers are not stable across
/// a process restart. Known limitation, kept rather than paying the startup
/// scan cost.
pub struct EventStore {
    root: PathBuf,
    sequence: AtomicU64,
    handles: Mutex<HashMap<String, File>>,
}

impl EventStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sequence: AtomicU64::new(0),
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.root.join(format!("{}.jsonl", session_id))
    }

    /// Append `event` to its session's log, returning the sequence number
    /// assigned to it.
    pub async fn append(&self, cancel: &CancellationToken, event: &Event) -> Result<u64> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let session_id = event
            .session_id
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::InvalidArgument("event has no session_id".to_string()))?;

        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = StoredEvent::from_event(seq, None, event)
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;
        let mut line = serde_json::to_vec(&stored)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        line.push(b'\n');

        let mut handles = self.handles.lock().await;
        let file = self.open_or_insert(&mut handles, &session_id).await?;
        file.write_all(&line).await?;
        trace!(session_id = %session_id, seq, "appended event");

        Ok(seq)
    }

    async fn open_or_insert<'a>(
        &self,
        handles: &'a mut HashMap<String, File>,
        session_id: &str,
    ) -> Result<&'a mut File> {
        if !handles.contains_key(session_id) {
            tokio::fs::create_dir_all(&self.root).await?;
            set_dir_permissions(&self.root).await;

            let path = self.session_path(session_id);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            set_file_permissions(&path).await;
            handles.insert(session_id.to_string(), file);
        }
        Ok(handles.get_mut(session_id).expect("just inserted"))
    }

    /// Return all events matching `filter`. `filter.session_id` is
    /// mandatory; an unknown session returns an empty vector rather than an
    /// error.
    pub async fn query(&self, cancel: &CancellationToken, filter: &EventFilter) -> Result<Vec<StoredEvent>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if filter.session_id.is_empty() {
            return Err(Error::InvalidArgument("filter has no session_id".to_string()));
        }

        let path = self.session_path(&filter.session_id);
        let file = match File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::with_capacity(MIN_LINE_BUFFER, file);
        let mut matches = Vec::new();
        let mut line = String::new();

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            line.clear();
            let read = reader.read_line(&mut line).await?;
            if read == 0 {
                break;
            }
            let trimmed = line.trim_end_matches('\n');
            if trimmed.is_empty() {
                continue;
            }
            let stored: StoredEvent = match serde_json::from_str(trimmed) {
                Ok(s) => s,
                Err(_) => continue, // malformed line skipped silently
            };
            if filter.matches(&stored) {
                matches.push(stored);
                if let Some(limit) = filter.limit {
                    if matches.len() >= limit {
                        break;
                    }
                }
            }
        }

        debug!(session_id = %filter.session_id, matched = matches.len(), "query complete");
        Ok(matches)
    }

    /// Stream every event in `session_id`'s log on a buffered channel.
    /// Returns an immediately-closed channel if the session has no file.
    pub fn stream(
        &self,
        cancel: CancellationToken,
        session_id: impl Into<String>,
    ) -> mpsc::Receiver<StoredEvent> {
        let session_id = session_id.into();
        let path = self.session_path(&session_id);
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_DEPTH);

        tokio::spawn(async move {
            let file = match File::open(&path).await {
                Ok(f) => f,
                Err(_) => return,
            };
            let mut reader = BufReader::with_capacity(MIN_LINE_BUFFER, file);
            let mut line = String::new();

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    read = reader.read_line(&mut line) => {
                        let read = match read {
                            Ok(n) => n,
                            Err(_) => break,
                        };
                        if read == 0 {
                            break;
                        }
                        let trimmed = line.trim_end_matches('\n').to_string();
                        line.clear();
                        if trimmed.is_empty() {
                            continue;
                        }
                        if let Ok(stored) = serde_json::from_str::<StoredEvent>(&trimmed) {
                            if tx.send(stored).await.is_err() {
                                break;
                            }
                        }
                        // malformed lines are skipped silently
                    }
                }
            }
        });

        rx
    }

    /// Flush all cached file handles.
    pub async fn sync(&self) -> Result<()> {
        let handles = self.handles.lock().await;
        for file in handles.values() {
            file.sync_all().await?;
        }
        Ok(())
    }

    /// Flush and close all cached file handles; subsequent operations
    /// re-open on demand.
    pub async fn close(&self) -> Result<()> {
        let mut handles = self.handles.lock().await;
        for (_, file) in handles.drain() {
            file.sync_all().await?;
            drop(file);
        }
        Ok(())
    }
}

#[cfg(unix)]
async fn set_dir_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o750)).await {
        warn!(?e, "failed to set event log directory permissions");
    }
}

#[cfg(not(unix))]
async fn set_dir_permissions(_path: &Path) {}

#[cfg(unix)]
async fn set_file_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await {
        warn!(?e, "failed to set event log file permissions");
    }
}

#[cfg(not(unix))]
async fn set_file_permissions(_path: &Path) {}
