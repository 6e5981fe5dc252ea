//! Persistence actor for debounced document writes
//!
//! The router never touches the disk. Mutations produce a [`PersistRequest`]
//! that is handed over with `try_send`; this actor keeps the latest pending
//! document per kind and writes it once the debounce window has passed
//! without a newer request (last-write-wins).
//!
//! Writes go to a sibling temp file that is then renamed over the target, so
//! a crash mid-write never leaves a truncated document behind.
//!
//! ```ignore
//! let persistence = PersistenceActor::spawn(mapping_path, cues_path, 250);
//! persistence.request(PersistRequest::Cues(doc));
//! persistence.flush().await?;
//! persistence.shutdown();
//! ```

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use crate::cue::CueDocument;
use crate::mapping::MappingDocument;

pub const DEFAULT_DEBOUNCE_MS: u64 = 250;

const CHANNEL_CAPACITY: usize = 64;

/// A document that should reach the disk
#[derive(Debug, Clone, PartialEq)]
pub enum PersistRequest {
    Mapping(MappingDocument),
    Cues(CueDocument),
}

impl PersistRequest {
    fn kind(&self) -> &'static str {
        match self {
            PersistRequest::Mapping(_) => "mapping",
            PersistRequest::Cues(_) => "cues",
        }
    }
}

#[derive(Debug)]
pub enum PersistenceCommand {
    /// Queue a document (debounced)
    Save(PersistRequest),
    /// Write everything pending now
    Flush(oneshot::Sender<Result<()>>),
    /// Flush and stop
    Shutdown,
}

pub struct PersistenceActor {
    command_rx: mpsc::Receiver<PersistenceCommand>,
    mapping_path: PathBuf,
    cues_path: PathBuf,
    pending_mapping: Option<MappingDocument>,
    pending_cues: Option<CueDocument>,
    last_request: Instant,
    debounce_ms: u64,
    write_count: u64,
}

/// Cheap to clone, shared by the router and the shutdown path
#[derive(Clone)]
pub struct PersistenceHandle {
    cmd_tx: mpsc::Sender<PersistenceCommand>,
}

impl PersistenceActor {
    /// Spawn the actor. `debounce_ms = 0` writes on every request.
    pub fn spawn(mapping_path: PathBuf, cues_path: PathBuf, debounce_ms: u64) -> PersistenceHandle {
        let (cmd_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let actor = PersistenceActor {
            command_rx,
            mapping_path,
            cues_path,
            pending_mapping: None,
            pending_cues: None,
            last_request: Instant::now(),
            debounce_ms,
            write_count: 0,
        };
        tokio::spawn(actor.run());
        PersistenceHandle { cmd_tx }
    }

    async fn run(mut self) {
        info!("Persistence actor started (debounce: {}ms)", self.debounce_ms);

        let period = if self.debounce_ms > 0 {
            (self.debounce_ms / 2).max(10)
        } else {
            1000
        };
        let mut ticker = tokio::time::interval(Duration::from_millis(period));

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(PersistenceCommand::Save(request)) => {
                            trace!("Queued {} document", request.kind());
                            match request {
                                PersistRequest::Mapping(doc) => self.pending_mapping = Some(doc),
                                PersistRequest::Cues(doc) => self.pending_cues = Some(doc),
                            }
                            self.last_request = Instant::now();
                            if self.debounce_ms == 0 {
                                let _ = self.flush_pending().await;
                            }
                        }
                        Some(PersistenceCommand::Flush(response_tx)) => {
                            let result = self.flush_pending().await;
                            let _ = response_tx.send(result);
                        }
                        Some(PersistenceCommand::Shutdown) | None => {
                            info!("Persistence actor shutting down, flushing pending documents");
                            if let Err(e) = self.flush_pending().await {
                                error!("Final flush failed: {:#}", e);
                            }
                            info!("Persistence actor stopped (total writes: {})", self.write_count);
                            return;
                        }
                    }
                }
                _ = ticker.tick() => {
                    let has_pending = self.pending_mapping.is_some() || self.pending_cues.is_some();
                    if has_pending
                        && self.debounce_ms > 0
                        && self.last_request.elapsed() >= Duration::from_millis(self.debounce_ms)
                    {
                        trace!("Debounce window expired, flushing");
                        if let Err(e) = self.flush_pending().await {
                            error!("Persistence write failed: {:#}", e);
                        }
                    }
                }
            }
        }
    }

    /// Write both pending documents. A failed document stays pending for the
    /// next attempt; the first error is returned.
    async fn flush_pending(&mut self) -> Result<()> {
        let mut first_error = None;

        if let Some(doc) = self.pending_mapping.take() {
            match write_json_atomic(&self.mapping_path, &doc).await {
                Ok(()) => {
                    self.write_count += 1;
                    info!("Mapping saved to {}", self.mapping_path.display());
                }
                Err(e) => {
                    warn!("Mapping write failed, will retry: {:#}", e);
                    self.pending_mapping = Some(doc);
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(doc) = self.pending_cues.take() {
            match write_json_atomic(&self.cues_path, &doc).await {
                Ok(()) => {
                    self.write_count += 1;
                    info!("Cues saved to {}", self.cues_path.display());
                }
                Err(e) => {
                    warn!("Cue write failed, will retry: {:#}", e);
                    self.pending_cues = Some(doc);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Pretty JSON, written to `<path>.tmp` and renamed into place
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).context("Failed to serialize document")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &json)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move {} into place", tmp.display()))?;

    debug!("Wrote {} bytes to {}", json.len(), path.display());
    Ok(())
}

impl PersistenceHandle {
    /// Queue a document without waiting. Returns false when the queue is
    /// full or the actor is gone; the request is dropped in that case.
    pub fn request(&self, request: PersistRequest) -> bool {
        let kind = request.kind();
        match self.cmd_tx.try_send(PersistenceCommand::Save(request)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Persistence queue full, {} document dropped", kind);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Persistence actor stopped, {} document dropped", kind);
                false
            }
        }
    }

    /// Force pending documents to disk
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(PersistenceCommand::Flush(tx))
            .await
            .context("Failed to send flush command: actor shut down")?;
        rx.await.context("Failed to receive flush response")?
    }

    /// Fire-and-forget; the actor flushes before it stops
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.try_send(PersistenceCommand::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::CueBank;
    use crate::error::read_json;
    use crate::state::Params;
    use tempfile::tempdir;

    fn paths(dir: &Path) -> (PathBuf, PathBuf) {
        (dir.join("midi_mapping.json"), dir.join("cues.json"))
    }

    fn cue_doc(populated_slot: usize) -> CueDocument {
        let mut bank = CueBank::new(30);
        bank.store(populated_slot, Params::default());
        CueDocument::from_bank(&bank)
    }

    #[tokio::test]
    async fn test_immediate_write_without_debounce() {
        let temp = tempdir().unwrap();
        let (mapping, cues) = paths(temp.path());
        let handle = PersistenceActor::spawn(mapping.clone(), cues, 0);

        assert!(handle.request(PersistRequest::Mapping(MappingDocument::defaults())));
        handle.flush().await.unwrap();

        let loaded: MappingDocument = read_json(&mapping).unwrap();
        assert_eq!(loaded, MappingDocument::defaults());
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_flush_overrides_debounce() {
        let temp = tempdir().unwrap();
        let (mapping, cues) = paths(temp.path());
        let handle = PersistenceActor::spawn(mapping, cues.clone(), 10_000);

        handle.request(PersistRequest::Cues(cue_doc(4)));
        assert!(!cues.exists());
        handle.flush().await.unwrap();
        assert!(cues.exists());
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_debounce_keeps_last_document() {
        let temp = tempdir().unwrap();
        let (mapping, cues) = paths(temp.path());
        let handle = PersistenceActor::spawn(mapping, cues.clone(), 50);

        for slot in 1..=5 {
            handle.request(PersistRequest::Cues(cue_doc(slot)));
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        let bank = CueDocument::load(&cues, 30);
        assert_eq!(bank.populated(), 1);
        assert!(bank.get(5).is_some());
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_flushes_pending() {
        let temp = tempdir().unwrap();
        let (mapping, cues) = paths(temp.path());
        let handle = PersistenceActor::spawn(mapping.clone(), cues, 10_000);

        handle.request(PersistRequest::Mapping(MappingDocument::defaults()));
        handle.shutdown();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(mapping.exists());
        assert!(!temp.path().join("midi_mapping.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_creates_parent_directories() {
        let temp = tempdir().unwrap();
        let nested = temp.path().join("a/b/cues.json");
        write_json_atomic(&nested, &cue_doc(1)).await.unwrap();
        assert_eq!(CueDocument::load(&nested, 30).populated(), 1);
    }
}
