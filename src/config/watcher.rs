//! Mapping file watcher for hot-reload support

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::router::RouterHandle;

/// Settle time before a reload so editors can finish writing
const RELOAD_DELAY: Duration = Duration::from_millis(100);

/// Watches the mapping document and asks the router to reload it on change.
///
/// The parent directory is watched rather than the file itself, since the
/// persistence layer replaces the file by rename.
pub struct MappingWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl MappingWatcher {
    pub fn new(mapping_path: &Path, router: RouterHandle) -> Result<Self> {
        let file_name: OsString = mapping_path
            .file_name()
            .with_context(|| format!("Not a file path: {}", mapping_path.display()))?
            .to_os_string();
        let dir = match mapping_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        // notify callbacks run on their own OS thread, not in Tokio context
        let runtime_handle = tokio::runtime::Handle::current();
        let scheduled = Arc::new(AtomicBool::new(false));

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        return;
                    }
                    let touches_mapping = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if !touches_mapping {
                        return;
                    }
                    debug!("Mapping file changed: {:?}", event.paths);

                    // coalesce bursts of events into one reload
                    if scheduled.swap(true, Ordering::SeqCst) {
                        return;
                    }
                    let scheduled = scheduled.clone();
                    let router = router.clone();
                    runtime_handle.spawn(async move {
                        tokio::time::sleep(RELOAD_DELAY).await;
                        scheduled.store(false, Ordering::SeqCst);
                        info!("🔄 Mapping file changed, reloading");
                        router.reload_mapping();
                    });
                }
                Err(e) => {
                    error!("Watch error: {}", e);
                }
            }
        })?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch directory: {}", dir.display()))?;

        info!("Mapping watcher started for: {}", mapping_path.display());

        Ok(Self {
            _watcher: watcher,
            path: mapping_path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::CueEngine;
    use crate::mapping::store::NoteEntry;
    use crate::mapping::{MappingDocument, MappingTable};
    use crate::router::{Core, RouterActor, RouterOutputs};
    use crate::state::LiveState;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_mapping_change_triggers_reload() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("midi_mapping.json");
        fs::write(&path, serde_json::to_string(&MappingDocument::defaults())?)?;

        let core = Core::new(
            MappingTable::from_document(&MappingDocument::defaults()),
            LiveState::default(),
            CueEngine::default(),
        )
        .with_mapping_path(path.clone());
        let router = RouterActor::spawn(core, RouterOutputs::default(), 100);
        let watcher = MappingWatcher::new(&path, router.clone())?;
        assert_eq!(watcher.path(), path.as_path());

        let mut doc = MappingDocument::defaults();
        doc.notes.push(NoteEntry {
            channel: 2,
            note: 70,
            osc: "/laser/shape/line".to_string(),
            ..NoteEntry::default()
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(&path, serde_json::to_string(&doc)?)?;

        // watcher backends differ in latency, poll until the rule appears
        let reloaded = tokio::time::timeout(Duration::from_secs(3), async {
            loop {
                if let Some(current) = router.mapping_document().await {
                    if current.notes.iter().any(|n| n.note == 70) {
                        return true;
                    }
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;
        assert!(reloaded.is_ok());

        router.shutdown().await;
        Ok(())
    }
}
