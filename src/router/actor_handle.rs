//! RouterHandle - public API of the router actor
//!
//! Fire-and-forget methods are synchronous and never block, so they can be
//! called from midir callback threads. Queries go through oneshot channels.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

use super::commands::RouterCommand;
use crate::mapping::{MappingDocument, RawEvent};
use crate::osc::ControlMessage;
use crate::state::StateView;

#[derive(Clone)]
pub struct RouterHandle {
    cmd_tx: mpsc::UnboundedSender<RouterCommand>,
    view_rx: watch::Receiver<Arc<StateView>>,
}

impl RouterHandle {
    pub(crate) fn new(
        cmd_tx: mpsc::UnboundedSender<RouterCommand>,
        view_rx: watch::Receiver<Arc<StateView>>,
    ) -> Self {
        Self { cmd_tx, view_rx }
    }

    // =========================================================================
    // Hot path
    // =========================================================================

    pub fn raw_event(&self, event: RawEvent) {
        let _ = self.cmd_tx.send(RouterCommand::RawEvent(event));
    }

    pub fn control(&self, msg: ControlMessage) {
        let _ = self.cmd_tx.send(RouterCommand::Control(msg));
    }

    pub fn reload_mapping(&self) {
        let _ = self.cmd_tx.send(RouterCommand::ReloadMapping);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Latest published frame, `None` once the actor has stopped
    pub async fn snapshot(&self) -> Option<Arc<StateView>> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx.send(RouterCommand::Snapshot(tx)).ok()?;
        rx.await.ok()
    }

    /// Current rule set in storage form
    pub async fn mapping_document(&self) -> Option<MappingDocument> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx.send(RouterCommand::MappingDocument(tx)).ok()?;
        rx.await.ok()
    }

    /// Receiver updated once per tick with the integrated state
    pub fn subscribe(&self) -> watch::Receiver<Arc<StateView>> {
        self.view_rx.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }

    /// Stop the actor and wait until its loop has exited
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(RouterCommand::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}
