//! Messages accepted by the router actor

use std::sync::Arc;
use tokio::sync::oneshot;

use crate::mapping::{MappingDocument, RawEvent};
use crate::osc::ControlMessage;
use crate::state::StateView;

#[derive(Debug)]
pub enum RouterCommand {
    // Hot path (fire-and-forget)
    /// Decoded controller event from a device callback
    RawEvent(RawEvent),
    /// Inbound protocol message
    Control(ControlMessage),
    /// Re-read the mapping file (file watcher)
    ReloadMapping,

    // Queries
    Snapshot(oneshot::Sender<Arc<StateView>>),
    MappingDocument(oneshot::Sender<MappingDocument>),

    /// Stop after flushing outputs; acknowledged once the loop has exited
    Shutdown(oneshot::Sender<()>),
}
