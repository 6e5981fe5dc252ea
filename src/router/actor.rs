//! RouterActor - tick loop around [`Core`]
//!
//! ```text
//! midir threads ─┐                      ┌─▶ feedback  (device pump)
//! OSC receiver ──┼─▶ command_rx ─▶ Core ├─▶ forward   (OSC forwarder)
//! watcher ───────┘        ▲             ├─▶ persist   (PersistenceActor)
//!                     interval ─────────┴─▶ watch<Arc<StateView>>
//! ```
//!
//! Every tick drains queued intents, integrates, publishes one view and
//! flushes the outbox. Outputs use `try_send`, so a slow consumer never
//! stalls the loop.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use super::actor_handle::RouterHandle;
use super::commands::RouterCommand;
use super::{Core, Outbox};
use crate::mapping::Feedback;
use crate::osc::ControlMessage;
use crate::persistence::PersistenceHandle;

/// Where the router sends its side effects; any of them may be absent
#[derive(Default)]
pub struct RouterOutputs {
    pub feedback: Option<mpsc::Sender<Feedback>>,
    pub forward: Option<mpsc::Sender<ControlMessage>>,
    pub persistence: Option<PersistenceHandle>,
}

pub struct RouterActor {
    core: Core,
    command_rx: mpsc::UnboundedReceiver<RouterCommand>,
    view_tx: watch::Sender<Arc<crate::state::StateView>>,
    outputs: RouterOutputs,
    tick_period: Duration,
    tick_count: u64,
}

impl RouterActor {
    /// Spawn the actor on the current runtime. Indicator levels for every
    /// feedback-enabled rule are sent before the first tick.
    pub fn spawn(core: Core, outputs: RouterOutputs, tick_hz: u32) -> RouterHandle {
        let (cmd_tx, command_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(Arc::new(core.view()));

        let mut actor = RouterActor {
            core,
            command_rx,
            view_tx,
            outputs,
            tick_period: Duration::from_secs_f64(1.0 / tick_hz.max(1) as f64),
            tick_count: 0,
        };
        let initial = actor.core.table().initial_feedback();
        for fb in initial {
            actor.send_feedback(fb);
        }

        tokio::spawn(actor.run());
        info!("Router started ({} Hz)", tick_hz);

        RouterHandle::new(cmd_tx, view_rx)
    }

    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        debug!("All router handles dropped");
                        break;
                    };
                    trace!(?cmd, "Router command");
                    match cmd {
                        RouterCommand::RawEvent(event) => self.core.raw_event(&event),
                        RouterCommand::Control(msg) => self.core.control(msg),
                        RouterCommand::ReloadMapping => self.core.reload_mapping(),
                        RouterCommand::Snapshot(response) => {
                            let _ = response.send(self.view_tx.borrow().clone());
                        }
                        RouterCommand::MappingDocument(response) => {
                            let _ = response.send(self.core.table().document());
                        }
                        RouterCommand::Shutdown(ack) => {
                            self.core.drain();
                            self.flush_outbox();
                            info!("Router stopped after {} ticks", self.tick_count);
                            let _ = ack.send(());
                            return;
                        }
                    }
                    // feedback should not wait for the next frame
                    self.flush_outbox();
                }
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    self.core.tick(dt);
                    self.tick_count += 1;
                    self.view_tx.send_replace(Arc::new(self.core.view()));
                    self.flush_outbox();
                }
            }
        }
        self.flush_outbox();
    }

    fn flush_outbox(&mut self) {
        let Outbox {
            feedback,
            forwarded,
            persist,
        } = self.core.take_outbox();

        for fb in feedback {
            self.send_feedback(fb);
        }
        if let Some(tx) = &self.outputs.forward {
            for msg in forwarded {
                if tx.try_send(msg).is_err() {
                    debug!("Forward queue full or closed, intent dropped");
                }
            }
        }
        for request in persist {
            match &self.outputs.persistence {
                Some(persistence) => {
                    persistence.request(request);
                }
                None => debug!("No persistence configured, document not written"),
            }
        }
    }

    fn send_feedback(&self, fb: Feedback) {
        let Some(tx) = &self.outputs.feedback else {
            return;
        };
        if let Err(e) = tx.try_send(fb) {
            warn!("Feedback ch {} #{} dropped: {}", fb.channel, fb.control, e);
        }
    }
}
