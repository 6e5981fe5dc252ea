//! Control-protocol messages and the OSC transport
//!
//! Every message that flows through the engine, whether it was resolved from
//! a controller event or received over the network, is a [`ControlMessage`]:
//! a hierarchical address plus ordered typed arguments. This module converts
//! between that representation and [`rosc`] packets and runs the UDP tasks.

use anyhow::{Context, Result};
use rosc::{OscMessage, OscPacket, OscType};
use std::fmt;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::router::RouterHandle;

/// Maximum datagram size accepted by the receiver
const MAX_DATAGRAM: usize = 8192;

/// A single typed argument of a control message
#[derive(Debug, Clone, PartialEq)]
pub enum ControlArg {
    Float(f32),
    Int(i32),
    Str(String),
    Bool(bool),
}

impl ControlArg {
    /// Numeric view of the argument (strings are not coerced)
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ControlArg::Float(f) => Some(*f),
            ControlArg::Int(i) => Some(*i as f32),
            ControlArg::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            ControlArg::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ControlArg::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, ControlArg::Str(_))
    }
}

impl fmt::Display for ControlArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlArg::Float(v) => write!(f, "{:.4}", v),
            ControlArg::Int(v) => write!(f, "{}", v),
            ControlArg::Str(s) => write!(f, "\"{}\"", s),
            ControlArg::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Address + arguments, used both for inbound protocol messages and
/// outbound intents.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlMessage {
    pub address: String,
    pub args: Vec<ControlArg>,
}

impl ControlMessage {
    pub fn new(address: impl Into<String>, args: Vec<ControlArg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }

    /// Message carrying a single float, the shape of every resolved intent
    pub fn float(address: impl Into<String>, value: f32) -> Self {
        Self::new(address, vec![ControlArg::Float(value)])
    }

    /// Argument-less trigger message
    pub fn bang(address: impl Into<String>) -> Self {
        Self::new(address, Vec::new())
    }

    pub fn arg_f32(&self, index: usize) -> Option<f32> {
        self.args.get(index).and_then(ControlArg::as_f32)
    }

    pub fn arg_str(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(ControlArg::as_str)
    }

    /// First argument as a number, `None` when absent or non-numeric
    pub fn value(&self) -> Option<f32> {
        self.arg_f32(0)
    }

    /// A message with no arguments or a positive first numeric argument
    /// counts as a press. Everything else is a release.
    pub fn is_press(&self) -> bool {
        match self.args.first() {
            None => true,
            Some(arg) => arg.as_f32().map(|v| v > 0.0).unwrap_or(true),
        }
    }

    /// Convenience for "value above one half" switches used by hold addresses
    pub fn is_on(&self) -> bool {
        self.value().map(|v| v > 0.5).unwrap_or(false)
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

impl From<OscMessage> for ControlMessage {
    fn from(msg: OscMessage) -> Self {
        let args = msg
            .args
            .into_iter()
            .filter_map(|arg| match arg {
                OscType::Float(f) => Some(ControlArg::Float(f)),
                OscType::Double(d) => Some(ControlArg::Float(d as f32)),
                OscType::Int(i) => Some(ControlArg::Int(i)),
                OscType::Long(l) => Some(ControlArg::Int(l as i32)),
                OscType::String(s) => Some(ControlArg::Str(s)),
                OscType::Bool(b) => Some(ControlArg::Bool(b)),
                other => {
                    debug!("Dropping unsupported OSC argument: {:?}", other);
                    None
                }
            })
            .collect();
        Self {
            address: msg.addr,
            args,
        }
    }
}

impl From<&ControlMessage> for OscMessage {
    fn from(msg: &ControlMessage) -> Self {
        OscMessage {
            addr: msg.address.clone(),
            args: msg
                .args
                .iter()
                .map(|arg| match arg {
                    ControlArg::Float(f) => OscType::Float(*f),
                    ControlArg::Int(i) => OscType::Int(*i),
                    ControlArg::Str(s) => OscType::String(s.clone()),
                    ControlArg::Bool(b) => OscType::Bool(*b),
                })
                .collect(),
        }
    }
}

/// Encode a message as a single OSC packet
pub fn encode(msg: &ControlMessage) -> Result<Vec<u8>> {
    let packet = OscPacket::Message(OscMessage::from(msg));
    rosc::encoder::encode(&packet).with_context(|| format!("Failed to encode OSC message {}", msg.address))
}

/// Decode one datagram, flattening bundles into their messages
pub fn decode(datagram: &[u8]) -> Result<Vec<ControlMessage>> {
    let (_, packet) = rosc::decoder::decode_udp(datagram)
        .map_err(|e| anyhow::anyhow!("Failed to decode OSC packet: {:?}", e))?;

    let mut out = Vec::new();
    flatten(packet, &mut out);
    Ok(out)
}

fn flatten(packet: OscPacket, out: &mut Vec<ControlMessage>) {
    match packet {
        OscPacket::Message(msg) => out.push(msg.into()),
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                flatten(inner, out);
            }
        }
    }
}

/// Listen for inbound protocol messages and hand them to the router
pub async fn spawn_receiver(listen: SocketAddr, router: RouterHandle) -> Result<JoinHandle<()>> {
    let socket = UdpSocket::bind(listen)
        .await
        .with_context(|| format!("Failed to bind OSC listener on {}", listen))?;
    info!("📡 OSC listening on {}", listen);

    Ok(tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, peer)) => match decode(&buf[..len]) {
                    Ok(messages) => {
                        for msg in messages {
                            debug!("OSC in [{}] {}", peer, msg);
                            router.control(msg);
                        }
                    }
                    Err(e) => warn!("Ignoring datagram from {}: {}", peer, e),
                },
                Err(e) => {
                    warn!("OSC receive error: {}", e);
                }
            }
        }
    }))
}

/// Forward resolved intents to an external listener
pub async fn spawn_forwarder(
    target: SocketAddr,
    mut rx: mpsc::Receiver<ControlMessage>,
) -> Result<JoinHandle<()>> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .context("Failed to bind OSC sender socket")?;
    info!("OSC forwarding → {}", target);

    Ok(tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let bytes = match encode(&msg) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("{}", e);
                    continue;
                }
            };
            if let Err(e) = socket.send_to(&bytes, target).await {
                debug!("OSC send error: {}", e);
            }
        }
        debug!("OSC forwarder stopped");
    }))
}
