//! Per-call session state and the session chain
//!
//! Composition binds one plug-in per selected layer and records the
//! negotiated state in a [`SessionState`]. The states form a
//! [`SessionChain`], an index-addressed list ordered head (application
//! layer) to tail, built bottom-up while the composer unwinds. The chain
//! crosses task boundaries by reference, so everything in it is `Sync`.

use std::any::Any;
use std::fmt;
use weft_core::{Ability, LayerKind, SystemId, WeftError, WeftResult};

/// Direction a chain was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Composed locally; may open a physical connection
    Outgoing,
    /// Reconstructed from a peer's handshake; cannot initiate a new
    /// connection without being re-prepared
    Incoming,
}

/// Negotiated state of one pipeline layer for one call
pub struct SessionState {
    kind: LayerKind,
    ability: Ability,
    target: SystemId,
    direction: Direction,
    /// Plug-in private state; never transmitted, read only by the plug-in
    /// bound to this layer
    pub local: Option<Box<dyn Any + Send + Sync>>,
    /// Payload exchanged with the peer during stack construction; only
    /// layers between the head and encryption inclusive may carry one
    pub remote: Option<Vec<u8>>,
}

impl SessionState {
    /// Create a fresh session for one layer
    pub fn new(kind: LayerKind, ability: Ability, target: SystemId, direction: Direction) -> Self {
        Self {
            kind,
            ability,
            target,
            direction,
            local: None,
            remote: None,
        }
    }

    /// Pipeline layer this session belongs to
    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    /// Ability of the bound plug-in
    pub fn ability(&self) -> Ability {
        self.ability
    }

    /// Logical target system of the call
    pub fn target(&self) -> SystemId {
        self.target
    }

    /// Direction the owning chain was built for
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Downcast the plug-in private state
    pub fn local_as<T: 'static>(&self) -> Option<&T> {
        self.local.as_ref().and_then(|local| local.downcast_ref())
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("kind", &self.kind)
            .field("ability", &self.ability)
            .field("target", &self.target)
            .field("direction", &self.direction)
            .field("local", &self.local.as_ref().map(|_| "<opaque>"))
            .field("remote", &self.remote.as_ref().map(Vec::len))
            .finish()
    }
}

/// Ordered per-layer session list for one call, head to tail
///
/// An outgoing chain always ends in a transport session (the tail opens
/// the physical connector and never appears in the handshake body). An
/// incoming chain holds exactly the layers above transport, because the
/// physical connector already exists on the accepting side.
#[derive(Debug)]
pub struct SessionChain {
    nodes: Vec<SessionState>,
    direction: Direction,
}

impl SessionChain {
    /// Build an outgoing chain from composer output
    ///
    /// The node list must be non-empty, contain exactly one transport
    /// session, and carry it at the tail.
    pub fn outgoing(nodes: Vec<SessionState>) -> WeftResult<Self> {
        let tail = nodes
            .last()
            .ok_or_else(|| WeftError::internal("empty session chain"))?;
        if tail.kind() != LayerKind::Transport {
            return Err(WeftError::internal(format!(
                "outgoing chain ends in {} instead of transport",
                tail.kind()
            )));
        }
        if nodes
            .iter()
            .filter(|node| node.kind() == LayerKind::Transport)
            .count()
            > 1
        {
            return Err(WeftError::internal("chain holds more than one transport session"));
        }
        Ok(Self {
            nodes,
            direction: Direction::Outgoing,
        })
    }

    /// Build an incoming chain from handshake reconstruction
    ///
    /// Holds only the layers above transport; must be non-empty and free
    /// of transport sessions.
    pub fn incoming(nodes: Vec<SessionState>) -> WeftResult<Self> {
        if nodes.is_empty() {
            return Err(WeftError::handshake("handshake announced zero layers"));
        }
        if nodes.iter().any(|node| node.kind() == LayerKind::Transport) {
            return Err(WeftError::handshake("transport layer appeared in handshake body"));
        }
        Ok(Self {
            nodes,
            direction: Direction::Incoming,
        })
    }

    /// Direction the chain was built for
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether this chain was reconstructed from a peer's handshake
    pub fn is_incoming(&self) -> bool {
        self.direction == Direction::Incoming
    }

    /// The application-facing head session
    pub fn head(&self) -> &SessionState {
        // both constructors reject empty node lists
        &self.nodes[0]
    }

    /// The last session in the chain
    pub fn tail(&self) -> &SessionState {
        &self.nodes[self.nodes.len() - 1]
    }

    /// All sessions, head to tail
    pub fn nodes(&self) -> &[SessionState] {
        &self.nodes
    }

    /// Sessions above the transport layer, head first
    ///
    /// For an incoming chain this is every node; the transport never made
    /// it into the handshake.
    pub fn above_transport(&self) -> &[SessionState] {
        match self.direction {
            Direction::Outgoing => &self.nodes[..self.nodes.len() - 1],
            Direction::Incoming => &self.nodes,
        }
    }

    /// Number of sessions in the chain
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the chain is empty (never true for a constructed chain)
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
