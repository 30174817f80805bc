//! In-memory transport over duplex pipes
//!
//! A [`MemoryNetwork`] connects systems living in the same process. Each
//! bound system owns a channel of inbound duplex streams; opening a
//! connector pushes the far end of a fresh pipe into the target's channel.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tracing::trace;
use weft_core::{
    Ability, LayerKind, PluginDescription, RequirementCollection, SystemId, WeftError, WeftResult,
};
use weft_stack::{BoxConnector, SessionState, StackPlugin, TransportPlugin};

/// Default ability of the in-memory transport
pub const MEMORY_TRANSPORT_ABILITY: Ability = Ability(0x0600);

const PIPE_CAPACITY: usize = 64 * 1024;

/// Process-local network connecting bound systems with duplex pipes
#[derive(Default)]
pub struct MemoryNetwork {
    listeners: Mutex<HashMap<SystemId, mpsc::UnboundedSender<DuplexStream>>>,
}

impl MemoryNetwork {
    /// Create an empty network
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Bind a system, returning its stream of inbound connections
    pub fn bind(&self, system: SystemId) -> mpsc::UnboundedReceiver<DuplexStream> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.listeners.lock().insert(system, sender);
        receiver
    }

    /// Remove a binding
    pub fn unbind(&self, system: SystemId) {
        self.listeners.lock().remove(&system);
    }

    /// Whether a system is currently bound
    pub fn is_bound(&self, system: SystemId) -> bool {
        self.listeners.lock().contains_key(&system)
    }

    /// Open a pipe to a bound system
    pub fn connect(&self, target: SystemId) -> WeftResult<DuplexStream> {
        let listeners = self.listeners.lock();
        let sender = listeners
            .get(&target)
            .ok_or_else(|| WeftError::io(format!("{target} is not reachable")))?;
        let (near, far) = tokio::io::duplex(PIPE_CAPACITY);
        sender
            .send(far)
            .map_err(|_| WeftError::io(format!("{target} stopped accepting")))?;
        trace!(target = %target, "opened memory pipe");
        Ok(near)
    }
}

/// Transport plug-in backed by a [`MemoryNetwork`]
pub struct MemoryTransportPlugin {
    ability: Ability,
    network: Arc<MemoryNetwork>,
}

impl MemoryTransportPlugin {
    /// Create the plug-in with the default ability
    pub fn new(network: Arc<MemoryNetwork>) -> Self {
        Self::with_ability(network, MEMORY_TRANSPORT_ABILITY)
    }

    /// Create the plug-in under a custom transport ability
    pub fn with_ability(network: Arc<MemoryNetwork>, ability: Ability) -> Self {
        Self { ability, network }
    }
}

#[async_trait]
impl StackPlugin for MemoryTransportPlugin {
    fn description(&self) -> PluginDescription {
        PluginDescription::new(self.ability, LayerKind::Transport)
            .with_property("medium", "memory")
    }

    async fn prepare_session(
        &self,
        _requirements: &mut RequirementCollection,
        session: &mut SessionState,
    ) -> WeftResult<bool> {
        // decline rather than fail when the peer is not reachable
        Ok(self.network.is_bound(session.target()))
    }
}

#[async_trait]
impl TransportPlugin for MemoryTransportPlugin {
    async fn open(&self, session: &SessionState) -> WeftResult<BoxConnector> {
        let stream = self.network.connect(session.target())?;
        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn pipes_carry_bytes_between_ends() {
        let network = MemoryNetwork::new();
        let system = SystemId::random();
        let mut inbound = network.bind(system);

        let mut near = network.connect(system).unwrap();
        near.write_all(b"ping").await.unwrap();
        near.flush().await.unwrap();

        let mut far = inbound.recv().await.unwrap();
        let mut buf = [0u8; 4];
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn unbound_targets_are_unreachable() {
        let network = MemoryNetwork::new();
        let target = SystemId::random();
        assert!(network.connect(target).is_err());

        let plugin = MemoryTransportPlugin::new(network.clone());
        let mut session = SessionState::new(
            LayerKind::Transport,
            MEMORY_TRANSPORT_ABILITY,
            target,
            weft_stack::Direction::Outgoing,
        );
        let prepared = plugin
            .prepare_session(&mut RequirementCollection::new(), &mut session)
            .await
            .unwrap();
        assert!(!prepared);
    }
}
