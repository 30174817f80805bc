//! Per-layer plug-in contracts and the local plug-in registry
//!
//! Every plug-in advertises a description and prepares sessions during
//! composition. Beyond that the contract depends on the layer: transports
//! open physical connectors, modifier layers wrap an existing connector
//! with their stream transform, and the semantic layer at the head drives
//! the actual invocation exchange.

use crate::connector::BoxConnector;
use crate::opener::StackOpener;
use crate::session::{SessionChain, SessionState};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use weft_core::{
    Ability, Invocation, LayerKind, PluginDescription, RequirementCollection, SystemId, WeftError,
    WeftResult,
};

/// Contract shared by plug-ins of every layer
#[async_trait]
pub trait StackPlugin: Send + Sync {
    /// The advertised description of this plug-in
    fn description(&self) -> PluginDescription;

    /// Negotiate participation in a call
    ///
    /// The plug-in may narrow the requirement copy, stash private state in
    /// `session.local`, and stage a handshake payload in `session.remote`
    /// (payload-carrying layers only). Returning `Ok(false)` declines the
    /// session without failing composition.
    async fn prepare_session(
        &self,
        requirements: &mut RequirementCollection,
        session: &mut SessionState,
    ) -> WeftResult<bool>;
}

/// Transport layer: opens the physical connector
#[async_trait]
pub trait TransportPlugin: StackPlugin {
    /// Open a physical connector to the session's target system
    async fn open(&self, session: &SessionState) -> WeftResult<BoxConnector>;
}

/// Serialization, compression, encryption, and routing layers: wrap the
/// connector with a stream transform
#[async_trait]
pub trait ModifierPlugin: StackPlugin {
    /// Wrap the connector coming from the layer below
    async fn open(&self, inner: BoxConnector, session: &SessionState) -> WeftResult<BoxConnector>;
}

/// Application-semantic layer at the head of the chain
#[async_trait]
pub trait SemanticPlugin: StackPlugin {
    /// Drive the outbound exchange for one invocation
    ///
    /// Contract: before returning, exactly one of result or exception has
    /// been set on the invocation. Retry and replay are this plug-in's own
    /// policy, never the broker's.
    async fn perform_outgoing(
        &self,
        invocation: &mut Invocation,
        chain: &SessionChain,
        opener: &StackOpener,
    ) -> WeftResult<()>;

    /// Serve one accepted connection
    ///
    /// Reads whatever the peer's counterpart wrote, feeds the invocation
    /// to the dispatcher, and returns the reply if the exchange mode asks
    /// for one.
    async fn deliver_incoming(
        &self,
        connector: BoxConnector,
        chain: SessionChain,
        dispatcher: Arc<dyn InboundDispatcher>,
    ) -> WeftResult<()>;
}

/// Inbound side of the invocation broker, as seen by semantic plug-ins
#[async_trait]
pub trait InboundDispatcher: Send + Sync {
    /// Route an inbound invocation to its registered handler
    ///
    /// Attaches an exception instead of failing when the target is
    /// unknown or malformed.
    async fn dispatch(&self, invocation: &mut Invocation, chain: &SessionChain);
}

/// Capability lookup consumed by the broker (external collaborator)
///
/// Implementations track which plug-in descriptions are present on which
/// systems; registry bookkeeping and expiry are outside this core.
#[async_trait]
pub trait CapabilityLookup: Send + Sync {
    /// Descriptions present on both the source and the target system
    async fn compatible_plugins(
        &self,
        source: SystemId,
        target: SystemId,
    ) -> WeftResult<Vec<PluginDescription>>;

    /// Full advertised inventory of one system
    async fn inventory(&self, system: SystemId) -> WeftResult<Vec<PluginDescription>>;
}

/// A registered plug-in instance, tagged by its layer contract
#[derive(Clone)]
pub enum PluginHandle {
    /// Transport-layer plug-in
    Transport(Arc<dyn TransportPlugin>),
    /// Modifier-layer plug-in
    Modifier(Arc<dyn ModifierPlugin>),
    /// Semantic-layer plug-in
    Semantic(Arc<dyn SemanticPlugin>),
}

impl PluginHandle {
    /// The advertised description of the wrapped plug-in
    pub fn description(&self) -> PluginDescription {
        match self {
            PluginHandle::Transport(plugin) => plugin.description(),
            PluginHandle::Modifier(plugin) => plugin.description(),
            PluginHandle::Semantic(plugin) => plugin.description(),
        }
    }

    /// Delegate session preparation to the wrapped plug-in
    pub async fn prepare_session(
        &self,
        requirements: &mut RequirementCollection,
        session: &mut SessionState,
    ) -> WeftResult<bool> {
        match self {
            PluginHandle::Transport(plugin) => plugin.prepare_session(requirements, session).await,
            PluginHandle::Modifier(plugin) => plugin.prepare_session(requirements, session).await,
            PluginHandle::Semantic(plugin) => plugin.prepare_session(requirements, session).await,
        }
    }
}

/// Locally installed plug-ins, keyed by layer and ability
///
/// Built once at startup and shared read-only afterwards; the local
/// inventory advertised to capability lookups is the set of registered
/// descriptions.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<(LayerKind, Ability), PluginHandle>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transport plug-in
    pub fn register_transport(&mut self, plugin: Arc<dyn TransportPlugin>) {
        self.register(PluginHandle::Transport(plugin));
    }

    /// Register a modifier plug-in
    pub fn register_modifier(&mut self, plugin: Arc<dyn ModifierPlugin>) {
        self.register(PluginHandle::Modifier(plugin));
    }

    /// Register a semantic plug-in
    pub fn register_semantic(&mut self, plugin: Arc<dyn SemanticPlugin>) {
        self.register(PluginHandle::Semantic(plugin));
    }

    fn register(&mut self, handle: PluginHandle) {
        let description = handle.description();
        self.plugins
            .insert((description.kind, description.ability), handle);
    }

    /// Look up an installed plug-in by layer and ability
    pub fn get(&self, kind: LayerKind, ability: Ability) -> Option<&PluginHandle> {
        self.plugins.get(&(kind, ability))
    }

    /// The installed transport plug-in for an ability
    pub fn transport(&self, ability: Ability) -> WeftResult<Arc<dyn TransportPlugin>> {
        match self.get(LayerKind::Transport, ability) {
            Some(PluginHandle::Transport(plugin)) => Ok(plugin.clone()),
            _ => Err(WeftError::internal(format!(
                "no transport plug-in installed for ability {ability}"
            ))),
        }
    }

    /// The installed modifier plug-in for a layer and ability
    pub fn modifier(&self, kind: LayerKind, ability: Ability) -> WeftResult<Arc<dyn ModifierPlugin>> {
        match self.get(kind, ability) {
            Some(PluginHandle::Modifier(plugin)) => Ok(plugin.clone()),
            _ => Err(WeftError::internal(format!(
                "no {kind} modifier plug-in installed for ability {ability}"
            ))),
        }
    }

    /// The installed semantic plug-in for an ability
    pub fn semantic(&self, ability: Ability) -> WeftResult<Arc<dyn SemanticPlugin>> {
        match self.get(LayerKind::Semantic, ability) {
            Some(PluginHandle::Semantic(plugin)) => Ok(plugin.clone()),
            _ => Err(WeftError::internal(format!(
                "no semantic plug-in installed for ability {ability}"
            ))),
        }
    }

    /// Descriptions of every installed plug-in (the local inventory)
    pub fn descriptions(&self) -> Vec<PluginDescription> {
        let mut descriptions: Vec<_> = self
            .plugins
            .values()
            .map(PluginHandle::description)
            .collect();
        descriptions.sort_by_key(|description| (description.kind, description.ability));
        descriptions
    }
}
