//! Physical stack construction on both ends of a call
//!
//! Opening walks the composed chain to its transport tail, opens the
//! physical connector, writes the handshake, and wraps the connector with
//! each modifier layer's stream transform from the wire upward. The head
//! semantic layer consumes the fully wrapped connector directly; it hands
//! control to invocation dispatch instead of producing another stream.
//! Accepting mirrors the walk: read the handshake, rebuild the chain,
//! wrap bottom-up, hand off to the dispatcher.

use crate::connector::BoxConnector;
use crate::handshake::{read_handshake, write_handshake};
use crate::plugin::{InboundDispatcher, PluginRegistry};
use crate::session::SessionChain;
use std::sync::Arc;
use tracing::{debug, warn};
use weft_core::{SystemId, WeftError, WeftResult};

/// Opens outgoing stacks over the local plug-in registry
#[derive(Clone)]
pub struct StackOpener {
    system_id: SystemId,
    registry: Arc<PluginRegistry>,
}

impl StackOpener {
    /// Create an opener for the local system
    pub fn new(system_id: SystemId, registry: Arc<PluginRegistry>) -> Self {
        Self { system_id, registry }
    }

    /// The local system id written into every handshake
    pub fn system_id(&self) -> SystemId {
        self.system_id
    }

    /// Open the physical connector for a composed chain
    ///
    /// On handshake failure the partially opened connector is dropped and
    /// the error propagates; no partially composed state stays behind.
    pub async fn open(&self, chain: &SessionChain) -> WeftResult<BoxConnector> {
        if chain.is_incoming() {
            return Err(WeftError::internal(
                "an incoming chain cannot initiate a connection without re-preparation",
            ));
        }

        let tail = chain.tail();
        let transport = self.registry.transport(tail.ability())?;
        let mut connector = transport.open(tail).await?;
        debug!(target_system = %tail.target(), transport = %tail.ability(), "opened physical connector");

        write_handshake(&mut connector, self.system_id, chain).await?;

        // wrap from the layer nearest the wire up to, but excluding, the head
        let layers = chain.above_transport();
        for session in layers.get(1..).unwrap_or_default().iter().rev() {
            let modifier = self.registry.modifier(session.kind(), session.ability())?;
            connector = modifier.open(connector, session).await?;
        }
        Ok(connector)
    }
}

/// A fully accepted inbound stack, ready for dispatch
pub struct AcceptedStack {
    /// Connector wrapped by every modifier layer
    pub connector: BoxConnector,
    /// Reconstructed incoming chain, head to tail
    pub chain: SessionChain,
    /// The calling system, as announced in the handshake
    pub source: SystemId,
}

/// Rebuilds inbound stacks from handshakes
#[derive(Clone)]
pub struct StackAcceptor {
    registry: Arc<PluginRegistry>,
}

impl StackAcceptor {
    /// Create an acceptor over the local plug-in registry
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self { registry }
    }

    /// Read the handshake and rebuild the peer's chain
    pub async fn accept(&self, mut connector: BoxConnector) -> WeftResult<AcceptedStack> {
        let (source, chain) = read_handshake(&mut connector).await?;
        debug!(source = %source, layers = chain.len(), "accepted handshake");

        // apply transforms bottom-up, excluding the head
        for session in chain.nodes()[1..].iter().rev() {
            let modifier = self.registry.modifier(session.kind(), session.ability())?;
            connector = modifier.open(connector, session).await?;
        }
        Ok(AcceptedStack {
            connector,
            chain,
            source,
        })
    }

    /// Accept a connection and hand it to the head semantic plug-in
    ///
    /// This is the entry point an accepting transport runs on a pooled
    /// task for every inbound connection.
    pub async fn accept_and_deliver(
        &self,
        connector: BoxConnector,
        dispatcher: Arc<dyn InboundDispatcher>,
    ) -> WeftResult<()> {
        let accepted = match self.accept(connector).await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(error = %err, "dropping connection with bad handshake");
                return Err(err);
            }
        };
        let semantic = self.registry.semantic(accepted.chain.head().ability())?;
        semantic
            .deliver_incoming(accepted.connector, accepted.chain, dispatcher)
            .await
    }
}
