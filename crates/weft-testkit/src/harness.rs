//! Scenario harness wiring complete in-process systems together
//!
//! A [`TestSystem`] is one device: a runtime over a plug-in registry, an
//! accept loop pulling inbound pipes off the memory network, and the
//! standard testkit plug-ins. The task that pulled a pipe off the network
//! immediately hands acceptance to a fresh task, mirroring how a real
//! accepting transport frees its reader thread.

use crate::lookup::StaticCapabilityLookup;
use crate::modifiers::{NullCompressionPlugin, XorEncryptionPlugin};
use crate::network::{MemoryNetwork, MemoryTransportPlugin};
use crate::semantic::RpcSemanticPlugin;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;
use weft_broker::{InvocationHandler, RuntimeConfig, WeftRuntime};
use weft_core::{Invocation, ObjectId, PluginDescription, ReferenceId, SystemId};
use weft_stack::{InboundDispatcher, PluginRegistry, SessionChain};

/// One in-process device: runtime plus accept loop
pub struct TestSystem {
    /// The system's runtime context
    pub runtime: Arc<WeftRuntime>,
    accept_task: tokio::task::JoinHandle<()>,
}

impl TestSystem {
    /// Spawn a system advertising exactly what its registry installs
    pub fn spawn(
        network: &Arc<MemoryNetwork>,
        lookup: &Arc<StaticCapabilityLookup>,
        system_id: SystemId,
        plugins: PluginRegistry,
    ) -> Self {
        let advertised = plugins.descriptions();
        Self::spawn_with_advertised(network, lookup, system_id, plugins, advertised)
    }

    /// Spawn a system with an explicit advertised inventory
    ///
    /// Installing more than is advertised models capabilities that only
    /// become visible through temporary advertisement.
    pub fn spawn_with_advertised(
        network: &Arc<MemoryNetwork>,
        lookup: &Arc<StaticCapabilityLookup>,
        system_id: SystemId,
        plugins: PluginRegistry,
        advertised: Vec<PluginDescription>,
    ) -> Self {
        lookup.register_system(system_id, advertised);
        let runtime = Arc::new(WeftRuntime::new(
            RuntimeConfig {
                system_id: Some(system_id),
            },
            plugins,
            lookup.clone() as Arc<dyn weft_stack::CapabilityLookup>,
        ));

        let mut inbound = network.bind(system_id);
        let acceptor = runtime.acceptor();
        let dispatcher: Arc<dyn InboundDispatcher> = runtime.broker().clone();
        let accept_task = tokio::spawn(async move {
            while let Some(stream) = inbound.recv().await {
                let acceptor = acceptor.clone();
                let dispatcher = dispatcher.clone();
                // acceptance runs on its own task so the reader is freed
                tokio::spawn(async move {
                    if let Err(err) = acceptor.accept_and_deliver(Box::new(stream), dispatcher).await
                    {
                        debug!(error = %err, "inbound delivery failed");
                    }
                });
            }
        });

        Self {
            runtime,
            accept_task,
        }
    }

    /// The system's id
    pub fn system_id(&self) -> SystemId {
        self.runtime.system_id()
    }

    /// A reference to an object hosted on this system
    pub fn reference(&self, object: ObjectId) -> ReferenceId {
        ReferenceId::new(self.system_id(), object)
    }

    /// Stop accepting and tear the runtime down
    pub fn shutdown(&self) {
        self.runtime.shutdown();
        self.accept_task.abort();
    }
}

/// Registry with the semantic and transport plug-ins every scenario needs
pub fn standard_plugins(network: &Arc<MemoryNetwork>) -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.register_semantic(Arc::new(RpcSemanticPlugin::new()));
    registry.register_transport(Arc::new(MemoryTransportPlugin::new(network.clone())));
    registry
}

/// Standard registry plus the compression and encryption modifiers
pub fn full_plugins(network: &Arc<MemoryNetwork>, xor_key: u8) -> PluginRegistry {
    let mut registry = standard_plugins(network);
    registry.register_modifier(Arc::new(NullCompressionPlugin::new()));
    registry.register_modifier(Arc::new(XorEncryptionPlugin::new(xor_key)));
    registry
}

/// Handler echoing the concatenation of all argument payloads
pub struct EchoHandler;

#[async_trait]
impl InvocationHandler for EchoHandler {
    async fn handle(&self, invocation: &mut Invocation, _chain: &SessionChain) {
        let echoed: Vec<u8> = invocation.arguments.concat();
        invocation.set_result(echoed);
    }
}

/// Handler recording what it served and signalling each call
pub struct RecordingHandler {
    seen: Mutex<Vec<Invocation>>,
    notify: Notify,
}

impl RecordingHandler {
    /// Create an empty recorder
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            notify: Notify::new(),
        })
    }

    /// Number of calls served so far
    pub fn seen_count(&self) -> usize {
        self.seen.lock().len()
    }

    /// Signatures of the calls served so far
    pub fn seen_signatures(&self) -> Vec<String> {
        self.seen
            .lock()
            .iter()
            .map(|invocation| invocation.signature.clone())
            .collect()
    }

    /// Wait until at least one call has been served
    pub async fn wait_for_call(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.seen_count() > 0 {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl InvocationHandler for RecordingHandler {
    async fn handle(&self, invocation: &mut Invocation, _chain: &SessionChain) {
        invocation.set_result(Vec::new());
        self.seen.lock().push(invocation.clone());
        self.notify.notify_waiters();
    }
}
