//! Explicitly constructed runtime context
//!
//! One [`WeftRuntime`] bundles everything a system needs to make and serve
//! calls: the broker, the plug-in registry, and the handler registry.
//! Construction and teardown are explicit; there is no lazily initialized
//! global state anywhere in the workspace.

use crate::broker::InvocationBroker;
use crate::calls::{DeferredCall, OnewayCall, SynchronousCall};
use crate::handlers::{HandlerRegistry, InvocationHandler};
use std::sync::Arc;
use tracing::info;
use weft_core::{ObjectId, ObjectIdFactory, SystemId};
use weft_stack::{
    CapabilityLookup, PassthroughStrategy, PluginRegistry, SelectionStrategy, StackAcceptor,
};

/// Startup configuration for a runtime
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Fixed system id; a random one is generated when absent
    pub system_id: Option<SystemId>,
}

/// The per-system runtime context
pub struct WeftRuntime {
    system_id: SystemId,
    broker: Arc<InvocationBroker>,
    object_ids: ObjectIdFactory,
}

impl WeftRuntime {
    /// Construct a runtime with the default selection strategy
    pub fn new(
        config: RuntimeConfig,
        plugins: PluginRegistry,
        lookup: Arc<dyn CapabilityLookup>,
    ) -> Self {
        Self::with_strategy(config, plugins, lookup, Arc::new(PassthroughStrategy))
    }

    /// Construct a runtime with an explicit selection strategy
    pub fn with_strategy(
        config: RuntimeConfig,
        plugins: PluginRegistry,
        lookup: Arc<dyn CapabilityLookup>,
        strategy: Arc<dyn SelectionStrategy>,
    ) -> Self {
        let system_id = config.system_id.unwrap_or_else(SystemId::random);
        let broker = Arc::new(InvocationBroker::new(
            system_id,
            Arc::new(plugins),
            lookup,
            strategy,
        ));
        info!(system = %system_id, "weft runtime started");
        Self {
            system_id,
            broker,
            object_ids: ObjectIdFactory::new(system_id),
        }
    }

    /// The local system id
    pub fn system_id(&self) -> SystemId {
        self.system_id
    }

    /// The invocation broker
    pub fn broker(&self) -> &Arc<InvocationBroker> {
        &self.broker
    }

    /// An acceptor over this runtime's plug-ins, for accepting transports
    pub fn acceptor(&self) -> StackAcceptor {
        StackAcceptor::new(self.broker.plugins().clone())
    }

    /// Hand out a process-unique object id
    pub fn next_object_id(&self) -> ObjectId {
        self.object_ids.next()
    }

    /// Register a handler for inbound calls on an object
    pub fn register_handler(&self, object: ObjectId, handler: Arc<dyn InvocationHandler>) {
        self.broker.handlers().register(object, handler);
    }

    /// Remove a handler
    pub fn remove_handler(&self, object: ObjectId) {
        self.broker.handlers().remove(object);
    }

    /// The handler registry
    pub fn handlers(&self) -> &Arc<HandlerRegistry> {
        self.broker.handlers()
    }

    /// Synchronous call helper
    pub fn synchronous(&self) -> SynchronousCall {
        SynchronousCall::new(self.broker.clone())
    }

    /// One-way call helper
    pub fn one_way(&self) -> OnewayCall {
        OnewayCall::new(self.broker.clone())
    }

    /// Deferred call helper
    pub fn deferred(&self) -> DeferredCall {
        DeferredCall::new(self.broker.clone())
    }

    /// Tear the runtime down
    ///
    /// In-flight calls run to completion on whichever task executes them;
    /// teardown only stops new inbound dispatch by clearing the handler
    /// table.
    pub fn shutdown(&self) {
        self.broker.handlers().clear();
        info!(system = %self.system_id, "weft runtime shut down");
    }
}
