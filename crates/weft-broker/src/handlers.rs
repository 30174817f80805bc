//! Handler registry for inbound invocations

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use weft_core::{Invocation, ObjectId};
use weft_stack::SessionChain;

/// Application-side handler for calls arriving at one object
#[async_trait]
pub trait InvocationHandler: Send + Sync {
    /// Serve one inbound invocation, setting its result or exception
    async fn handle(&self, invocation: &mut Invocation, chain: &SessionChain);
}

/// Registered handlers, keyed by the object id they serve
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<ObjectId, Arc<dyn InvocationHandler>>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an object, replacing any previous one
    pub fn register(&self, object: ObjectId, handler: Arc<dyn InvocationHandler>) {
        self.handlers.write().insert(object, handler);
    }

    /// Remove the handler for an object
    pub fn remove(&self, object: ObjectId) -> Option<Arc<dyn InvocationHandler>> {
        self.handlers.write().remove(&object)
    }

    /// Look up the handler for an object
    pub fn lookup(&self, object: ObjectId) -> Option<Arc<dyn InvocationHandler>> {
        self.handlers.read().get(&object).cloned()
    }

    /// Drop every registration
    pub fn clear(&self) {
        self.handlers.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHandler;

    #[async_trait]
    impl InvocationHandler for NoopHandler {
        async fn handle(&self, invocation: &mut Invocation, _chain: &SessionChain) {
            invocation.set_result(Vec::new());
        }
    }

    #[test]
    fn register_lookup_remove() {
        let registry = HandlerRegistry::new();
        let object = ObjectId::well_known(4);
        assert!(registry.lookup(object).is_none());
        registry.register(object, Arc::new(NoopHandler));
        assert!(registry.lookup(object).is_some());
        assert!(registry.remove(object).is_some());
        assert!(registry.lookup(object).is_none());
    }
}
