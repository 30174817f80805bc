//! The invocation broker
//!
//! One broker per system validates outbound calls, assigns identifiers
//! from a single wrapping counter, triggers stack composition, hands the
//! call to the selected semantic plug-in, and routes inbound invocations
//! to registered handlers. Every call path through the broker ends with
//! exactly one of result or exception set on the invocation.

use crate::handlers::HandlerRegistry;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};
use weft_core::{Invocation, LayerKind, SystemId, WeftError};
use weft_stack::{
    CapabilityLookup, Composer, InboundDispatcher, PluginRegistry, SelectionStrategy,
    SessionChain, StackOpener,
};

/// Validates, identifies, composes, and dispatches invocations
pub struct InvocationBroker {
    system_id: SystemId,
    // the only state mutated concurrently by multiple callers
    id_counter: Mutex<i32>,
    plugins: Arc<PluginRegistry>,
    lookup: Arc<dyn CapabilityLookup>,
    handlers: Arc<HandlerRegistry>,
    composer: Composer,
    opener: StackOpener,
}

impl InvocationBroker {
    /// Create a broker for the local system
    pub fn new(
        system_id: SystemId,
        plugins: Arc<PluginRegistry>,
        lookup: Arc<dyn CapabilityLookup>,
        strategy: Arc<dyn SelectionStrategy>,
    ) -> Self {
        Self {
            system_id,
            id_counter: Mutex::new(0),
            plugins: plugins.clone(),
            lookup,
            handlers: Arc::new(HandlerRegistry::new()),
            composer: Composer::new(plugins.clone(), strategy),
            opener: StackOpener::new(system_id, plugins),
        }
    }

    /// The local system id
    pub fn system_id(&self) -> SystemId {
        self.system_id
    }

    /// Handlers serving inbound calls on this system
    pub fn handlers(&self) -> &Arc<HandlerRegistry> {
        &self.handlers
    }

    /// Locally installed plug-ins
    pub fn plugins(&self) -> &Arc<PluginRegistry> {
        &self.plugins
    }

    /// Assign the next invocation identifier
    ///
    /// The counter wraps from `i32::MAX` back to `i32::MIN` and skips
    /// zero, so identifiers never repeat until the range is exhausted.
    fn next_invocation_id(&self) -> i32 {
        let mut counter = self.id_counter.lock();
        *counter = match *counter {
            i32::MAX => i32::MIN,
            -1 => 1,
            value => value + 1,
        };
        *counter
    }

    /// Run one outbound invocation to completion
    ///
    /// After this returns, the invocation carries exactly one of result or
    /// exception. Malformed calls and composition failures never touch the
    /// network.
    pub async fn invoke(&self, invocation: &mut Invocation) {
        if invocation.source.is_none() {
            invocation.set_exception(WeftError::malformed("invocation has no source"));
            return;
        }
        let Some(target) = invocation.target else {
            invocation.set_exception(WeftError::malformed("invocation has no target"));
            return;
        };
        let Some(requirements) = invocation.requirements.clone() else {
            invocation.set_exception(WeftError::malformed(
                "invocation has no requirement collection",
            ));
            return;
        };

        // assigned once by the first broker to send the invocation
        if invocation.id.is_none() {
            invocation.id = Some(self.next_invocation_id());
        }
        debug!(
            id = invocation.id,
            target = %target,
            signature = %invocation.signature,
            "invoking"
        );

        let compatible = match self
            .lookup
            .compatible_plugins(self.system_id, target.system)
            .await
        {
            Ok(compatible) => compatible,
            Err(err) => {
                invocation.set_exception(WeftError::composition(format!(
                    "capability lookup failed: {err}"
                )));
                return;
            }
        };

        let chain = match self
            .composer
            .compose(LayerKind::Semantic, target.system, &compatible, &requirements)
            .await
        {
            Ok(Some(chain)) => chain,
            Ok(None) => {
                invocation.set_exception(WeftError::composition(format!(
                    "no protocol stack to {} satisfies the requirements",
                    target.system
                )));
                return;
            }
            Err(err) => {
                invocation.set_exception(err);
                return;
            }
        };

        let semantic = match self.plugins.semantic(chain.head().ability()) {
            Ok(semantic) => semantic,
            Err(err) => {
                invocation.set_exception(err);
                return;
            }
        };
        if let Err(err) = semantic
            .perform_outgoing(invocation, &chain, &self.opener)
            .await
        {
            invocation.set_exception(err);
        }
        if !invocation.is_resolved() {
            warn!(id = invocation.id, "semantic plug-in returned without an outcome");
            invocation.set_exception(WeftError::internal(
                "semantic plug-in set neither result nor exception",
            ));
        }
    }
}

#[async_trait]
impl InboundDispatcher for InvocationBroker {
    /// Route an inbound invocation to its registered handler
    ///
    /// Unknown targets and malformed invocations get an exception attached
    /// and travel back to the remote caller; they never crash the local
    /// system.
    async fn dispatch(&self, invocation: &mut Invocation, chain: &SessionChain) {
        let Some(target) = invocation.target else {
            invocation.set_exception(WeftError::dispatch("inbound invocation has no target"));
            return;
        };
        let Some(handler) = self.handlers.lookup(target.object) else {
            debug!(object = %target.object, "no handler registered");
            invocation.set_exception(WeftError::dispatch(format!(
                "no handler registered for {}",
                target.object
            )));
            return;
        };
        handler.handle(invocation, chain).await;
        if !invocation.is_resolved() {
            invocation.set_exception(WeftError::dispatch(format!(
                "handler for {} produced no outcome",
                target.object
            )));
        }
    }
}
