//! Call-completion disciplines built on the broker's `invoke` primitive
//!
//! All three helpers run the same primitive and differ only in the default
//! requirement profile and in where the call executes: synchronous and
//! one-way calls run inline on the caller's task, deferred calls run on a
//! pooled task and hand the caller a [`CallFuture`] immediately. Each
//! helper can bracket the call with temporary capability advertisement at
//! the target's registry, released when the call finishes.

use crate::broker::InvocationBroker;
use crate::future::{CallFuture, CallResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;
use weft_core::{
    Invocation, PluginDescription, RequirementCollection, SystemId, WeftError, WeftResult,
};

/// Write access to a capability registry (external collaborator)
#[async_trait]
pub trait CapabilityAdvertiser: Send + Sync {
    /// Advertise extra descriptions for a system
    async fn advertise(
        &self,
        system: SystemId,
        descriptions: &[PluginDescription],
    ) -> WeftResult<()>;

    /// Withdraw previously advertised descriptions
    async fn withdraw(
        &self,
        system: SystemId,
        descriptions: &[PluginDescription],
    ) -> WeftResult<()>;
}

/// Scoped advertise-for-this-call-only registration
///
/// Withdraws its descriptions when released. Dropping without an explicit
/// release withdraws on a pooled task, so the registration cannot leak
/// even when the bracketed call errors.
pub struct TemporaryRegistration {
    advertiser: Arc<dyn CapabilityAdvertiser>,
    system: SystemId,
    descriptions: Vec<PluginDescription>,
    released: bool,
}

impl TemporaryRegistration {
    /// Advertise the descriptions and return the guard
    pub async fn register(
        advertiser: Arc<dyn CapabilityAdvertiser>,
        system: SystemId,
        descriptions: Vec<PluginDescription>,
    ) -> WeftResult<Self> {
        advertiser.advertise(system, &descriptions).await?;
        Ok(Self {
            advertiser,
            system,
            descriptions,
            released: false,
        })
    }

    /// Withdraw the descriptions now
    pub async fn release(mut self) -> WeftResult<()> {
        self.released = true;
        self.advertiser
            .withdraw(self.system, &self.descriptions)
            .await
    }
}

impl Drop for TemporaryRegistration {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let advertiser = self.advertiser.clone();
        let system = self.system;
        let descriptions = std::mem::take(&mut self.descriptions);
        tokio::spawn(async move {
            if let Err(err) = advertiser.withdraw(system, &descriptions).await {
                warn!(error = %err, "failed to withdraw temporary capability registration");
            }
        });
    }
}

/// Temporary advertisement attached to a call helper
#[derive(Clone)]
struct Bracket {
    advertiser: Arc<dyn CapabilityAdvertiser>,
    descriptions: Vec<PluginDescription>,
}

impl Bracket {
    async fn enter(&self, target: SystemId) -> WeftResult<TemporaryRegistration> {
        TemporaryRegistration::register(
            self.advertiser.clone(),
            target,
            self.descriptions.clone(),
        )
        .await
    }
}

async fn bracketed_invoke(
    broker: &InvocationBroker,
    bracket: Option<&Bracket>,
    invocation: &mut Invocation,
) {
    let guard = match bracket {
        Some(bracket) => {
            let Some(target) = invocation.target else {
                invocation.set_exception(WeftError::malformed("invocation has no target"));
                return;
            };
            match bracket.enter(target.system).await {
                Ok(guard) => Some(guard),
                Err(err) => {
                    invocation.set_exception(err);
                    return;
                }
            }
        }
        None => None,
    };

    broker.invoke(invocation).await;

    if let Some(guard) = guard {
        if let Err(err) = guard.release().await {
            warn!(error = %err, "temporary registration release failed");
        }
    }
}

/// Blocking request/response discipline
///
/// Runs `invoke` inline on the caller's task and returns the wrapped
/// result as soon as the invocation carries an outcome.
#[derive(Clone)]
pub struct SynchronousCall {
    broker: Arc<InvocationBroker>,
    bracket: Option<Bracket>,
}

impl SynchronousCall {
    /// Create the helper
    pub fn new(broker: Arc<InvocationBroker>) -> Self {
        Self {
            broker,
            bracket: None,
        }
    }

    /// Advertise extra descriptions at the target for the duration of
    /// each call made through this helper
    pub fn with_temporary(
        mut self,
        advertiser: Arc<dyn CapabilityAdvertiser>,
        descriptions: Vec<PluginDescription>,
    ) -> Self {
        self.bracket = Some(Bracket {
            advertiser,
            descriptions,
        });
        self
    }

    /// Run the call to completion
    pub async fn invoke(&self, mut invocation: Invocation) -> CallResult {
        invocation
            .requirements
            .get_or_insert_with(RequirementCollection::synchronous);
        bracketed_invoke(&self.broker, self.bracket.as_ref(), &mut invocation).await;
        CallResult::from_invocation(&invocation)
    }
}

/// Fire-and-forget discipline
///
/// Invokes the broker inline exactly like the synchronous helper; the
/// no-reply behavior is realized by the semantic plug-in selected through
/// the one-way requirement profile, not by different blocking here.
#[derive(Clone)]
pub struct OnewayCall {
    broker: Arc<InvocationBroker>,
    bracket: Option<Bracket>,
}

impl OnewayCall {
    /// Create the helper
    pub fn new(broker: Arc<InvocationBroker>) -> Self {
        Self {
            broker,
            bracket: None,
        }
    }

    /// Advertise extra descriptions at the target for the duration of
    /// each call made through this helper
    pub fn with_temporary(
        mut self,
        advertiser: Arc<dyn CapabilityAdvertiser>,
        descriptions: Vec<PluginDescription>,
    ) -> Self {
        self.bracket = Some(Bracket {
            advertiser,
            descriptions,
        });
        self
    }

    /// Send the call; the result only acknowledges the send
    pub async fn invoke(&self, mut invocation: Invocation) -> CallResult {
        invocation
            .requirements
            .get_or_insert_with(RequirementCollection::one_way);
        bracketed_invoke(&self.broker, self.bracket.as_ref(), &mut invocation).await;
        CallResult::from_invocation(&invocation)
    }
}

/// Deferred discipline: the call runs on the operation pool
#[derive(Clone)]
pub struct DeferredCall {
    broker: Arc<InvocationBroker>,
    bracket: Option<Bracket>,
}

impl DeferredCall {
    /// Create the helper
    pub fn new(broker: Arc<InvocationBroker>) -> Self {
        Self {
            broker,
            bracket: None,
        }
    }

    /// Advertise extra descriptions at the target for the duration of
    /// each call made through this helper
    pub fn with_temporary(
        mut self,
        advertiser: Arc<dyn CapabilityAdvertiser>,
        descriptions: Vec<PluginDescription>,
    ) -> Self {
        self.bracket = Some(Bracket {
            advertiser,
            descriptions,
        });
        self
    }

    /// Submit the call and return its future immediately
    ///
    /// Abandoning the future does not cancel the in-flight call; once
    /// submitted it runs to completion on the pool.
    pub fn invoke(&self, mut invocation: Invocation) -> CallFuture {
        invocation
            .requirements
            .get_or_insert_with(RequirementCollection::deferred);
        let future = CallFuture::pending();
        let completion = future.clone();
        let broker = self.broker.clone();
        let bracket = self.bracket.clone();
        tokio::spawn(async move {
            bracketed_invoke(&broker, bracket.as_ref(), &mut invocation).await;
            completion.complete(CallResult::from_invocation(&invocation));
        });
        future
    }
}
