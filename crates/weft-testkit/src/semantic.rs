//! Request/response semantic plug-in
//!
//! The head of every testkit stack. Outbound, it opens the composed stack,
//! writes the invocation as one frame, and reads the reply frame unless
//! the caller asked for a one-way exchange. Inbound, it reads the frame,
//! feeds the invocation to the dispatcher, and replies when the caller
//! expects one. The exchange mode travels to the peer inside the semantic
//! layer's handshake payload, so both ends agree without prior
//! arrangement.

use crate::frame::{read_frame, write_frame};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, trace};
use weft_core::{
    requirements::{DIMENSION_MODE, MODE_ONE_WAY},
    Ability, Invocation, InvocationKind, LayerKind, PluginDescription, RequirementCollection,
    WeftResult,
};
use weft_stack::{
    BoxConnector, InboundDispatcher, SemanticPlugin, SessionChain, SessionState, StackOpener,
    StackPlugin,
};

/// Default ability of the request/response semantic plug-in
pub const RPC_SEMANTIC_ABILITY: Ability = Ability(0x0101);

const MODE_BYTE_TWO_WAY: u8 = 0;
const MODE_BYTE_ONE_WAY: u8 = 1;

/// Semantic plug-in speaking framed request/response
pub struct RpcSemanticPlugin {
    ability: Ability,
}

impl RpcSemanticPlugin {
    /// Create the plug-in with the default ability
    pub fn new() -> Self {
        Self::with_ability(RPC_SEMANTIC_ABILITY)
    }

    /// Create the plug-in under a custom semantic ability
    pub fn with_ability(ability: Ability) -> Self {
        Self { ability }
    }

    fn is_one_way(session: &SessionState) -> bool {
        session.remote.as_deref() == Some(&[MODE_BYTE_ONE_WAY])
    }
}

impl Default for RpcSemanticPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StackPlugin for RpcSemanticPlugin {
    fn description(&self) -> PluginDescription {
        PluginDescription::new(self.ability, LayerKind::Semantic)
            .with_property("exchange", "request-response")
    }

    async fn prepare_session(
        &self,
        requirements: &mut RequirementCollection,
        session: &mut SessionState,
    ) -> WeftResult<bool> {
        let one_way =
            requirements.dimension(LayerKind::Semantic, DIMENSION_MODE) == Some(MODE_ONE_WAY);
        let mode = if one_way {
            MODE_BYTE_ONE_WAY
        } else {
            MODE_BYTE_TWO_WAY
        };
        // the peer learns the exchange mode from the handshake payload
        session.remote = Some(vec![mode]);
        Ok(true)
    }
}

#[async_trait]
impl SemanticPlugin for RpcSemanticPlugin {
    async fn perform_outgoing(
        &self,
        invocation: &mut Invocation,
        chain: &SessionChain,
        opener: &StackOpener,
    ) -> WeftResult<()> {
        let mut connector = opener.open(chain).await?;
        write_frame(&mut connector, invocation).await?;

        if Self::is_one_way(chain.head()) {
            trace!(id = invocation.id, "one-way frame sent");
            invocation.set_result(Vec::new());
            return Ok(());
        }

        let reply = read_frame(&mut connector).await?;
        trace!(id = invocation.id, kind = %reply.kind, "reply received");
        match reply.exception {
            Some(exception) => invocation.set_exception(exception),
            None => invocation.set_result(reply.result.unwrap_or_default()),
        }
        Ok(())
    }

    async fn deliver_incoming(
        &self,
        mut connector: BoxConnector,
        chain: SessionChain,
        dispatcher: Arc<dyn InboundDispatcher>,
    ) -> WeftResult<()> {
        let mut invocation = read_frame(&mut connector).await?;
        debug!(
            id = invocation.id,
            signature = %invocation.signature,
            "inbound invocation"
        );
        dispatcher.dispatch(&mut invocation, &chain).await;

        if Self::is_one_way(chain.head()) {
            return Ok(());
        }
        invocation.kind = InvocationKind::RESULT;
        write_frame(&mut connector, &invocation).await
    }
}
