//! Recursive backtracking stack composition
//!
//! The composer binds one plug-in per pipeline layer into a session chain,
//! walking the fixed layer order head to tail. At each layer it filters
//! the compatible-set snapshot to the current kind, honors a pinned
//! ability if the requirements carry one, lets the selection strategy
//! order the survivors, and tries candidates in turn. Every attempt owns a
//! fresh requirement copy and a fresh session, so a failed branch never
//! contaminates a sibling. A mandatory layer with no surviving candidate
//! fails the whole composition; an optional one is skipped.

use crate::plugin::PluginRegistry;
use crate::session::{Direction, SessionChain, SessionState};
use crate::strategy::SelectionStrategy;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tracing::{debug, trace};
use weft_core::{LayerKind, PluginDescription, RequirementCollection, SystemId, WeftResult};

/// The recursive layer binder
pub struct Composer {
    registry: Arc<PluginRegistry>,
    strategy: Arc<dyn SelectionStrategy>,
}

impl Composer {
    /// Create a composer over the local plug-in registry
    pub fn new(registry: Arc<PluginRegistry>, strategy: Arc<dyn SelectionStrategy>) -> Self {
        Self { registry, strategy }
    }

    /// Compose an outgoing chain for a call to `target`
    ///
    /// `compatible` is the snapshot of plug-in descriptions present on
    /// both ends. Returns `Ok(None)` when no chain satisfying every
    /// mandatory layer exists; hard errors are reserved for registry
    /// inconsistencies.
    pub async fn compose(
        &self,
        start: LayerKind,
        target: SystemId,
        compatible: &[PluginDescription],
        requirements: &RequirementCollection,
    ) -> WeftResult<Option<SessionChain>> {
        match self.compose_layer(start, target, compatible, requirements).await? {
            Some(nodes) => {
                debug!(
                    target_system = %target,
                    layers = nodes.len(),
                    "composed protocol stack"
                );
                SessionChain::outgoing(nodes).map(Some)
            }
            None => {
                debug!(target_system = %target, "no satisfiable protocol stack");
                Ok(None)
            }
        }
    }

    /// Bind this layer and everything below it, returning the node list
    /// tail-up, or `None` when the subtree cannot be satisfied
    fn compose_layer<'a>(
        &'a self,
        kind: LayerKind,
        target: SystemId,
        compatible: &'a [PluginDescription],
        requirements: &'a RequirementCollection,
    ) -> BoxFuture<'a, WeftResult<Option<Vec<SessionState>>>> {
        async move {
            let mut candidates: Vec<PluginDescription> = compatible
                .iter()
                .filter(|description| description.kind == kind)
                .cloned()
                .collect();
            if let Some(pinned) = requirements.required_ability(kind) {
                candidates.retain(|description| description.ability == pinned);
            }
            let ordered = self.strategy.order(kind, candidates, requirements);

            for description in ordered {
                let Some(handle) = self.registry.get(kind, description.ability) else {
                    trace!(ability = %description.ability, layer = %kind, "advertised but not installed locally");
                    continue;
                };
                let mut branch = requirements.clone();
                let mut session =
                    SessionState::new(kind, description.ability, target, Direction::Outgoing);
                match handle.prepare_session(&mut branch, &mut session).await {
                    Ok(true) => {}
                    Ok(false) => {
                        trace!(ability = %description.ability, layer = %kind, "candidate declined session");
                        continue;
                    }
                    Err(err) => {
                        // failure isolation at candidate granularity
                        debug!(
                            ability = %description.ability,
                            layer = %kind,
                            error = %err,
                            "candidate prepare failed, trying next"
                        );
                        continue;
                    }
                }

                let Some(next) = kind.next() else {
                    // transport terminates the recursion
                    return Ok(Some(vec![session]));
                };
                match self.compose_layer(next, target, compatible, &branch).await? {
                    Some(mut below) => {
                        below.insert(0, session);
                        return Ok(Some(below));
                    }
                    None => {
                        trace!(
                            ability = %description.ability,
                            layer = %kind,
                            "downstream composition failed, backtracking"
                        );
                    }
                }
            }

            if requirements.is_mandatory(kind) {
                debug!(layer = %kind, "mandatory layer has no workable candidate");
                return Ok(None);
            }
            match kind.next() {
                // optional layer skipped entirely, same requirement state
                Some(next) => self.compose_layer(next, target, compatible, requirements).await,
                None => Ok(None),
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::BoxConnector;
    use crate::plugin::{StackPlugin, TransportPlugin};
    use crate::strategy::PassthroughStrategy;
    use async_trait::async_trait;
    use weft_core::{Ability, WeftError};

    /// Minimal transport stub for exercising the composer
    struct StubTransport {
        ability: Ability,
        behavior: Behavior,
    }

    enum Behavior {
        Accept,
        Decline,
        Fail,
    }

    #[async_trait]
    impl StackPlugin for StubTransport {
        fn description(&self) -> PluginDescription {
            PluginDescription::new(self.ability, LayerKind::Transport)
        }

        async fn prepare_session(
            &self,
            _requirements: &mut RequirementCollection,
            _session: &mut SessionState,
        ) -> WeftResult<bool> {
            match self.behavior {
                Behavior::Accept => Ok(true),
                Behavior::Decline => Ok(false),
                Behavior::Fail => Err(WeftError::plugin("stub transport failure")),
            }
        }
    }

    #[async_trait]
    impl TransportPlugin for StubTransport {
        async fn open(&self, _session: &SessionState) -> WeftResult<BoxConnector> {
            Err(WeftError::plugin("stub transport cannot open"))
        }
    }

    /// Semantic stub that can poison downstream composition by pinning the
    /// transport layer to an ability nobody serves
    struct StubSemantic {
        ability: Ability,
        pin_transport_to: Option<Ability>,
    }

    #[async_trait]
    impl StackPlugin for StubSemantic {
        fn description(&self) -> PluginDescription {
            PluginDescription::new(self.ability, LayerKind::Semantic)
        }

        async fn prepare_session(
            &self,
            requirements: &mut RequirementCollection,
            _session: &mut SessionState,
        ) -> WeftResult<bool> {
            if let Some(pinned) = self.pin_transport_to {
                requirements.require_ability(LayerKind::Transport, pinned);
            }
            Ok(true)
        }
    }

    #[async_trait]
    impl crate::plugin::SemanticPlugin for StubSemantic {
        async fn perform_outgoing(
            &self,
            _invocation: &mut weft_core::Invocation,
            _chain: &SessionChain,
            _opener: &crate::opener::StackOpener,
        ) -> WeftResult<()> {
            Err(WeftError::plugin("stub semantic cannot exchange"))
        }

        async fn deliver_incoming(
            &self,
            _connector: BoxConnector,
            _chain: SessionChain,
            _dispatcher: Arc<dyn crate::plugin::InboundDispatcher>,
        ) -> WeftResult<()> {
            Err(WeftError::plugin("stub semantic cannot deliver"))
        }
    }

    fn target() -> SystemId {
        SystemId::from_bytes([9u8; 20])
    }

    fn composer(registry: PluginRegistry) -> Composer {
        Composer::new(Arc::new(registry), Arc::new(PassthroughStrategy))
    }

    fn descriptions(pairs: &[(LayerKind, u16)]) -> Vec<PluginDescription> {
        pairs
            .iter()
            .map(|(kind, ability)| PluginDescription::new(Ability::new(*ability), *kind))
            .collect()
    }

    fn requirements() -> RequirementCollection {
        RequirementCollection::synchronous()
    }

    #[tokio::test]
    async fn composes_minimal_semantic_transport_chain() {
        let mut registry = PluginRegistry::new();
        registry.register_semantic(Arc::new(StubSemantic {
            ability: Ability::new(0x0101),
            pin_transport_to: None,
        }));
        registry.register_transport(Arc::new(StubTransport {
            ability: Ability::new(0x0600),
            behavior: Behavior::Accept,
        }));
        let compatible = descriptions(&[
            (LayerKind::Semantic, 0x0101),
            (LayerKind::Transport, 0x0600),
        ]);

        let chain = composer(registry)
            .compose(LayerKind::Semantic, target(), &compatible, &requirements())
            .await
            .unwrap()
            .unwrap();

        let abilities: Vec<u16> = chain.nodes().iter().map(|n| n.ability().code()).collect();
        assert_eq!(abilities, vec![0x0101, 0x0600]);
    }

    #[tokio::test]
    async fn backtracks_past_candidate_with_failing_downstream() {
        // C1 prepares fine but pins the transport layer to an ability
        // nobody serves; C2 leaves it open. The chain must come out built
        // on C2 even though C1 is tried first.
        let mut registry = PluginRegistry::new();
        registry.register_semantic(Arc::new(StubSemantic {
            ability: Ability::new(0x0101),
            pin_transport_to: Some(Ability::new(0x06FF)),
        }));
        registry.register_semantic(Arc::new(StubSemantic {
            ability: Ability::new(0x0102),
            pin_transport_to: None,
        }));
        registry.register_transport(Arc::new(StubTransport {
            ability: Ability::new(0x0600),
            behavior: Behavior::Accept,
        }));
        let compatible = descriptions(&[
            (LayerKind::Semantic, 0x0101),
            (LayerKind::Semantic, 0x0102),
            (LayerKind::Transport, 0x0600),
        ]);

        let chain = composer(registry)
            .compose(LayerKind::Semantic, target(), &compatible, &requirements())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(chain.head().ability(), Ability::new(0x0102));
        // the poisoned branch's narrowing must not leak into the winner
        assert_eq!(chain.tail().ability(), Ability::new(0x0600));
    }

    #[tokio::test]
    async fn mandatory_layer_without_candidates_fails_composition() {
        let mut registry = PluginRegistry::new();
        registry.register_semantic(Arc::new(StubSemantic {
            ability: Ability::new(0x0101),
            pin_transport_to: None,
        }));
        registry.register_transport(Arc::new(StubTransport {
            ability: Ability::new(0x0600),
            behavior: Behavior::Accept,
        }));
        let compatible = descriptions(&[
            (LayerKind::Semantic, 0x0101),
            (LayerKind::Transport, 0x0600),
        ]);
        let mut reqs = requirements();
        reqs.set_mandatory(LayerKind::Encryption, true);

        let outcome = composer(registry)
            .compose(LayerKind::Semantic, target(), &compatible, &reqs)
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn optional_layer_without_candidates_is_skipped() {
        let mut registry = PluginRegistry::new();
        registry.register_semantic(Arc::new(StubSemantic {
            ability: Ability::new(0x0101),
            pin_transport_to: None,
        }));
        registry.register_transport(Arc::new(StubTransport {
            ability: Ability::new(0x0600),
            behavior: Behavior::Accept,
        }));
        // compression advertised by nobody; layer must simply not appear
        let compatible = descriptions(&[
            (LayerKind::Semantic, 0x0101),
            (LayerKind::Transport, 0x0600),
        ]);

        let chain = composer(registry)
            .compose(LayerKind::Semantic, target(), &compatible, &requirements())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chain.len(), 2);
        assert!(chain
            .nodes()
            .iter()
            .all(|node| node.kind() != LayerKind::Compression));
    }

    #[tokio::test]
    async fn failing_candidate_is_isolated() {
        // first transport candidate raises, second declines, third works
        let mut registry = PluginRegistry::new();
        registry.register_semantic(Arc::new(StubSemantic {
            ability: Ability::new(0x0101),
            pin_transport_to: None,
        }));
        registry.register_transport(Arc::new(StubTransport {
            ability: Ability::new(0x0600),
            behavior: Behavior::Fail,
        }));
        registry.register_transport(Arc::new(StubTransport {
            ability: Ability::new(0x0601),
            behavior: Behavior::Decline,
        }));
        registry.register_transport(Arc::new(StubTransport {
            ability: Ability::new(0x0602),
            behavior: Behavior::Accept,
        }));
        let compatible = descriptions(&[
            (LayerKind::Semantic, 0x0101),
            (LayerKind::Transport, 0x0600),
            (LayerKind::Transport, 0x0601),
            (LayerKind::Transport, 0x0602),
        ]);

        let chain = composer(registry)
            .compose(LayerKind::Semantic, target(), &compatible, &requirements())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chain.tail().ability(), Ability::new(0x0602));
    }

    #[tokio::test]
    async fn identical_snapshots_compose_identically() {
        let build = || {
            let mut registry = PluginRegistry::new();
            registry.register_semantic(Arc::new(StubSemantic {
                ability: Ability::new(0x0101),
                pin_transport_to: None,
            }));
            registry.register_transport(Arc::new(StubTransport {
                ability: Ability::new(0x0600),
                behavior: Behavior::Accept,
            }));
            registry.register_transport(Arc::new(StubTransport {
                ability: Ability::new(0x0601),
                behavior: Behavior::Accept,
            }));
            composer(registry)
        };
        let compatible = descriptions(&[
            (LayerKind::Semantic, 0x0101),
            (LayerKind::Transport, 0x0601),
            (LayerKind::Transport, 0x0600),
        ]);

        let first = build()
            .compose(LayerKind::Semantic, target(), &compatible, &requirements())
            .await
            .unwrap()
            .unwrap();
        let second = build()
            .compose(LayerKind::Semantic, target(), &compatible, &requirements())
            .await
            .unwrap()
            .unwrap();

        let abilities =
            |chain: &SessionChain| chain.nodes().iter().map(|n| n.ability()).collect::<Vec<_>>();
        assert_eq!(abilities(&first), abilities(&second));
        // passthrough strategy tries snapshot order: 0x0601 first
        assert_eq!(first.tail().ability(), Ability::new(0x0601));
    }

    #[tokio::test]
    async fn pinned_ability_filters_candidates() {
        let mut registry = PluginRegistry::new();
        registry.register_semantic(Arc::new(StubSemantic {
            ability: Ability::new(0x0101),
            pin_transport_to: None,
        }));
        registry.register_transport(Arc::new(StubTransport {
            ability: Ability::new(0x0600),
            behavior: Behavior::Accept,
        }));
        registry.register_transport(Arc::new(StubTransport {
            ability: Ability::new(0x0601),
            behavior: Behavior::Accept,
        }));
        let compatible = descriptions(&[
            (LayerKind::Semantic, 0x0101),
            (LayerKind::Transport, 0x0600),
            (LayerKind::Transport, 0x0601),
        ]);
        let mut reqs = requirements();
        reqs.require_ability(LayerKind::Transport, Ability::new(0x0601));

        let chain = composer(registry)
            .compose(LayerKind::Semantic, target(), &compatible, &reqs)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chain.tail().ability(), Ability::new(0x0601));
    }
}
