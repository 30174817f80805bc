//! Candidate selection strategies for composition
//!
//! The composer delegates ordering and filtering of the per-layer
//! candidate set to a strategy. The default strategy passes candidates
//! through unchanged; ranking by QoS policy is an extension point.

use weft_core::{LayerKind, PluginDescription, RequirementCollection};

/// Per-layer candidate ordering and filtering policy
pub trait SelectionStrategy: Send + Sync {
    /// Order (and optionally drop) the candidates the composer will try
    /// for one layer, most preferred first
    fn order(
        &self,
        kind: LayerKind,
        candidates: Vec<PluginDescription>,
        requirements: &RequirementCollection,
    ) -> Vec<PluginDescription>;
}

/// Default strategy: candidates pass through unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughStrategy;

impl SelectionStrategy for PassthroughStrategy {
    fn order(
        &self,
        _kind: LayerKind,
        candidates: Vec<PluginDescription>,
        _requirements: &RequirementCollection,
    ) -> Vec<PluginDescription> {
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::Ability;

    #[test]
    fn passthrough_preserves_order() {
        let candidates = vec![
            PluginDescription::new(Ability::new(0x0601), LayerKind::Transport),
            PluginDescription::new(Ability::new(0x0600), LayerKind::Transport),
        ];
        let ordered = PassthroughStrategy.order(
            LayerKind::Transport,
            candidates.clone(),
            &RequirementCollection::new(),
        );
        assert_eq!(ordered, candidates);
    }
}
