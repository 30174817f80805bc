//! Per-layer requirement collections steering stack composition
//!
//! Callers attach a [`RequirementCollection`] to an invocation to constrain
//! which plug-ins may serve each pipeline layer. The collection is plain
//! data; the composer interprets it. `Clone` is the copy-on-branch
//! primitive: every candidate attempt during composition receives its own
//! mutable copy, so a failed branch can never contaminate a sibling.

use crate::plugin::{Ability, LayerKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Requirement dimension on the semantic layer selecting the exchange mode
pub const DIMENSION_MODE: &str = "mode";

/// Mode value for request/response exchanges
pub const MODE_TWO_WAY: &str = "twoway";

/// Mode value for fire-and-forget exchanges
pub const MODE_ONE_WAY: &str = "oneway";

/// Constraints on a single pipeline layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRequirement {
    /// Composition fails outright if no candidate for this layer succeeds
    pub mandatory: bool,
    /// Pin the layer to exactly this ability
    pub required_ability: Option<Ability>,
    /// Free-form named dimensions interpreted by plug-ins
    pub dimensions: BTreeMap<String, String>,
}

/// Caller-supplied, per-layer constraints consumed by composition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementCollection {
    layers: BTreeMap<LayerKind, LayerRequirement>,
}

impl RequirementCollection {
    /// Create an empty collection: every layer optional, nothing pinned
    pub fn new() -> Self {
        Self::default()
    }

    /// Default profile for synchronous request/response calls
    ///
    /// Semantic and transport layers are mandatory; the semantic layer is
    /// asked for a two-way exchange. Everything else is optional.
    pub fn synchronous() -> Self {
        let mut collection = Self::new();
        collection.set_mandatory(LayerKind::Semantic, true);
        collection.set_mandatory(LayerKind::Transport, true);
        collection.set_dimension(LayerKind::Semantic, DIMENSION_MODE, MODE_TWO_WAY);
        collection
    }

    /// Default profile for one-way calls
    ///
    /// Identical to [`RequirementCollection::synchronous`] except the
    /// semantic layer is asked for a one-way exchange; the selected
    /// semantic plug-in realizes the no-reply behavior.
    pub fn one_way() -> Self {
        let mut collection = Self::synchronous();
        collection.set_dimension(LayerKind::Semantic, DIMENSION_MODE, MODE_ONE_WAY);
        collection
    }

    /// Default profile for deferred calls
    ///
    /// The exchange itself is a plain two-way call; the deferral lives in
    /// where the call executes, not in the stack.
    pub fn deferred() -> Self {
        Self::synchronous()
    }

    /// Constraints recorded for a layer, if any
    pub fn layer(&self, kind: LayerKind) -> Option<&LayerRequirement> {
        self.layers.get(&kind)
    }

    /// Mutable constraints for a layer, created on first touch
    pub fn layer_mut(&mut self, kind: LayerKind) -> &mut LayerRequirement {
        self.layers.entry(kind).or_default()
    }

    /// Whether composition must bind a plug-in for this layer
    pub fn is_mandatory(&self, kind: LayerKind) -> bool {
        self.layers.get(&kind).is_some_and(|layer| layer.mandatory)
    }

    /// Mark a layer mandatory or optional
    pub fn set_mandatory(&mut self, kind: LayerKind, mandatory: bool) {
        self.layer_mut(kind).mandatory = mandatory;
    }

    /// The ability this layer is pinned to, if any
    pub fn required_ability(&self, kind: LayerKind) -> Option<Ability> {
        self.layers.get(&kind).and_then(|layer| layer.required_ability)
    }

    /// Pin a layer to exactly one ability
    pub fn require_ability(&mut self, kind: LayerKind, ability: Ability) {
        self.layer_mut(kind).required_ability = Some(ability);
    }

    /// Read a named dimension on a layer
    pub fn dimension(&self, kind: LayerKind, name: &str) -> Option<&str> {
        self.layers
            .get(&kind)
            .and_then(|layer| layer.dimensions.get(name))
            .map(String::as_str)
    }

    /// Set a named dimension on a layer
    pub fn set_dimension(
        &mut self,
        kind: LayerKind,
        name: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.layer_mut(kind).dimensions.insert(name.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloned_copies_do_not_alias() {
        let mut original = RequirementCollection::synchronous();
        let mut branch = original.clone();
        branch.require_ability(LayerKind::Transport, Ability::new(0x0601));
        branch.set_mandatory(LayerKind::Compression, true);

        assert_eq!(original.required_ability(LayerKind::Transport), None);
        assert!(!original.is_mandatory(LayerKind::Compression));

        original.set_dimension(LayerKind::Semantic, "window", "16");
        assert_eq!(branch.dimension(LayerKind::Semantic, "window"), None);
    }

    #[test]
    fn profiles_differ_only_in_mode() {
        let sync = RequirementCollection::synchronous();
        let oneway = RequirementCollection::one_way();
        assert_eq!(
            sync.dimension(LayerKind::Semantic, DIMENSION_MODE),
            Some(MODE_TWO_WAY)
        );
        assert_eq!(
            oneway.dimension(LayerKind::Semantic, DIMENSION_MODE),
            Some(MODE_ONE_WAY)
        );
        assert!(oneway.is_mandatory(LayerKind::Semantic));
        assert!(oneway.is_mandatory(LayerKind::Transport));
        assert!(!oneway.is_mandatory(LayerKind::Routing));
    }

    #[test]
    fn untouched_layers_are_optional() {
        let collection = RequirementCollection::new();
        assert!(!collection.is_mandatory(LayerKind::Encryption));
        assert_eq!(collection.layer(LayerKind::Encryption), None);
    }
}
