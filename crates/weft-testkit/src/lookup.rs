//! Static capability lookup with mutable inventories
//!
//! Tracks which plug-in descriptions each system advertises and serves
//! the intersection queries the broker needs. Doubles as the capability
//! advertiser for temporary advertise-for-this-call-only registrations.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use weft_core::{PluginDescription, SystemId, WeftResult};
use weft_stack::CapabilityLookup;
use weft_broker::CapabilityAdvertiser;

/// In-process capability registry keyed by system
#[derive(Default)]
pub struct StaticCapabilityLookup {
    inventories: RwLock<HashMap<SystemId, Vec<PluginDescription>>>,
}

impl StaticCapabilityLookup {
    /// Create an empty lookup
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a system's advertised inventory
    pub fn register_system(&self, system: SystemId, descriptions: Vec<PluginDescription>) {
        self.inventories.write().insert(system, descriptions);
    }

    /// Whether a system currently advertises a description
    pub fn advertises(&self, system: SystemId, description: &PluginDescription) -> bool {
        self.inventories
            .read()
            .get(&system)
            .is_some_and(|inventory| inventory.contains(description))
    }
}

#[async_trait]
impl CapabilityLookup for StaticCapabilityLookup {
    async fn compatible_plugins(
        &self,
        source: SystemId,
        target: SystemId,
    ) -> WeftResult<Vec<PluginDescription>> {
        let inventories = self.inventories.read();
        let source_inventory = inventories.get(&source).cloned().unwrap_or_default();
        let empty = Vec::new();
        let target_inventory = inventories.get(&target).unwrap_or(&empty);
        // source order is preserved, keeping composition deterministic
        Ok(source_inventory
            .into_iter()
            .filter(|description| {
                target_inventory
                    .iter()
                    .any(|peer| peer.kind == description.kind && peer.ability == description.ability)
            })
            .collect())
    }

    async fn inventory(&self, system: SystemId) -> WeftResult<Vec<PluginDescription>> {
        Ok(self
            .inventories
            .read()
            .get(&system)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl CapabilityAdvertiser for StaticCapabilityLookup {
    async fn advertise(
        &self,
        system: SystemId,
        descriptions: &[PluginDescription],
    ) -> WeftResult<()> {
        let mut inventories = self.inventories.write();
        let inventory = inventories.entry(system).or_default();
        inventory.extend_from_slice(descriptions);
        Ok(())
    }

    async fn withdraw(
        &self,
        system: SystemId,
        descriptions: &[PluginDescription],
    ) -> WeftResult<()> {
        let mut inventories = self.inventories.write();
        if let Some(inventory) = inventories.get_mut(&system) {
            for description in descriptions {
                if let Some(position) = inventory.iter().position(|entry| entry == description) {
                    inventory.remove(position);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::{Ability, LayerKind};

    fn description(ability: u16, kind: LayerKind) -> PluginDescription {
        PluginDescription::new(Ability::new(ability), kind)
    }

    #[tokio::test]
    async fn intersection_keeps_shared_abilities_in_source_order() {
        let lookup = StaticCapabilityLookup::new();
        let a = SystemId::random();
        let b = SystemId::random();
        lookup.register_system(
            a,
            vec![
                description(0x0101, LayerKind::Semantic),
                description(0x0301, LayerKind::Compression),
                description(0x0600, LayerKind::Transport),
            ],
        );
        lookup.register_system(
            b,
            vec![
                description(0x0600, LayerKind::Transport),
                description(0x0101, LayerKind::Semantic),
            ],
        );

        let compatible = lookup.compatible_plugins(a, b).await.unwrap();
        let abilities: Vec<u16> = compatible.iter().map(|d| d.ability.code()).collect();
        assert_eq!(abilities, vec![0x0101, 0x0600]);
    }

    #[tokio::test]
    async fn advertise_and_withdraw_bracket_an_inventory() {
        let lookup = StaticCapabilityLookup::new();
        let system = SystemId::random();
        let extra = description(0x0401, LayerKind::Encryption);

        lookup.advertise(system, &[extra.clone()]).await.unwrap();
        assert!(lookup.advertises(system, &extra));
        lookup.withdraw(system, &[extra.clone()]).await.unwrap();
        assert!(!lookup.advertises(system, &extra));
    }
}
