//! Plug-in descriptions and the fixed layer pipeline
//!
//! A protocol stack is assembled from plug-ins, one per pipeline layer.
//! Plug-ins advertise themselves through [`PluginDescription`]s; the
//! [`Ability`] is the cross-device matching key, and its high byte encodes
//! the pipeline layer the plug-in serves.

use crate::{WeftError, WeftResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Numeric identity tag shared by wire-compatible plug-in instances
///
/// The high byte encodes the [`LayerKind`] (`0x01` semantic through `0x06`
/// transport); the low byte distinguishes implementations within a layer.
/// Two plug-ins with the same ability must speak the same wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ability(pub u16);

impl Ability {
    /// Create an ability from its raw code
    pub fn new(code: u16) -> Self {
        Self(code)
    }

    /// Get the raw code
    pub fn code(&self) -> u16 {
        self.0
    }

    /// Decode the pipeline layer from the high byte
    pub fn layer(&self) -> WeftResult<LayerKind> {
        LayerKind::from_code((self.0 >> 8) as u8).ok_or_else(|| {
            WeftError::handshake(format!("ability {self} does not map to a pipeline layer"))
        })
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

impl From<u16> for Ability {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

/// One of the six fixed pipeline roles
///
/// The pipeline order is fixed: semantic at the head, transport at the
/// tail. Each role has zero or more locally installed candidate plug-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayerKind {
    /// Application-facing call semantics (RPC exchange style)
    Semantic,
    /// Payload serialization
    Serialization,
    /// Payload compression
    Compression,
    /// Payload encryption
    Encryption,
    /// Multi-hop routing
    Routing,
    /// Physical transport
    Transport,
}

impl LayerKind {
    /// All layers in pipeline order, head to tail
    pub const PIPELINE: [LayerKind; 6] = [
        LayerKind::Semantic,
        LayerKind::Serialization,
        LayerKind::Compression,
        LayerKind::Encryption,
        LayerKind::Routing,
        LayerKind::Transport,
    ];

    /// Numeric code used in the high byte of an [`Ability`]
    pub fn code(&self) -> u8 {
        match self {
            LayerKind::Semantic => 0x01,
            LayerKind::Serialization => 0x02,
            LayerKind::Compression => 0x03,
            LayerKind::Encryption => 0x04,
            LayerKind::Routing => 0x05,
            LayerKind::Transport => 0x06,
        }
    }

    /// Decode a layer from its numeric code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(LayerKind::Semantic),
            0x02 => Some(LayerKind::Serialization),
            0x03 => Some(LayerKind::Compression),
            0x04 => Some(LayerKind::Encryption),
            0x05 => Some(LayerKind::Routing),
            0x06 => Some(LayerKind::Transport),
            _ => None,
        }
    }

    /// The next layer toward the tail, `None` after transport
    pub fn next(&self) -> Option<Self> {
        match self {
            LayerKind::Semantic => Some(LayerKind::Serialization),
            LayerKind::Serialization => Some(LayerKind::Compression),
            LayerKind::Compression => Some(LayerKind::Encryption),
            LayerKind::Encryption => Some(LayerKind::Routing),
            LayerKind::Routing => Some(LayerKind::Transport),
            LayerKind::Transport => None,
        }
    }

    /// Whether sessions of this layer exchange a remote payload during the
    /// handshake
    ///
    /// Only layers between the head and encryption inclusive carry remote
    /// payloads; routing and transport never do.
    pub fn carries_remote_payload(&self) -> bool {
        matches!(
            self,
            LayerKind::Semantic
                | LayerKind::Serialization
                | LayerKind::Compression
                | LayerKind::Encryption
        )
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerKind::Semantic => "semantic",
            LayerKind::Serialization => "serialization",
            LayerKind::Compression => "compression",
            LayerKind::Encryption => "encryption",
            LayerKind::Routing => "routing",
            LayerKind::Transport => "transport",
        };
        f.write_str(name)
    }
}

/// Advertised description of an installed plug-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescription {
    /// Matching key shared with wire-compatible peers
    pub ability: Ability,
    /// Pipeline layer served by the plug-in
    pub kind: LayerKind,
    /// Free-form advertised properties
    pub properties: BTreeMap<String, String>,
}

impl PluginDescription {
    /// Create a description for the given ability and layer
    pub fn new(ability: Ability, kind: LayerKind) -> Self {
        Self {
            ability,
            kind,
            properties: BTreeMap::new(),
        }
    }

    /// Attach an advertised property
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}
