//! Identifier types for systems, objects, and object references
//!
//! A `SystemId` names a device, an `ObjectId` names an addressable endpoint
//! within a device, and a `ReferenceId` pairs the two to name one object
//! instance anywhere in the network.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Byte length of a [`SystemId`], fixed by the handshake wire format
pub const SYSTEM_ID_LEN: usize = 20;

/// Opaque 20-byte identifier of a device
///
/// Immutable once fixed; compared and ordered by byte content. A process
/// normally generates one random id at startup unless an override is
/// supplied through the runtime configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SystemId([u8; SYSTEM_ID_LEN]);

impl SystemId {
    /// Generate a random system id
    pub fn random() -> Self {
        let mut bytes = [0u8; SYSTEM_ID_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; SYSTEM_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; SYSTEM_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "system-{}", hex::encode(self.0))
    }
}

impl From<[u8; SYSTEM_ID_LEN]> for SystemId {
    fn from(bytes: [u8; SYSTEM_ID_LEN]) -> Self {
        Self(bytes)
    }
}

/// Identifier of an addressable endpoint within a system
///
/// Either a well-known id (small non-negative value, no creator, identical
/// meaning on every system) or a locally unique id (negative counter value
/// paired with the creating system, handed out by [`ObjectIdFactory`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    value: i64,
    creator: Option<SystemId>,
}

impl ObjectId {
    /// Create a well-known object id
    ///
    /// Well-known ids carry no creator and denote the same endpoint on
    /// every system.
    pub fn well_known(value: u16) -> Self {
        Self {
            value: i64::from(value),
            creator: None,
        }
    }

    /// Get the numeric value
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Get the creating system, if this is a locally created id
    pub fn creator(&self) -> Option<SystemId> {
        self.creator
    }

    /// Whether this id is well known
    pub fn is_well_known(&self) -> bool {
        self.creator.is_none() && self.value >= 0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.creator {
            Some(creator) => write!(f, "object-{}@{creator}", self.value),
            None => write!(f, "object-{}", self.value),
        }
    }
}

/// Factory handing out process-unique object ids
///
/// Values are strictly decreasing negative numbers paired with the local
/// system id, so ids created on different systems never collide.
#[derive(Debug)]
pub struct ObjectIdFactory {
    system: SystemId,
    counter: AtomicI64,
}

impl ObjectIdFactory {
    /// Create a factory for the given local system
    pub fn new(system: SystemId) -> Self {
        Self {
            system,
            counter: AtomicI64::new(-1),
        }
    }

    /// Hand out the next unique object id
    pub fn next(&self) -> ObjectId {
        let value = self.counter.fetch_sub(1, Ordering::Relaxed);
        ObjectId {
            value,
            creator: Some(self.system),
        }
    }
}

/// Reference to a specific object instance: a (system, object) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceId {
    /// System hosting the object
    pub system: SystemId,
    /// Object within that system
    pub object: ObjectId,
}

impl ReferenceId {
    /// Create a reference id
    pub fn new(system: SystemId, object: ObjectId) -> Self {
        Self { system, object }
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.system, self.object)
    }
}
