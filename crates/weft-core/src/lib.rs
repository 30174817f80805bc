//! Core data model for the Weft middleware
//!
//! Weft lets application code on one device invoke services on another
//! device without knowing which transports, compression, encryption, or
//! routing mechanisms will carry the call. This crate holds the types the
//! rest of the workspace agrees on:
//!
//! - identifiers for systems, objects, and object references
//! - the invocation descriptor threaded through a whole call
//! - per-layer requirement collections that steer stack composition
//! - plug-in descriptions and the fixed layer pipeline
//! - the unified error type

#![forbid(unsafe_code)]

pub mod error;
pub mod ids;
pub mod invocation;
pub mod plugin;
pub mod requirements;

pub use error::{WeftError, WeftResult};
pub use ids::{ObjectId, ObjectIdFactory, ReferenceId, SystemId, SYSTEM_ID_LEN};
pub use invocation::{Invocation, InvocationKind};
pub use plugin::{Ability, LayerKind, PluginDescription};
pub use requirements::{LayerRequirement, RequirementCollection};
