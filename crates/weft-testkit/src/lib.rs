//! In-process plug-ins and harnesses for exercising full Weft stacks
//!
//! Everything here runs inside one process: an in-memory transport over
//! `tokio::io::duplex`, a request/response semantic plug-in framing
//! invocations with bincode, trivial modifier plug-ins, a static
//! capability lookup, and a harness wiring complete systems together.
//! Production deployments replace each piece with real plug-ins; the
//! contracts are identical.

#![forbid(unsafe_code)]

pub mod frame;
pub mod harness;
pub mod lookup;
pub mod modifiers;
pub mod network;
pub mod semantic;

pub use harness::{EchoHandler, RecordingHandler, TestSystem};
pub use lookup::StaticCapabilityLookup;
pub use modifiers::{NullCompressionPlugin, XorEncryptionPlugin};
pub use network::{MemoryNetwork, MemoryTransportPlugin};
pub use semantic::RpcSemanticPlugin;
