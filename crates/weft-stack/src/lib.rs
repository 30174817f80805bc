//! Stack composition for the Weft middleware
//!
//! This crate turns a caller's requirement collection and the capability
//! inventories of two devices into a working protocol stack:
//!
//! - [`session`] — per-call, per-layer negotiated state forming the chain
//! - [`strategy`] — pluggable candidate ordering for composition
//! - [`plugin`] — the per-layer plug-in contracts and the local registry
//! - [`composer`] — the recursive backtracking layer binder
//! - [`handshake`] — the fixed binary header that lets the peer rebuild an
//!   equivalent chain
//! - [`opener`] — bottom-up physical stack construction on both ends

#![forbid(unsafe_code)]

pub mod composer;
pub mod connector;
pub mod handshake;
pub mod opener;
pub mod plugin;
pub mod session;
pub mod strategy;

pub use composer::Composer;
pub use connector::{BoxConnector, Connector};
pub use handshake::{read_handshake, write_handshake};
pub use opener::{AcceptedStack, StackAcceptor, StackOpener};
pub use plugin::{
    CapabilityLookup, InboundDispatcher, ModifierPlugin, PluginHandle, PluginRegistry,
    SemanticPlugin, StackPlugin, TransportPlugin,
};
pub use session::{Direction, SessionChain, SessionState};
pub use strategy::{PassthroughStrategy, SelectionStrategy};
