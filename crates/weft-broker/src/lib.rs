//! Invocation brokering for the Weft middleware
//!
//! The broker validates calls, assigns identifiers, triggers stack
//! composition, and dispatches inbound calls to registered handlers. On
//! top of its single `invoke` primitive sit the three call-completion
//! disciplines: synchronous, one-way, and deferred-with-future.

#![forbid(unsafe_code)]

pub mod broker;
pub mod calls;
pub mod future;
pub mod handlers;
pub mod runtime;

pub use broker::InvocationBroker;
pub use calls::{
    CapabilityAdvertiser, DeferredCall, OnewayCall, SynchronousCall, TemporaryRegistration,
};
pub use future::{CallFuture, CallResult};
pub use handlers::{HandlerRegistry, InvocationHandler};
pub use runtime::{RuntimeConfig, WeftRuntime};
