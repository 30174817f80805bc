//! The invocation descriptor threaded through a whole call
//!
//! One [`Invocation`] instance describes a call from creation on the caller
//! side through dispatch on the callee side and back. It is mutated in
//! place: the broker assigns its identifier, the semantic plug-in fills in
//! the result or exception, the remote handler writes the return value.

use crate::error::WeftError;
use crate::ids::ReferenceId;
use crate::requirements::RequirementCollection;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag of an invocation message
///
/// Values up to [`InvocationKind::USER_BASE`] are reserved for the core;
/// applications may define their own kinds above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationKind(pub u16);

impl InvocationKind {
    /// Freshly created, not yet classified
    pub const UNDEFINED: InvocationKind = InvocationKind(0);
    /// Outbound call carrying arguments
    pub const INVOKE: InvocationKind = InvocationKind(1);
    /// Reply carrying a result or exception
    pub const RESULT: InvocationKind = InvocationKind(2);
    /// Request to remove a remote registration
    pub const REMOVE: InvocationKind = InvocationKind(3);
    /// First tag value available to applications
    pub const USER_BASE: InvocationKind = InvocationKind(16);

    /// Whether this tag lies in the reserved core range
    pub fn is_reserved(&self) -> bool {
        self.0 < Self::USER_BASE.0
    }
}

impl fmt::Display for InvocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UNDEFINED => f.write_str("undefined"),
            Self::INVOKE => f.write_str("invoke"),
            Self::RESULT => f.write_str("result"),
            Self::REMOVE => f.write_str("remove"),
            Self(other) => write!(f, "user-{other}"),
        }
    }
}

/// The call descriptor
///
/// Arguments and the result are opaque byte payloads; encoding them is the
/// business of the serialization layer and the application, never of this
/// core. The identifier is assigned exactly once, by the first broker that
/// sends the invocation, and never changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    /// Process-unique identifier, assigned once by the broker
    pub id: Option<i32>,
    /// Calling object
    pub source: Option<ReferenceId>,
    /// Called object
    pub target: Option<ReferenceId>,
    /// Method signature string
    pub signature: String,
    /// Opaque argument payloads
    pub arguments: Vec<Vec<u8>>,
    /// Opaque result payload, set by the callee side
    pub result: Option<Vec<u8>>,
    /// Message type tag
    pub kind: InvocationKind,
    /// Failure that ended the call, if any
    pub exception: Option<WeftError>,
    /// Per-layer constraints for stack composition
    pub requirements: Option<RequirementCollection>,
}

impl Invocation {
    /// Create a call descriptor for the given endpoints and signature
    pub fn new(source: ReferenceId, target: ReferenceId, signature: impl Into<String>) -> Self {
        Self {
            id: None,
            source: Some(source),
            target: Some(target),
            signature: signature.into(),
            arguments: Vec::new(),
            result: None,
            kind: InvocationKind::INVOKE,
            exception: None,
            requirements: None,
        }
    }

    /// Append an opaque argument payload
    pub fn push_argument(&mut self, payload: Vec<u8>) {
        self.arguments.push(payload);
    }

    /// Record the result, clearing any previous exception
    pub fn set_result(&mut self, payload: Vec<u8>) {
        self.result = Some(payload);
        self.exception = None;
    }

    /// Record the exception that ended the call, clearing any previous
    /// result so the call never carries both outcomes
    pub fn set_exception(&mut self, exception: WeftError) {
        self.exception = Some(exception);
        self.result = None;
    }

    /// Whether the call has reached an outcome
    ///
    /// A finished call carries exactly one of result or exception; a late
    /// failure after a result replaces it.
    pub fn is_resolved(&self) -> bool {
        self.result.is_some() || self.exception.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ObjectId, SystemId};

    fn reference() -> ReferenceId {
        ReferenceId::new(SystemId::random(), ObjectId::well_known(1))
    }

    #[test]
    fn new_invocation_is_unresolved() {
        let invocation = Invocation::new(reference(), reference(), "echo(bytes)");
        assert!(invocation.id.is_none());
        assert!(!invocation.is_resolved());
        assert_eq!(invocation.kind, InvocationKind::INVOKE);
    }

    #[test]
    fn result_resolves_and_clears_exception() {
        let mut invocation = Invocation::new(reference(), reference(), "echo(bytes)");
        invocation.set_exception(WeftError::dispatch("transient"));
        invocation.set_result(vec![1, 2, 3]);
        assert!(invocation.is_resolved());
        assert!(invocation.exception.is_none());
        assert_eq!(invocation.result.as_deref(), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn exception_resolves_and_clears_result() {
        let mut invocation = Invocation::new(reference(), reference(), "echo(bytes)");
        invocation.set_result(vec![1, 2, 3]);
        invocation.set_exception(WeftError::plugin("late failure"));
        assert!(invocation.is_resolved());
        assert!(invocation.result.is_none());
        assert!(invocation.exception.is_some());
    }

    #[test]
    fn core_kinds_are_reserved() {
        assert!(InvocationKind::INVOKE.is_reserved());
        assert!(InvocationKind::REMOVE.is_reserved());
        assert!(!InvocationKind(16).is_reserved());
        assert_eq!(InvocationKind(40).to_string(), "user-40");
    }
}
