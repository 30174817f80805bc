//! Single-assignment completion box for deferred calls
//!
//! A [`CallFuture`] is completed at most once and read by any number of
//! clones. Waiters block in an await loop until availability is observed;
//! a waiter arriving after completion returns immediately. Listeners fire
//! exactly once, immediately when registered after completion.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::warn;
use weft_core::{Invocation, WeftError, WeftResult};

/// Immutable outcome of a finished call: value or exception
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallResult {
    value: Option<Vec<u8>>,
    exception: Option<WeftError>,
}

impl CallResult {
    /// Wrap a successful result payload
    pub fn ok(value: Vec<u8>) -> Self {
        Self {
            value: Some(value),
            exception: None,
        }
    }

    /// Wrap a failure
    pub fn err(exception: WeftError) -> Self {
        Self {
            value: None,
            exception: Some(exception),
        }
    }

    /// Capture the outcome of a finished invocation
    ///
    /// An invocation that somehow finished without either outcome yields
    /// an internal exception; nothing is silently dropped.
    pub fn from_invocation(invocation: &Invocation) -> Self {
        if let Some(exception) = &invocation.exception {
            Self::err(exception.clone())
        } else if let Some(value) = &invocation.result {
            Self::ok(value.clone())
        } else {
            Self::err(WeftError::internal(
                "invocation finished without result or exception",
            ))
        }
    }

    /// The result payload, if the call succeeded
    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    /// The failure, if the call failed
    pub fn exception(&self) -> Option<&WeftError> {
        self.exception.as_ref()
    }

    /// Whether the call succeeded
    pub fn is_ok(&self) -> bool {
        self.exception.is_none()
    }

    /// Convert into a plain `Result`
    pub fn into_result(self) -> WeftResult<Vec<u8>> {
        match self.exception {
            Some(exception) => Err(exception),
            None => Ok(self.value.unwrap_or_default()),
        }
    }
}

type CompletionListener = Box<dyn FnOnce(&CallResult) + Send>;

struct FutureState {
    result: Option<CallResult>,
    listeners: Vec<CompletionListener>,
}

struct Shared {
    state: Mutex<FutureState>,
    available: Notify,
}

/// Single-assignment, multi-reader box around a [`CallResult`]
#[derive(Clone)]
pub struct CallFuture {
    shared: Arc<Shared>,
}

impl CallFuture {
    /// Create a pending future
    pub fn pending() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(FutureState {
                    result: None,
                    listeners: Vec::new(),
                }),
                available: Notify::new(),
            }),
        }
    }

    /// Create a future that is already complete
    pub fn ready(result: CallResult) -> Self {
        let future = Self::pending();
        future.complete(result);
        future
    }

    /// Complete the future, waking waiters and firing listeners
    ///
    /// Returns `false` (and changes nothing) if the value was already set.
    pub fn complete(&self, result: CallResult) -> bool {
        let listeners = {
            let mut state = self.shared.state.lock();
            if state.result.is_some() {
                warn!("ignoring second completion of a call future");
                return false;
            }
            state.result = Some(result.clone());
            std::mem::take(&mut state.listeners)
        };
        for listener in listeners {
            listener(&result);
        }
        self.shared.available.notify_waiters();
        true
    }

    /// The result, if available
    pub fn try_get(&self) -> Option<CallResult> {
        self.shared.state.lock().result.clone()
    }

    /// Whether the value has been set
    pub fn is_available(&self) -> bool {
        self.shared.state.lock().result.is_some()
    }

    /// Wait until the result is available
    ///
    /// Never suspends once availability has been observed.
    pub async fn wait(&self) -> CallResult {
        loop {
            let notified = self.shared.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(result) = self.try_get() {
                return result;
            }
            notified.await;
        }
    }

    /// Register a completion listener
    ///
    /// Fires exactly once: immediately when the value is already set,
    /// otherwise at completion time, never earlier than the value.
    pub fn on_complete(&self, listener: impl FnOnce(&CallResult) + Send + 'static) {
        let mut state = self.shared.state.lock();
        match state.result.clone() {
            Some(result) => {
                drop(state);
                listener(&result);
            }
            None => state.listeners.push(Box::new(listener)),
        }
    }
}

impl Default for CallFuture {
    fn default() -> Self {
        Self::pending()
    }
}
