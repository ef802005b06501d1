//! Interceptor chains
//!
//! Two independent chains run around every call: the request chain mutates
//! the outgoing [`TransportRequest`](crate::transport::TransportRequest)
//! after the pipeline builds it, and the response chain mutates the raw
//! [`TransportResponse`](crate::transport::TransportResponse) before the
//! pipeline inspects it. Callbacks run in registration order; each sees the
//! previous callback's output.
//!
//! The chains are mutable across the client's lifetime, but the pipeline
//! snapshots the order at call time, so a concurrent subscribe or
//! unsubscribe never perturbs an in-flight call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Read-only context handed to every interceptor invocation: the canonical
/// key, resolved method/path and the validated inputs of the call.
#[derive(Debug, Clone)]
pub struct InvokeContext {
    pub key: String,
    pub method: http::Method,
    pub path: String,
    /// Validated inputs keyed by input kind (`query`, `param`, `json`, `form`).
    pub inputs: serde_json::Map<String, serde_json::Value>,
}

/// Detach handle returned by [`Chain::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterceptorHandle {
    id: u64,
}

type Callback<T> = dyn Fn(&InvokeContext, &mut T) + Send + Sync;

/// An ordered, mutable registry of interceptor callbacks over `T`.
pub struct Chain<T> {
    entries: Mutex<Vec<(u64, Arc<Callback<T>>)>>,
    next_id: AtomicU64,
}

impl<T> Default for Chain<T> {
    fn default() -> Self {
        Self { entries: Mutex::new(Vec::new()), next_id: AtomicU64::new(0) }
    }
}

impl<T> Chain<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a callback; it takes effect on subsequent calls, not on
    /// calls already mid-flight.
    pub fn subscribe(&self, callback: impl Fn(&InvokeContext, &mut T) + Send + Sync + 'static) -> InterceptorHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push((id, Arc::new(callback)));
        InterceptorHandle { id }
    }

    /// Removes a callback by its handle. Returns false when the handle was
    /// already detached.
    pub fn unsubscribe(&self, handle: InterceptorHandle) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|(id, _)| *id != handle.id);
        entries.len() != before
    }

    /// Copies the current chain order for one call's execution.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Callback<T>>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().map(|(_, callback)| Arc::clone(callback)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> std::fmt::Debug for Chain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("len", &self.len()).finish()
    }
}
