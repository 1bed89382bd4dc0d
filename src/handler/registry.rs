//! Ordered handler registry with copy-on-write snapshots.
//!
//! The registry owns the handler sequence and implements first-match-wins
//! matching over it. Registration order is authoritative: a handler
//! registered later never wins over an earlier match, which is what makes
//! [`prepend`](HandlerRegistry::prepend) an override mechanism.
//!
//! Mutations never touch the sequence in place. Each one builds a fresh
//! `Arc<[..]>` and swaps it in, so a match operation always iterates the
//! consistent snapshot it started with even if another actor mutates the
//! registry concurrently.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::Handler;
use crate::request::InterceptedRequest;

/// Shared, ordered sequence of registered handlers.
pub struct HandlerRegistry {
    inner: RwLock<Inner>,
}

struct Inner {
    /// The set captured at construction; `reset` restores it.
    baseline: Arc<[Arc<Handler>]>,
    /// The active sequence, replaced wholesale on every mutation.
    active: Arc<[Arc<Handler>]>,
}

impl HandlerRegistry {
    /// Create a registry from a baseline handler set.
    pub fn new(handlers: Vec<Handler>) -> Self {
        let baseline: Arc<[Arc<Handler>]> =
            handlers.into_iter().map(Arc::new).collect::<Vec<_>>().into();
        Self {
            inner: RwLock::new(Inner {
                active: baseline.clone(),
                baseline,
            }),
        }
    }

    /// Append handlers after the existing sequence.
    ///
    /// Appended handlers only see requests nothing earlier matched.
    pub fn use_handlers(&self, handlers: Vec<Handler>) {
        let mut inner = self.write();
        let mut next: Vec<Arc<Handler>> = inner.active.to_vec();
        next.extend(handlers.into_iter().map(Arc::new));
        inner.active = next.into();
    }

    /// Insert handlers ahead of the existing sequence, preserving their
    /// own relative order.
    ///
    /// This is the override mechanism: a prepended handler wins every
    /// request it and an existing handler would both match.
    pub fn prepend(&self, handlers: Vec<Handler>) {
        let mut inner = self.write();
        let mut next: Vec<Arc<Handler>> = handlers.into_iter().map(Arc::new).collect();
        next.extend(inner.active.iter().cloned());
        inner.active = next.into();
    }

    /// Restore the baseline set captured at construction.
    pub fn reset(&self) {
        let mut inner = self.write();
        inner.active = inner.baseline.clone();
    }

    /// Number of active handlers.
    pub fn len(&self) -> usize {
        self.read().active.len()
    }

    /// True if no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.read().active.is_empty()
    }

    /// The current handler sequence as a consistent snapshot.
    pub fn snapshot(&self) -> Arc<[Arc<Handler>]> {
        self.read().active.clone()
    }

    /// Find the first handler whose predicate accepts the request.
    ///
    /// Iterates one snapshot in registration order; `None` means no
    /// handler matched and the transport's unhandled-request policy
    /// applies.
    pub async fn match_request(&self, request: &InterceptedRequest) -> Option<Arc<Handler>> {
        let snapshot = self.snapshot();
        for handler in snapshot.iter() {
            if handler.matches(request).await {
                return Some(handler.clone());
            }
        }
        None
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.len())
            .finish()
    }
}
