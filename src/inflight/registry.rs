//! Registry of cancellation handles for requests in flight.

use std::collections::HashMap;
use std::fmt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identity of one admitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Requests that have been sent but not yet resolved.
///
/// Its size is a lower bound on in-flight concurrency.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    pending: HashMap<RequestId, CancellationToken>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: RequestId, token: CancellationToken) {
        self.pending.insert(id, token);
    }

    /// Forget a request once it resolved. Returns false if it was not
    /// registered (already cancelled or never admitted).
    pub fn unregister(&mut self, id: RequestId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Cancel every registered request and clear the registry.
    ///
    /// Cancelling a token whose request already finished does nothing.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        for (_, token) in self.pending.drain() {
            token.cancel();
        }
        count
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_all_on_empty_registry() {
        let mut registry = CancellationRegistry::new();
        assert_eq!(registry.cancel_all(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancel_all_cancels_and_clears() {
        let mut registry = CancellationRegistry::new();
        let tokens: Vec<_> = (0..3)
            .map(|_| {
                let token = CancellationToken::new();
                registry.register(RequestId::new(), token.clone());
                token
            })
            .collect();

        assert_eq!(registry.cancel_all(), 3);
        assert!(registry.is_empty());
        assert!(tokens.iter().all(|t| t.is_cancelled()));
    }

    #[test]
    fn test_already_cancelled_handle_is_harmless() {
        let mut registry = CancellationRegistry::new();
        let token = CancellationToken::new();
        token.cancel();
        registry.register(RequestId::new(), token);

        assert_eq!(registry.cancel_all(), 1);
    }

    #[test]
    fn test_unregister() {
        let mut registry = CancellationRegistry::new();
        let id = RequestId::new();
        registry.register(id, CancellationToken::new());

        assert!(registry.contains(id));
        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert_eq!(registry.len(), 0);
    }
}
