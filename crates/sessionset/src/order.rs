//! Recency ordering of session tokens.

use lru::LruCache;

/// Tokens ordered by ascending last access: oldest at the front, most
/// recently used at the back.
///
/// Backed by an unbounded [`LruCache`], which pairs a doubly-linked list with
/// a token index, so repositioning and removal by token are O(1). The order
/// holds tokens only; the sessions themselves live in the registry map, and a
/// session finds its position by token rather than through a stored handle.
pub struct EvictionOrder {
    tokens: LruCache<String, ()>,
}

impl EvictionOrder {
    /// Create an empty order.
    pub fn new() -> Self {
        Self {
            tokens: LruCache::unbounded(),
        }
    }

    /// Append a token at the back. A token already present is moved there.
    pub fn push_back(&mut self, token: String) {
        self.tokens.put(token, ());
    }

    /// Move a token to the back. Returns false if it isn't tracked.
    pub fn move_to_back(&mut self, token: &str) -> bool {
        self.tokens.get(token).is_some()
    }

    /// Oldest token.
    pub fn front(&self) -> Option<&str> {
        self.tokens.peek_lru().map(|(token, _)| token.as_str())
    }

    /// Remove and return the oldest token.
    pub fn pop_front(&mut self) -> Option<String> {
        self.tokens.pop_lru().map(|(token, _)| token)
    }

    /// Remove a token wherever it sits.
    pub fn remove(&mut self, token: &str) -> bool {
        self.tokens.pop(token).is_some()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Tokens from oldest to most recent.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().rev().map(|(token, _)| token.as_str())
    }
}

impl Default for EvictionOrder {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<String> for EvictionOrder {
    /// Build an order whose front is the first token yielded.
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut order = Self::new();
        for token in iter {
            order.push_back(token);
        }
        order
    }
}

impl std::fmt::Debug for EvictionOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
