//! Render cache with per-conversation FIFO eviction
//!
//! Memoizes the transform "raw text → sanitized renderable output" so a view
//! that re-renders on every store change does not re-sanitize unchanged
//! messages.
//!
//! # Design
//!
//! - **Conversation scoping**: entries live in a separate bucket per
//!   conversation. A lookup never crosses buckets, so identical text in two
//!   conversations is rendered twice.
//! - **Bounded buckets**: each bucket holds at most `capacity` entries
//!   (default 100). Inserting into a full bucket evicts the entry that was
//!   inserted first. Reads do not refresh an entry's position.
//! - **Cheap sharing**: keys and outputs are `Arc<str>`, so handing an output
//!   to a view does not copy it.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::message::ConversationId;

/// Default number of entries kept per conversation
pub const DEFAULT_CAPACITY: usize = 100;

/// Turns raw message text into sanitized renderable output
pub trait Renderer {
    /// Render `source`. Must be pure: same input, same output.
    fn render(&self, source: &str) -> String;
}

impl<F> Renderer for F
where
    F: Fn(&str) -> String,
{
    fn render(&self, source: &str) -> String {
        self(source)
    }
}

/// Renderer that escapes HTML-significant characters
#[derive(Clone, Copy, Debug, Default)]
pub struct EscapingRenderer;

impl Renderer for EscapingRenderer {
    fn render(&self, source: &str) -> String {
        let mut out = String::with_capacity(source.len());
        for c in source.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(c),
            }
        }
        out
    }
}

/// Entries of one conversation
#[derive(Debug, Default)]
struct Bucket {
    /// Raw text → rendered output
    entries: HashMap<Arc<str>, Arc<str>>,
    /// Keys in insertion order (front = oldest)
    order: VecDeque<Arc<str>>,
}

impl Bucket {
    /// Insert a new entry, evicting the oldest if full
    ///
    /// Returns `true` if an entry was evicted.
    fn insert(&mut self, key: Arc<str>, value: Arc<str>, capacity: usize) -> bool {
        let mut evicted = false;
        while self.order.len() >= capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                    evicted = true;
                }
                None => break,
            }
        }
        self.order.push_back(Arc::clone(&key));
        self.entries.insert(key, value);
        evicted
    }
}

/// Per-conversation memo of rendered message text
///
/// # Example
///
/// ```
/// use panel_core::message::ConversationId;
/// use panel_core::render_cache::{EscapingRenderer, RenderCache};
///
/// let mut cache = RenderCache::new();
/// let conv = ConversationId::from("c1");
///
/// let html = cache.render(&conv, "<b>hi</b>", &EscapingRenderer);
/// assert_eq!(&*html, "&lt;b&gt;hi&lt;/b&gt;");
/// assert_eq!(cache.stats().misses, 1);
///
/// cache.render(&conv, "<b>hi</b>", &EscapingRenderer);
/// assert_eq!(cache.stats().hits, 1);
/// ```
#[derive(Debug)]
pub struct RenderCache {
    /// Buckets by conversation
    buckets: HashMap<ConversationId, Bucket>,
    /// Maximum entries per bucket
    capacity: usize,
    /// Lookups answered from the cache
    hits: u64,
    /// Lookups that invoked the renderer
    misses: u64,
    /// Entries dropped to make room
    evictions: u64,
}

impl RenderCache {
    /// Create a cache with the default per-conversation capacity
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a cache holding at most `capacity` entries per conversation
    ///
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buckets: HashMap::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Render `source` for `conversation_id`, reusing a previous result
    pub fn render<R>(&mut self, conversation_id: &ConversationId, source: &str, renderer: &R) -> Arc<str>
    where
        R: Renderer + ?Sized,
    {
        if let Some(hit) = self.get(conversation_id, source) {
            self.hits += 1;
            return hit;
        }

        self.misses += 1;
        let output: Arc<str> = Arc::from(renderer.render(source));
        let capacity = self.capacity;
        let bucket = self.buckets.entry(conversation_id.clone()).or_default();
        if bucket.insert(Arc::from(source), Arc::clone(&output), capacity) {
            self.evictions += 1;
            tracing::trace!(conversation_id = %conversation_id, "Render cache evicted oldest entry");
        }
        output
    }

    /// Look up a cached output without rendering (does not count as a hit)
    #[must_use]
    pub fn get(&self, conversation_id: &ConversationId, source: &str) -> Option<Arc<str>> {
        self.buckets
            .get(conversation_id)
            .and_then(|bucket| bucket.entries.get(source))
            .cloned()
    }

    /// Number of entries cached for one conversation
    #[must_use]
    pub fn len(&self, conversation_id: &ConversationId) -> usize {
        self.buckets
            .get(conversation_id)
            .map_or(0, |bucket| bucket.entries.len())
    }

    /// Whether nothing is cached at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(|bucket| bucket.entries.is_empty())
    }

    /// Per-conversation capacity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry of one conversation
    ///
    /// Returns the number of entries dropped.
    pub fn invalidate(&mut self, conversation_id: &ConversationId) -> usize {
        let dropped = self
            .buckets
            .remove(conversation_id)
            .map_or(0, |bucket| bucket.entries.len());
        if dropped > 0 {
            tracing::debug!(conversation_id = %conversation_id, dropped, "Render cache invalidated");
        }
        dropped
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> RenderCacheStats {
        RenderCacheStats {
            conversations: self.buckets.len(),
            entries: self.buckets.values().map(|b| b.entries.len()).sum(),
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderCacheStats {
    /// Conversations with a bucket
    pub conversations: usize,
    /// Entries across all buckets
    pub entries: usize,
    /// Renders answered from the cache
    pub hits: u64,
    /// Renders that invoked the renderer
    pub misses: u64,
    /// Entries evicted to make room
    pub evictions: u64,
}
