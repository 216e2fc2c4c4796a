//! Cache change notifications.

/// What happened to a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
    /// A fetch was issued for the key.
    FetchStarted,
    /// A fetch completed and its value was stored.
    Updated,
    /// A fetch failed after retries; the previous value, if any, is kept.
    Failed,
    /// The entry was marked no longer authoritative.
    Invalidated,
    /// The entry was removed explicitly.
    Removed,
    /// The entry was idle past its GC window and was dropped.
    Evicted,
}

/// Notification sent on the cache's broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEvent<K> {
    pub key: K,
    pub kind: CacheEventKind,
}
