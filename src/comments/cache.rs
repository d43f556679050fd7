use crate::api::{ApiError, Comment, CommentPage, CommentSource};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// First page of comments for a video plus its total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentCacheEntry {
    pub video_id: String,
    pub total_count: u64,
    /// Newest first.
    pub items: Vec<Comment>,
    pub next_cursor: Option<String>,
}

/// Proof that the holder owns the one in-flight prefetch for a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchTicket {
    pub video_id: String,
    token: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CommentCacheEntry>,
    pending: HashSet<String>,
    tokens: HashMap<String, u64>,
}

/// Prefetch cache keyed by video id.
///
/// Clones share storage, so the feed and the action bar can hold the same
/// cache. At most one fetch per id is in flight; a per-id token detects
/// results that were superseded by [`clear`](Self::clear) while in flight.
/// Entries are never evicted.
#[derive(Debug, Clone, Default)]
pub struct CommentCache {
    inner: Arc<Mutex<CacheInner>>,
}

impl CommentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached entry for `video_id`. Never fetches.
    pub fn get(&self, video_id: &str) -> Option<CommentCacheEntry> {
        self.inner.lock().entries.get(video_id).cloned()
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.inner.lock().entries.contains_key(video_id)
    }

    pub fn is_pending(&self, video_id: &str) -> bool {
        self.inner.lock().pending.contains(video_id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Claims the prefetch slot for `video_id`. `None` when an entry exists
    /// or a fetch is already running.
    pub fn begin_prefetch(&self, video_id: &str) -> Option<PrefetchTicket> {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(video_id) || inner.pending.contains(video_id) {
            return None;
        }
        inner.pending.insert(video_id.to_string());
        let token = inner.tokens.entry(video_id.to_string()).or_insert(0);
        *token += 1;
        Some(PrefetchTicket {
            video_id: video_id.to_string(),
            token: *token,
        })
    }

    /// Stores the result of a prefetch. The list and count are independent:
    /// either one succeeding still produces an entry. Returns whether an
    /// entry was written.
    pub fn complete_prefetch(
        &self,
        ticket: PrefetchTicket,
        list: Result<CommentPage, ApiError>,
        count: Result<u64, ApiError>,
    ) -> bool {
        let mut inner = self.inner.lock();
        if inner.tokens.get(&ticket.video_id) != Some(&ticket.token) {
            tracing::debug!(video_id = %ticket.video_id, "Discarding superseded comment prefetch");
            return false;
        }
        inner.pending.remove(&ticket.video_id);

        if inner.entries.contains_key(&ticket.video_id) {
            return false;
        }

        let (items, next_cursor, list_ok) = match list {
            Ok(page) => (page.items, page.next_cursor, true),
            Err(e) => {
                tracing::debug!(video_id = %ticket.video_id, error = %e, "Comment list prefetch failed");
                (Vec::new(), None, false)
            }
        };
        let total_count = match count {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::debug!(video_id = %ticket.video_id, error = %e, "Comment count prefetch failed");
                None
            }
        };

        if !list_ok && total_count.is_none() {
            return false;
        }

        // Without a count the loaded items are the best lower bound.
        let total_count = total_count.unwrap_or(items.len() as u64);
        inner.entries.insert(
            ticket.video_id.clone(),
            CommentCacheEntry {
                video_id: ticket.video_id,
                total_count,
                items,
                next_cursor,
            },
        );
        true
    }

    /// Fetches the first page and count in parallel and caches them.
    /// No-op if cached or already in flight.
    pub async fn prefetch<S: CommentSource>(&self, source: &S, video_id: &str, take: u32) -> bool {
        let Some(ticket) = self.begin_prefetch(video_id) else {
            return false;
        };
        let (list, count) = futures::join!(
            source.list_comments(video_id.to_string(), None, take),
            source.comment_count(video_id.to_string()),
        );
        self.complete_prefetch(ticket, list, count)
    }

    /// Inserts a complete entry if none exists yet.
    pub fn store(&self, entry: CommentCacheEntry) -> bool {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&entry.video_id) {
            return false;
        }
        inner.entries.insert(entry.video_id.clone(), entry);
        true
    }

    /// Updates only the total of an existing entry.
    pub fn patch_count(&self, video_id: &str, total_count: u64) -> bool {
        match self.inner.lock().entries.get_mut(video_id) {
            Some(entry) => {
                entry.total_count = total_count;
                true
            }
            None => false,
        }
    }

    /// A comment was posted: put it at the head and take the new total.
    pub fn record_created(&self, comment: &Comment, total_count: u64) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get_mut(&comment.video_id) {
            if !entry.items.iter().any(|c| c.id == comment.id) {
                entry.items.insert(0, comment.clone());
            }
            entry.total_count = total_count;
        }
    }

    pub fn record_deleted(&self, video_id: &str, comment_id: &str, total_count: u64) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get_mut(video_id) {
            entry.items.retain(|c| c.id != comment_id);
            entry.total_count = total_count;
        }
    }

    /// Drops every entry and invalidates in-flight prefetches.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let pending: Vec<String> = inner.pending.drain().collect();
        for id in pending {
            *inner.tokens.entry(id).or_insert(0) += 1;
        }
        inner.entries.clear();
    }
}
