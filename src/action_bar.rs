//! Per-video side bar: reaction counts, comment count, comment entry point.

use crate::api::{ApiError, CommentSource};
use crate::comments::{CommentCache, CommentCacheEntry};
use crate::reaction::ReactionController;

/// A comment count refresh issued by [`ActionBar::set_video`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountRefresh {
    pub video_id: String,
    token: u64,
}

/// State for the bar next to the active video.
///
/// Reads and patches the comment cache it was given, or a private one when
/// none was.
#[derive(Debug)]
pub struct ActionBar {
    cache: CommentCache,
    shared_cache: bool,
    video_id: Option<String>,
    comment_count: u64,
    reactions: Option<ReactionController>,
    rollback: bool,
    token: u64,
}

impl ActionBar {
    pub fn new(cache: Option<CommentCache>, rollback_failed_reactions: bool) -> Self {
        let shared_cache = cache.is_some();
        Self {
            cache: cache.unwrap_or_default(),
            shared_cache,
            video_id: None,
            comment_count: 0,
            reactions: None,
            rollback: rollback_failed_reactions,
            token: 0,
        }
    }

    pub fn cache(&self) -> &CommentCache {
        &self.cache
    }

    pub fn uses_shared_cache(&self) -> bool {
        self.shared_cache
    }

    pub fn video_id(&self) -> Option<&str> {
        self.video_id.as_deref()
    }

    pub fn comment_count(&self) -> u64 {
        self.comment_count
    }

    pub fn reactions(&self) -> Option<&ReactionController> {
        self.reactions.as_ref()
    }

    pub fn reactions_mut(&mut self) -> Option<&mut ReactionController> {
        self.reactions.as_mut()
    }

    pub fn cached_comments(&self) -> Option<CommentCacheEntry> {
        self.video_id.as_deref().and_then(|id| self.cache.get(id))
    }

    /// Switches to `video_id`, showing the cached count right away. The
    /// returned refresh should still be run; servers are the source of truth.
    pub fn set_video(&mut self, video_id: &str) -> Option<CountRefresh> {
        if self.video_id.as_deref() == Some(video_id) {
            return None;
        }
        self.token += 1;
        self.video_id = Some(video_id.to_string());
        self.comment_count = self.cache.get(video_id).map_or(0, |e| e.total_count);
        self.reactions = Some(ReactionController::new(video_id, self.rollback));
        Some(CountRefresh {
            video_id: video_id.to_string(),
            token: self.token,
        })
    }

    pub fn clear(&mut self) {
        self.token += 1;
        self.video_id = None;
        self.comment_count = 0;
        self.reactions = None;
    }

    /// A server-confirmed total for `video_id`, from anywhere. Always patches
    /// the cache; updates the display only for the current video.
    pub fn apply_count(&mut self, video_id: &str, total: u64) {
        self.cache.patch_count(video_id, total);
        if self.video_id.as_deref() == Some(video_id) {
            self.comment_count = total;
        }
    }

    pub fn complete_count_refresh(
        &mut self,
        refresh: CountRefresh,
        result: Result<u64, ApiError>,
    ) -> bool {
        if refresh.token != self.token {
            return false;
        }
        match result {
            Ok(total) => {
                self.apply_count(&refresh.video_id, total);
                true
            }
            Err(e) => {
                tracing::debug!(video_id = %refresh.video_id, error = %e, "Comment count refresh failed");
                false
            }
        }
    }

    pub async fn refresh_count_with<S: CommentSource>(&mut self, source: &S, refresh: CountRefresh) -> bool {
        let result = source.comment_count(refresh.video_id.clone()).await;
        self.complete_count_refresh(refresh, result)
    }
}
