use super::cache::{CommentCache, CommentCacheEntry};
use crate::api::{ApiError, Comment, CommentPage, CommentSource, CreatedComment, ErrorKind, Notice};
use crate::session::{AuthRequired, SessionState};
use thiserror::Error;
use tokio::task::AbortHandle;

/// Longest accepted comment, in characters, after trimming.
pub const MAX_COMMENT_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommentInputError {
    #[error("Comment is empty")]
    Empty,
    #[error("Comment is too long ({len}/{max} characters)", max = MAX_COMMENT_CHARS)]
    TooLong { len: usize },
}

/// Trims `raw` and checks its length. Returns the body to send.
pub fn validate_body(raw: &str) -> Result<String, CommentInputError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len == 0 {
        return Err(CommentInputError::Empty);
    }
    if len > MAX_COMMENT_CHARS {
        return Err(CommentInputError::TooLong { len });
    }
    Ok(trimmed.to_string())
}

// ============================================================================
// Tickets
// ============================================================================

/// A comment page fetch for the open drawer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTicket {
    pub video_id: String,
    pub cursor: Option<String>,
    pub take: u32,
    token: u64,
}

/// A count fetch for the open drawer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountTicket {
    pub video_id: String,
    token: u64,
}

/// Count and first page, to be fetched in parallel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawerFetch {
    pub page: PageTicket,
    pub count: CountTicket,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitTicket {
    pub video_id: String,
    pub body: String,
    token: u64,
    post: u64,
}

/// An optimistic delete; carries what is needed to put the comment back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTicket {
    pub video_id: String,
    pub comment_id: String,
    removed: Comment,
    index: usize,
    token: u64,
}

/// How the drawer got its initial contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawerOpen {
    /// Filled from the cache; nothing to fetch.
    WarmStart,
    /// A prefetch for this video is running; its entry will be adopted.
    AwaitPrefetch,
    Fetch(DrawerFetch),
}

// ============================================================================
// Drawer
// ============================================================================

/// Comment list and composer for one video at a time.
///
/// Every request the drawer starts carries the drawer's token. Closing,
/// switching video or refreshing bumps the token, so results that arrive
/// afterwards are dropped by the `apply_*` methods.
#[derive(Debug)]
pub struct CommentDrawer {
    video_id: Option<String>,
    items: Vec<Comment>,
    cursor: Option<String>,
    has_more: bool,
    total_count: u64,
    count_known: bool,
    first_page_loaded: bool,
    loading: bool,
    /// Id of the post in flight. Survives refreshes; cleared by its result
    /// or by closing.
    posting: Option<u64>,
    next_post: u64,
    notice: Option<Notice>,
    input_error: Option<CommentInputError>,
    composer: String,
    selected: usize,
    token: u64,
    warm_applied: bool,
    awaiting_prefetch: bool,
    take: u32,
    fetches: Vec<AbortHandle>,
}

impl CommentDrawer {
    pub fn new(take: u32) -> Self {
        Self {
            video_id: None,
            items: Vec::new(),
            cursor: None,
            has_more: false,
            total_count: 0,
            count_known: false,
            first_page_loaded: false,
            loading: false,
            posting: None,
            next_post: 0,
            notice: None,
            input_error: None,
            composer: String::new(),
            selected: 0,
            token: 0,
            warm_applied: false,
            awaiting_prefetch: false,
            take,
            fetches: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.video_id.is_some()
    }

    pub fn video_id(&self) -> Option<&str> {
        self.video_id.as_deref()
    }

    pub fn items(&self) -> &[Comment] {
        &self.items
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_posting(&self) -> bool {
        self.posting.is_some()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn input_error(&self) -> Option<&CommentInputError> {
        self.input_error.as_ref()
    }

    // ------------------------------------------------------------------------
    // Composer and selection
    // ------------------------------------------------------------------------

    pub fn composer(&self) -> &str {
        &self.composer
    }

    pub fn push_char(&mut self, c: char) {
        self.composer.push(c);
        self.input_error = None;
    }

    pub fn pop_char(&mut self) {
        self.composer.pop();
        self.input_error = None;
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_comment(&self) -> Option<&Comment> {
        self.items.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.items.len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Whether the selection sits close enough to the end to load more.
    pub fn near_end(&self) -> bool {
        self.selected + 3 >= self.items.len()
    }

    fn clamp_selection(&mut self) {
        if self.selected >= self.items.len() {
            self.selected = self.items.len().saturating_sub(1);
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Registers a running fetch so closing the drawer can abort it.
    pub fn track_fetch(&mut self, handle: AbortHandle) {
        self.fetches.retain(|h| !h.is_finished());
        self.fetches.push(handle);
    }

    fn invalidate(&mut self) {
        for handle in self.fetches.drain(..) {
            handle.abort();
        }
        self.token += 1;
        self.loading = false;
        self.awaiting_prefetch = false;
    }

    fn reset_contents(&mut self) {
        self.items.clear();
        self.cursor = None;
        self.has_more = false;
        self.total_count = 0;
        self.count_known = false;
        self.first_page_loaded = false;
        self.notice = None;
        self.selected = 0;
    }

    fn apply_entry(&mut self, entry: &CommentCacheEntry) {
        self.items = entry.items.clone();
        self.cursor = entry.next_cursor.clone();
        self.has_more = entry.next_cursor.is_some();
        self.total_count = entry.total_count;
        self.count_known = true;
        self.first_page_loaded = true;
        self.notice = None;
        self.warm_applied = true;
        self.clamp_selection();
    }

    pub fn open(&mut self, video_id: &str, cache: &CommentCache) -> DrawerOpen {
        if self.is_open() {
            self.close();
        }
        self.token += 1;
        self.video_id = Some(video_id.to_string());
        self.reset_contents();
        self.warm_applied = false;
        self.awaiting_prefetch = false;
        self.posting = None;
        self.input_error = None;
        self.composer.clear();

        if let Some(entry) = cache.get(video_id) {
            tracing::debug!(video_id, count = entry.total_count, "Comment drawer warm start");
            self.apply_entry(&entry);
            return DrawerOpen::WarmStart;
        }
        if cache.is_pending(video_id) {
            self.loading = true;
            self.awaiting_prefetch = true;
            return DrawerOpen::AwaitPrefetch;
        }
        match self.begin_refresh() {
            Some(fetch) => DrawerOpen::Fetch(fetch),
            None => DrawerOpen::WarmStart,
        }
    }

    pub fn close(&mut self) {
        if !self.is_open() {
            return;
        }
        self.invalidate();
        self.video_id = None;
        self.posting = None;
        self.warm_applied = false;
        self.reset_contents();
    }

    /// Takes a cache entry that arrived after the drawer opened. Applied at
    /// most once per opening, and only while nothing was loaded yet.
    pub fn adopt_prefetched(&mut self, entry: &CommentCacheEntry) -> bool {
        if self.warm_applied
            || self.video_id.as_deref() != Some(entry.video_id.as_str())
            || self.first_page_loaded
        {
            return false;
        }
        self.invalidate();
        self.apply_entry(entry);
        tracing::debug!(video_id = %entry.video_id, "Comment drawer adopted late prefetch");
        true
    }

    /// Falls back to fetching directly when the prefetch this drawer was
    /// waiting on produced nothing.
    pub fn prefetch_failed(&mut self, video_id: &str) -> Option<DrawerFetch> {
        if !self.awaiting_prefetch || self.video_id.as_deref() != Some(video_id) {
            return None;
        }
        self.begin_refresh()
    }

    /// Starts over: clears the list and fetches count and first page.
    pub fn begin_refresh(&mut self) -> Option<DrawerFetch> {
        let video_id = self.video_id.clone()?;
        self.invalidate();
        self.reset_contents();
        self.loading = true;
        Some(DrawerFetch {
            page: PageTicket {
                video_id: video_id.clone(),
                cursor: None,
                take: self.take,
                token: self.token,
            },
            count: CountTicket {
                video_id,
                token: self.token,
            },
        })
    }

    /// Next page after the current cursor, if there is one and nothing is
    /// loading.
    pub fn begin_page(&mut self) -> Option<PageTicket> {
        let video_id = self.video_id.clone()?;
        if self.loading || !self.has_more {
            return None;
        }
        let cursor = self.cursor.clone()?;
        self.loading = true;
        self.notice = None;
        Some(PageTicket {
            video_id,
            cursor: Some(cursor),
            take: self.take,
            token: self.token,
        })
    }

    pub fn apply_page(&mut self, ticket: PageTicket, result: Result<CommentPage, ApiError>) -> bool {
        if ticket.token != self.token {
            return false;
        }
        self.loading = false;
        match result {
            Ok(page) => {
                for comment in page.items {
                    if !self.items.iter().any(|c| c.id == comment.id) {
                        self.items.push(comment);
                    }
                }
                self.has_more = page.next_cursor.is_some();
                self.cursor = page.next_cursor;
                self.first_page_loaded = true;
                true
            }
            Err(e) => {
                tracing::warn!(video_id = %ticket.video_id, error = %e, "Failed to load comments");
                self.notice = Some(Notice::from_error("Loading comments", &e));
                false
            }
        }
    }

    /// Returns the new total when it was applied.
    pub fn apply_count(&mut self, ticket: CountTicket, result: Result<u64, ApiError>) -> Option<u64> {
        if ticket.token != self.token {
            return None;
        }
        match result {
            Ok(n) => {
                self.total_count = n;
                self.count_known = true;
                Some(n)
            }
            Err(e) => {
                tracing::debug!(video_id = %ticket.video_id, error = %e, "Comment count refresh failed");
                None
            }
        }
    }

    /// First page plus count, once both are known, for seeding the cache.
    pub fn cache_entry(&self) -> Option<CommentCacheEntry> {
        let video_id = self.video_id.clone()?;
        if !self.first_page_loaded || !self.count_known {
            return None;
        }
        Some(CommentCacheEntry {
            video_id,
            total_count: self.total_count,
            items: self.items.clone(),
            next_cursor: self.cursor.clone(),
        })
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Validates the composer and checks the session. Input problems are
    /// kept in [`input_error`](Self::input_error) and no ticket is issued.
    pub fn begin_submit(&mut self, session: &SessionState) -> Result<Option<SubmitTicket>, AuthRequired> {
        let Some(video_id) = self.video_id.clone() else {
            return Ok(None);
        };
        let body = match validate_body(&self.composer) {
            Ok(body) => body,
            Err(e) => {
                self.input_error = Some(e);
                return Ok(None);
            }
        };
        session.require()?;
        if self.posting.is_some() {
            return Ok(None);
        }
        self.next_post += 1;
        self.posting = Some(self.next_post);
        self.notice = None;
        self.input_error = None;
        Ok(Some(SubmitTicket {
            video_id,
            body,
            token: self.token,
            post: self.next_post,
        }))
    }

    pub fn apply_submit(&mut self, ticket: SubmitTicket, result: &Result<CreatedComment, ApiError>) -> bool {
        if let Err(e) = result {
            tracing::warn!(video_id = %ticket.video_id, error = %e, "Failed to post comment");
        }
        let own_post = self.posting == Some(ticket.post);
        if own_post {
            self.posting = None;
            match result {
                Ok(_) => self.composer.clear(),
                Err(e) => self.notice = Some(Notice::from_error("Posting comment", e)),
            }
        }
        if ticket.token != self.token {
            return false;
        }
        match result {
            Ok(created) => {
                if !self.items.iter().any(|c| c.id == created.item.id) {
                    self.items.insert(0, created.item.clone());
                }
                self.total_count = created.total_count;
                self.count_known = true;
                self.selected = 0;
                true
            }
            Err(_) => false,
        }
    }

    /// Removes the comment right away. Only the author may delete.
    pub fn begin_delete(
        &mut self,
        comment_id: &str,
        session: &SessionState,
    ) -> Result<Option<DeleteTicket>, AuthRequired> {
        let Some(video_id) = self.video_id.clone() else {
            return Ok(None);
        };
        session.require()?;
        let Some(index) = self.items.iter().position(|c| c.id == comment_id) else {
            return Ok(None);
        };
        if !session.owns(&self.items[index].user_id) {
            self.notice = Some(Notice::new(
                ErrorKind::Blocking,
                "You can only delete your own comments",
            ));
            return Ok(None);
        }
        let removed = self.items.remove(index);
        self.clamp_selection();
        self.notice = None;
        Ok(Some(DeleteTicket {
            video_id,
            comment_id: comment_id.to_string(),
            removed,
            index,
            token: self.token,
        }))
    }

    pub fn apply_delete(&mut self, ticket: DeleteTicket, result: &Result<u64, ApiError>) -> bool {
        if let Err(e) = result {
            tracing::warn!(comment_id = %ticket.comment_id, error = %e, "Failed to delete comment");
        }
        if ticket.token != self.token {
            return false;
        }
        match result {
            Ok(total) => {
                self.total_count = *total;
                self.count_known = true;
                true
            }
            Err(e) => {
                if !self.items.iter().any(|c| c.id == ticket.comment_id) {
                    let at = ticket.index.min(self.items.len());
                    self.items.insert(at, ticket.removed);
                }
                self.notice = Some(Notice::from_error("Deleting comment", e));
                false
            }
        }
    }

    // ------------------------------------------------------------------------
    // Inline drivers
    // ------------------------------------------------------------------------

    pub async fn run_fetch<S: CommentSource>(&mut self, source: &S, fetch: DrawerFetch) {
        let DrawerFetch { page, count } = fetch;
        let (list, total) = futures::join!(
            source.list_comments(page.video_id.clone(), page.cursor.clone(), page.take),
            source.comment_count(count.video_id.clone()),
        );
        self.apply_count(count, total);
        self.apply_page(page, list);
    }

    pub async fn load_more_with<S: CommentSource>(&mut self, source: &S) -> bool {
        let Some(ticket) = self.begin_page() else {
            return false;
        };
        let result = source
            .list_comments(ticket.video_id.clone(), ticket.cursor.clone(), ticket.take)
            .await;
        self.apply_page(ticket, result)
    }

    /// Posts the composer contents. Returns the server result so callers
    /// can patch counts elsewhere.
    pub async fn submit_with<S: CommentSource>(
        &mut self,
        source: &S,
        session: &SessionState,
    ) -> Result<Option<Result<CreatedComment, ApiError>>, AuthRequired> {
        let Some(ticket) = self.begin_submit(session)? else {
            return Ok(None);
        };
        let result = source
            .create_comment(ticket.video_id.clone(), ticket.body.clone())
            .await;
        self.apply_submit(ticket, &result);
        Ok(Some(result))
    }

    pub async fn delete_with<S: CommentSource>(
        &mut self,
        source: &S,
        comment_id: &str,
        session: &SessionState,
    ) -> Result<Option<Result<u64, ApiError>>, AuthRequired> {
        let Some(ticket) = self.begin_delete(comment_id, session)? else {
            return Ok(None);
        };
        let result = source.delete_comment(ticket.comment_id.clone()).await;
        self.apply_delete(ticket, &result);
        Ok(Some(result))
    }
}
