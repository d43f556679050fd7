use super::shuffle::Shuffle;
use crate::api::{ApiError, Notice, VideoPage, VideoRef, VideoSource};
use std::collections::HashSet;
use std::ops::Range;
use std::time::Duration;
use tokio::time::Instant;

/// Tunables for [`FeedPager`], normally taken from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagerSettings {
    pub page_size: u32,
    /// Minimum gap between two navigation steps.
    pub settle: Duration,
    /// Items kept mounted on each side of the active one.
    pub render_radius: usize,
}

impl Default for PagerSettings {
    fn default() -> Self {
        Self {
            page_size: 10,
            settle: Duration::from_millis(350),
            render_radius: 2,
        }
    }
}

/// Page fetch state. At most one fetch is ever in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    InFlight,
}

/// A page fetch the caller must perform and hand back to
/// [`FeedPager::complete_load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<String>,
    pub limit: u32,
    /// Pager generation at issue time; results from before a reload are dropped.
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    /// New unique items appended.
    pub added: usize,
    /// Whether a navigation step waiting on this page was taken.
    pub advanced: bool,
    /// The result belonged to a superseded generation and was ignored.
    pub stale: bool,
}

/// Result of a single navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Moved { index: usize },
    /// At the last item: fetch this page; the step is taken only if it adds
    /// something.
    NeedsPage(PageRequest),
    /// At the last item while another fetch is running. Nothing moves.
    Loading,
    /// Inside the settle window of the previous step.
    Settling,
    Empty,
    AtStart,
    AtEnd,
}

/// Infinite, deduplicated, shuffled video feed with a single active item.
///
/// The pager does no I/O itself: [`begin_load`](Self::begin_load) hands out a
/// [`PageRequest`] and [`complete_load`](Self::complete_load) merges the
/// result. [`load_more`](Self::load_more) and [`go_next_with`](Self::go_next_with)
/// drive both halves against a [`VideoSource`].
pub struct FeedPager {
    items: Vec<VideoRef>,
    ids: HashSet<String>,
    active: usize,
    cursor: Option<String>,
    exhausted: bool,
    load_state: LoadState,
    pending_advance: bool,
    settle_until: Option<Instant>,
    generation: u64,
    last_error: Option<Notice>,
    shuffle: Box<dyn Shuffle>,
    settings: PagerSettings,
}

impl std::fmt::Debug for FeedPager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedPager")
            .field("len", &self.items.len())
            .field("active", &self.active)
            .field("cursor", &self.cursor)
            .field("exhausted", &self.exhausted)
            .field("load_state", &self.load_state)
            .field("generation", &self.generation)
            .finish()
    }
}

impl FeedPager {
    pub fn new(shuffle: Box<dyn Shuffle>, settings: PagerSettings) -> Self {
        Self {
            items: Vec::new(),
            ids: HashSet::new(),
            active: 0,
            cursor: None,
            exhausted: false,
            load_state: LoadState::Idle,
            pending_advance: false,
            settle_until: None,
            generation: 0,
            last_error: None,
            shuffle,
            settings,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn items(&self) -> &[VideoRef] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_item(&self) -> Option<&VideoRef> {
        self.items.get(self.active)
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn is_loading(&self) -> bool {
        self.load_state == LoadState::InFlight
    }

    pub fn last_error(&self) -> Option<&Notice> {
        self.last_error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    pub fn settings(&self) -> PagerSettings {
        self.settings
    }

    /// Indices of the items that should be mounted.
    pub fn render_window(&self) -> Range<usize> {
        if self.items.is_empty() {
            return 0..0;
        }
        let start = self.active.saturating_sub(self.settings.render_radius);
        let end = (self.active + self.settings.render_radius + 1).min(self.items.len());
        start..end
    }

    pub fn visible(&self) -> &[VideoRef] {
        &self.items[self.render_window()]
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Claims the single load slot. `None` while a load is in flight or once
    /// the listing is exhausted.
    pub fn begin_load(&mut self) -> Option<PageRequest> {
        if self.load_state == LoadState::InFlight || self.exhausted {
            return None;
        }
        self.load_state = LoadState::InFlight;
        self.last_error = None;
        Some(PageRequest {
            cursor: self.cursor.clone(),
            limit: self.settings.page_size,
            generation: self.generation,
        })
    }

    pub fn complete_load(
        &mut self,
        request: PageRequest,
        result: Result<VideoPage, ApiError>,
    ) -> LoadOutcome {
        if request.generation != self.generation {
            tracing::debug!(
                request_generation = request.generation,
                current_generation = self.generation,
                "Discarding page from before reload"
            );
            return LoadOutcome {
                stale: true,
                ..LoadOutcome::default()
            };
        }

        self.load_state = LoadState::Idle;
        let wants_step = std::mem::take(&mut self.pending_advance);

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, cursor = ?request.cursor, "Failed to load videos");
                self.last_error = Some(Notice::from_error("Loading videos", &e));
                return LoadOutcome::default();
            }
        };

        let page_was_empty = page.videos.is_empty();
        let had_items = !self.items.is_empty();
        let mut added = 0;
        for video in self.shuffle.permute(page.videos) {
            if self.ids.insert(video.id.clone()) {
                self.items.push(video);
                added += 1;
            }
        }

        self.cursor = page.next_cursor;
        self.exhausted = self.cursor.is_none() || page_was_empty;

        tracing::debug!(
            added,
            total = self.items.len(),
            exhausted = self.exhausted,
            "Merged video page"
        );

        let mut advanced = false;
        if wants_step && had_items && added > 0 {
            self.active += 1;
            self.start_settle();
            advanced = true;
        }

        LoadOutcome {
            added,
            advanced,
            stale: false,
        }
    }

    /// Fetches and merges the next page. Returns whether anything new was
    /// appended.
    pub async fn load_more<S: VideoSource>(&mut self, source: &S) -> bool {
        let Some(request) = self.begin_load() else {
            return false;
        };
        let result = source
            .fetch_videos(request.cursor.clone(), request.limit)
            .await;
        self.complete_load(request, result).added > 0
    }

    /// Drops everything and starts over from the first page.
    pub fn reload(&mut self) {
        self.items.clear();
        self.ids.clear();
        self.active = 0;
        self.cursor = None;
        self.exhausted = false;
        self.load_state = LoadState::Idle;
        self.pending_advance = false;
        self.settle_until = None;
        self.last_error = None;
        self.generation += 1;
        tracing::info!(generation = self.generation, "Feed reloaded");
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    fn settling(&self) -> bool {
        self.settle_until.is_some_and(|until| Instant::now() < until)
    }

    fn start_settle(&mut self) {
        self.settle_until = Some(Instant::now() + self.settings.settle);
    }

    pub fn go_next(&mut self) -> Step {
        if self.items.is_empty() {
            return Step::Empty;
        }
        if self.settling() {
            return Step::Settling;
        }
        if self.active + 1 < self.items.len() {
            self.active += 1;
            self.start_settle();
            return Step::Moved { index: self.active };
        }
        if self.load_state == LoadState::InFlight {
            return Step::Loading;
        }
        match self.begin_load() {
            Some(request) => {
                self.pending_advance = true;
                Step::NeedsPage(request)
            }
            None => Step::AtEnd,
        }
    }

    pub fn go_prev(&mut self) -> Step {
        if self.items.is_empty() {
            return Step::Empty;
        }
        if self.settling() {
            return Step::Settling;
        }
        if self.active == 0 {
            return Step::AtStart;
        }
        self.active -= 1;
        self.start_settle();
        Step::Moved { index: self.active }
    }

    /// [`go_next`](Self::go_next) with any needed page fetched inline.
    /// Returns whether the active index moved.
    pub async fn go_next_with<S: VideoSource>(&mut self, source: &S) -> bool {
        match self.go_next() {
            Step::Moved { .. } => true,
            Step::NeedsPage(request) => {
                let result = source
                    .fetch_videos(request.cursor.clone(), request.limit)
                    .await;
                self.complete_load(request, result).advanced
            }
            _ => false,
        }
    }
}
