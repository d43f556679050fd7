use crate::action_bar::{ActionBar, CountRefresh};
use crate::api::{
    ApiClient, ApiError, CommentPage, CreatedComment, ErrorKind, Notice, ReactionKind,
    ReactionSummary, VideoPage, VideoRef, Viewer,
};
use crate::comments::{
    CommentCache, CommentDrawer, CountTicket, DeleteTicket, DrawerFetch, DrawerOpen, PageTicket,
    PrefetchTicket, SubmitTicket,
};
use crate::config::Config;
use crate::feed::{
    FeedPager, FisherYates, GestureInput, GestureTracker, LoadOutcome, PageRequest,
    PagerSettings, Shuffle, Step,
};
use crate::playback::{MediaElement, MediaEvent, PlaybackContext, PlaybackSnapshot, VirtualClip};
use crate::reaction::{ReactionIntent, Reconciled};
use crate::session::{AuthRequired, SessionState};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use url::Url;

// ============================================================================
// Background Events
// ============================================================================

/// Results delivered by background tasks to the UI loop.
///
/// Every variant carries the ticket or token it was issued with, so results
/// that arrive after the owning state moved on are dropped by the receiver.
pub enum AppEvent {
    /// A listing page arrived for `request`.
    PageLoaded {
        request: PageRequest,
        result: Result<VideoPage, ApiError>,
    },
    /// First comment page and count fetched in parallel for the cache.
    CommentsPrefetched {
        ticket: PrefetchTicket,
        list: Result<CommentPage, ApiError>,
        count: Result<u64, ApiError>,
    },
    DrawerPage {
        ticket: PageTicket,
        result: Result<CommentPage, ApiError>,
    },
    DrawerCount {
        ticket: CountTicket,
        result: Result<u64, ApiError>,
    },
    CommentPosted {
        ticket: SubmitTicket,
        result: Result<CreatedComment, ApiError>,
    },
    CommentDeleted {
        ticket: DeleteTicket,
        result: Result<u64, ApiError>,
    },
    /// Action bar count refresh after a video change.
    CommentCountLoaded {
        refresh: CountRefresh,
        result: Result<u64, ApiError>,
    },
    ReactionLoaded {
        video_id: String,
        seq: u64,
        result: Result<ReactionSummary, ApiError>,
    },
    ReactionSaved {
        intent: ReactionIntent,
        result: Result<ReactionSummary, ApiError>,
    },
    ViewerResolved {
        result: Result<Option<Viewer>, ApiError>,
    },
    /// A background task panicked.
    ///
    /// Fields:
    /// - `task`: Name of the task that panicked (e.g., "page_load", "prefetch")
    /// - `error`: The panic message extracted from the panic payload
    TaskPanicked {
        task: &'static str,
        error: String,
    },
}

/// A reaction summary fetch for the video that just became active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionLoad {
    pub video_id: String,
    pub seq: u64,
}

/// Network work that follows the active video changing.
#[derive(Debug, Default)]
pub struct Activation {
    pub count: Option<CountRefresh>,
    pub reaction: Option<ReactionLoad>,
    pub prefetch: Vec<PrefetchTicket>,
}

impl Activation {
    pub fn is_empty(&self) -> bool {
        self.count.is_none() && self.reaction.is_none() && self.prefetch.is_empty()
    }
}

// ============================================================================
// Application State
// ============================================================================

/// Everything the terminal client knows, owned by the UI loop.
///
/// Methods here never perform I/O. They update state and return the tickets
/// the UI layer turns into background tasks.
pub struct App {
    pub config: Config,
    pub api: ApiClient,
    pub session: SessionState,
    pub pager: FeedPager,
    pub gestures: GestureTracker,
    pub playback: PlaybackContext,
    pub playback_rx: watch::Receiver<PlaybackSnapshot>,
    /// Shared with `action_bar`; clones point at the same entries.
    pub cache: CommentCache,
    pub action_bar: ActionBar,
    pub drawer: CommentDrawer,
    /// Comment id awaiting a y/n delete confirmation.
    pub pending_delete: Option<String>,
    pub status_message: Option<(Cow<'static, str>, Instant)>,
    /// Sign-in page the UI should open next.
    pub sign_in_request: Option<Url>,
    pub needs_redraw: bool,
    clips: HashMap<String, Arc<VirtualClip>>,
    active_video: Option<String>,
    media_tx: mpsc::UnboundedSender<MediaEvent>,
    /// Count and reaction fetches for the active video; aborted on change.
    video_tasks: Vec<AbortHandle>,
}

impl App {
    pub fn new(
        config: Config,
        api: ApiClient,
        session: SessionState,
        media_tx: mpsc::UnboundedSender<MediaEvent>,
    ) -> Self {
        Self::with_shuffle(
            config,
            api,
            session,
            media_tx,
            Box::new(FisherYates::from_entropy()),
        )
    }

    pub fn with_shuffle(
        config: Config,
        api: ApiClient,
        session: SessionState,
        media_tx: mpsc::UnboundedSender<MediaEvent>,
        shuffle: Box<dyn Shuffle>,
    ) -> Self {
        let settings = PagerSettings {
            page_size: config.page_size.max(1),
            settle: config.settle_window(),
            render_radius: config.render_radius,
        };
        let playback = PlaybackContext::new(config.start_muted);
        let playback_rx = playback.subscribe();
        let cache = CommentCache::new();
        let action_bar = ActionBar::new(Some(cache.clone()), config.rollback_failed_reactions);
        let drawer = CommentDrawer::new(config.comment_take());
        let gestures = GestureTracker::new(config.swipe_threshold_px);

        Self {
            pager: FeedPager::new(shuffle, settings),
            gestures,
            playback,
            playback_rx,
            cache,
            action_bar,
            drawer,
            pending_delete: None,
            status_message: None,
            sign_in_request: None,
            needs_redraw: true,
            clips: HashMap::new(),
            active_video: None,
            media_tx,
            video_tasks: Vec::new(),
            config,
            api,
            session,
        }
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Set status message (will auto-expire after 3 seconds)
    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Clear status message if expired (older than 3 seconds)
    /// Returns true if a message was actually cleared
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed().as_secs() >= 3 {
                self.status_message = None;
                return true;
            }
        }
        false
    }

    /// Queues the sign-in page and says so in the status bar.
    pub fn require_sign_in(&mut self, err: AuthRequired) {
        tracing::info!(url = %err.sign_in_url, "Sign-in required");
        self.set_status("Sign in required: opening browser");
        self.sign_in_request = Some(err.sign_in_url);
    }

    /// Routes a failure into UI state. Expired sessions go to sign-in,
    /// everything else becomes a status message.
    pub fn report(&mut self, context: &str, err: &ApiError) {
        if err.kind() == ErrorKind::AuthRequired {
            let url = self.session.sign_in_url();
            self.require_sign_in(AuthRequired { sign_in_url: url });
            return;
        }
        let notice = Notice::from_error(context, err);
        self.set_status(notice.message);
    }

    // ========================================================================
    // Feed
    // ========================================================================

    pub fn modal_open(&self) -> bool {
        self.drawer.is_open()
    }

    pub fn active_video(&self) -> Option<&VideoRef> {
        self.pager.active_item()
    }

    /// Feeds one pointer input to the gesture tracker and steps the feed.
    pub fn handle_gesture(&mut self, input: GestureInput) -> Option<Step> {
        let has_items = !self.pager.is_empty();
        let direction = self.gestures.handle(input, self.modal_open(), has_items)?;
        Some(self.step(direction))
    }

    pub fn step(&mut self, direction: crate::feed::Direction) -> Step {
        match direction {
            crate::feed::Direction::Next => self.pager.go_next(),
            crate::feed::Direction::Prev => self.pager.go_prev(),
        }
    }

    /// Merges a page. Returns the activation work when the active video
    /// changed as a result (first page, or a step that was waiting on it).
    pub fn apply_page(
        &mut self,
        request: PageRequest,
        result: Result<VideoPage, ApiError>,
    ) -> (LoadOutcome, Option<Activation>) {
        let outcome = self.pager.complete_load(request, result);
        if outcome.stale {
            return (outcome, None);
        }
        if let Some(notice) = self.pager.last_error().cloned() {
            self.set_status(notice.message);
        } else if outcome.added == 0 && self.pager.is_exhausted() && self.pager.is_empty() {
            self.set_status("No videos yet");
        }
        let changed = self.active_video.as_deref() != self.pager.active_item().map(|v| v.id.as_str());
        let activation = changed.then(|| self.sync_active());
        (outcome, activation)
    }

    /// Brings clips, playback and the action bar in line with the pager's
    /// active index. Call after every index change.
    pub fn sync_active(&mut self) -> Activation {
        let mut activation = Activation::default();

        let window: Vec<String> = self.pager.visible().iter().map(|v| v.id.clone()).collect();
        self.clips.retain(|id, _| window.contains(id));
        let clip_secs = self.config.clip_seconds as f64;
        for id in &window {
            if !self.clips.contains_key(id) {
                let clip = VirtualClip::new(clip_secs, self.media_tx.clone());
                self.clips.insert(id.clone(), clip);
            }
            if let Some(ticket) = self.cache.begin_prefetch(id) {
                activation.prefetch.push(ticket);
            }
        }

        let next = self.pager.active_item().map(|v| v.id.clone());
        if next == self.active_video {
            return activation;
        }

        if let Some(prev) = self.active_video.as_ref().and_then(|id| self.clips.get(id)) {
            prev.pause();
        }
        for handle in self.video_tasks.drain(..) {
            handle.abort();
        }
        self.pending_delete = None;

        match next.as_deref().and_then(|id| self.clips.get(id).cloned()) {
            Some(clip) => {
                let element: Arc<dyn MediaElement> = clip.clone();
                self.playback.register_video(Some(element));
                clip.play();
            }
            None => self.playback.register_video(None),
        }

        match next.as_deref() {
            Some(id) => {
                activation.count = self.action_bar.set_video(id);
                activation.reaction = self.action_bar.reactions().map(|r| ReactionLoad {
                    video_id: id.to_string(),
                    seq: r.begin_load(),
                });
                tracing::debug!(video_id = %id, index = self.pager.active_index(), "Active video changed");
            }
            None => self.action_bar.clear(),
        }
        self.active_video = next;
        activation
    }

    /// Registers a fetch tied to the active video.
    pub fn track_video_task(&mut self, handle: AbortHandle) {
        self.video_tasks.retain(|h| !h.is_finished());
        self.video_tasks.push(handle);
    }

    /// Clears the feed and comment cache and returns the first page request.
    pub fn reload(&mut self) -> Option<PageRequest> {
        self.drawer.close();
        self.pending_delete = None;
        self.cache.clear();
        self.pager.reload();
        for handle in self.video_tasks.drain(..) {
            handle.abort();
        }
        for clip in self.clips.values() {
            clip.pause();
        }
        self.clips.clear();
        self.active_video = None;
        self.playback.register_video(None);
        self.action_bar.clear();
        self.pager.begin_load()
    }

    // ========================================================================
    // Playback
    // ========================================================================

    pub fn handle_media_event(&mut self, event: MediaEvent) -> bool {
        self.playback.handle_event(event)
    }

    /// Advances the active clip's clock.
    pub fn tick_playback(&self, dt_secs: f64) {
        if let Some(clip) = self.active_video.as_ref().and_then(|id| self.clips.get(id)) {
            clip.tick(dt_secs);
        }
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    // ========================================================================
    // Comments
    // ========================================================================

    /// Stores a prefetch result and lets an open drawer pick it up. When the
    /// prefetch produced nothing and the drawer was waiting on it, returns
    /// the drawer's own fetch.
    pub fn apply_prefetch(
        &mut self,
        ticket: PrefetchTicket,
        list: Result<CommentPage, ApiError>,
        count: Result<u64, ApiError>,
    ) -> Option<DrawerFetch> {
        let video_id = ticket.video_id.clone();
        let stored = self.cache.complete_prefetch(ticket, list, count);
        let Some(entry) = self.cache.get(&video_id) else {
            return self.drawer.prefetch_failed(&video_id);
        };
        if stored && self.action_bar.video_id() == Some(video_id.as_str()) {
            self.action_bar.apply_count(&video_id, entry.total_count);
        }
        self.drawer.adopt_prefetched(&entry);
        None
    }

    pub fn open_comments(&mut self) -> Option<DrawerOpen> {
        let video_id = self.pager.active_item()?.id.clone();
        self.pending_delete = None;
        Some(self.drawer.open(&video_id, &self.cache))
    }

    pub fn close_comments(&mut self) {
        self.pending_delete = None;
        self.drawer.close();
    }

    pub fn apply_drawer_page(&mut self, ticket: PageTicket, result: Result<CommentPage, ApiError>) {
        let first_page = ticket.cursor.is_none();
        if let Err(e) = &result {
            if e.kind() == ErrorKind::AuthRequired && self.drawer.video_id() == Some(ticket.video_id.as_str()) {
                self.report("Loading comments", e);
            }
        }
        if self.drawer.apply_page(ticket, result) && first_page {
            self.seed_cache_from_drawer();
        }
    }

    pub fn apply_drawer_count(&mut self, ticket: CountTicket, result: Result<u64, ApiError>) {
        let video_id = ticket.video_id.clone();
        if let Some(total) = self.drawer.apply_count(ticket, result) {
            self.action_bar.apply_count(&video_id, total);
            self.seed_cache_from_drawer();
        }
    }

    fn seed_cache_from_drawer(&mut self) {
        if let Some(entry) = self.drawer.cache_entry() {
            if self.cache.store(entry) {
                tracing::debug!(video_id = ?self.drawer.video_id(), "Seeded comment cache from drawer");
            }
        }
    }

    /// Posting and deleting outlive the drawer: the count is patched in the
    /// cache and action bar even if the drawer closed meanwhile.
    pub fn apply_posted(&mut self, ticket: SubmitTicket, result: Result<CreatedComment, ApiError>) {
        let video_id = ticket.video_id.clone();
        self.drawer.apply_submit(ticket, &result);
        match result {
            Ok(created) => {
                self.cache.record_created(&created.item, created.total_count);
                self.action_bar.apply_count(&video_id, created.total_count);
                self.set_status("Comment posted");
            }
            Err(e) if e.kind() == ErrorKind::AuthRequired => self.report("Posting comment", &e),
            Err(_) => {}
        }
    }

    pub fn apply_deleted(&mut self, ticket: DeleteTicket, result: Result<u64, ApiError>) {
        let video_id = ticket.video_id.clone();
        let comment_id = ticket.comment_id.clone();
        self.drawer.apply_delete(ticket, &result);
        match result {
            Ok(total) => {
                self.cache.record_deleted(&video_id, &comment_id, total);
                self.action_bar.apply_count(&video_id, total);
                self.set_status("Comment deleted");
            }
            Err(e) if e.kind() == ErrorKind::AuthRequired => self.report("Deleting comment", &e),
            Err(_) => {}
        }
    }

    // ========================================================================
    // Reactions
    // ========================================================================

    /// Applies the optimistic toggle. `None` when no video is active or the
    /// viewer has to sign in first (already queued).
    pub fn react(&mut self, kind: ReactionKind) -> Option<ReactionIntent> {
        let reactions = self.action_bar.reactions_mut()?;
        match reactions.react(kind, &self.session) {
            Ok(intent) => Some(intent),
            Err(auth) => {
                self.require_sign_in(auth);
                None
            }
        }
    }

    pub fn apply_reaction_loaded(
        &mut self,
        video_id: &str,
        seq: u64,
        result: Result<ReactionSummary, ApiError>,
    ) {
        match result {
            Ok(summary) => {
                if let Some(reactions) = self.action_bar.reactions_mut() {
                    reactions.apply_loaded(video_id, seq, summary);
                }
            }
            Err(e) => {
                tracing::debug!(video_id, error = %e, "Reaction summary fetch failed");
            }
        }
    }

    pub fn apply_reaction_saved(
        &mut self,
        intent: ReactionIntent,
        result: Result<ReactionSummary, ApiError>,
    ) -> Reconciled {
        let auth_failure = matches!(&result, Err(e) if e.kind() == ErrorKind::AuthRequired);
        let failure = result.as_ref().err().map(|e| Notice::from_error("Saving reaction", e));
        let Some(reactions) = self.action_bar.reactions_mut() else {
            return Reconciled::Stale;
        };
        let outcome = reactions.reconcile(intent, result);
        if auth_failure {
            let url = self.session.sign_in_url();
            self.require_sign_in(AuthRequired { sign_in_url: url });
        } else if let Some(notice) = failure {
            self.set_status(notice.message);
        }
        outcome
    }

    // ========================================================================
    // Session
    // ========================================================================

    pub fn apply_viewer(&mut self, result: Result<Option<Viewer>, ApiError>) {
        match result {
            Ok(viewer) => {
                if let Some(v) = &viewer {
                    let name = v.username.as_deref().or(v.name.as_deref()).unwrap_or(&v.id);
                    self.set_status(format!("Signed in as {}", name));
                }
                self.session.set_viewer(viewer);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to resolve session");
                self.session.set_viewer(None);
            }
        }
    }

    /// Link that opens the active video on the web, keyed by uid when the
    /// listing provides one.
    pub fn share_url(&self) -> Option<Url> {
        let video = self.pager.active_item()?;
        let key = video.uid.as_deref().unwrap_or(&video.id);
        let mut url = self.api.base_url().clone();
        url.set_path("/");
        url.query_pairs_mut().clear().append_pair("v", key);
        Some(url)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{build_http_client, Comment, CommentUser};
    use crate::feed::{Identity, PointerKind};
    use crate::playback::MediaEventKind;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn base() -> Url {
        Url::parse("http://localhost:3000/").unwrap()
    }

    fn test_app_with(session: SessionState) -> (App, mpsc::UnboundedReceiver<MediaEvent>) {
        let http = build_http_client(Duration::from_secs(1)).unwrap();
        let api = ApiClient::new(http, base(), None, Duration::from_secs(1));
        let (tx, rx) = mpsc::unbounded_channel();
        let app = App::with_shuffle(Config::default(), api, session, tx, Box::new(Identity));
        (app, rx)
    }

    fn test_app() -> (App, mpsc::UnboundedReceiver<MediaEvent>) {
        test_app_with(SessionState::signed_out(base()))
    }

    fn signed_in() -> SessionState {
        SessionState::signed_in(
            base(),
            Viewer {
                id: "me".into(),
                username: Some("me".into()),
                name: None,
            },
        )
    }

    fn video(id: &str) -> VideoRef {
        VideoRef {
            id: id.to_string(),
            uid: Some(format!("uid-{id}")),
            title: format!("Video {id}"),
            media_url: format!("https://cdn.example.com/{id}.mp4"),
            poster_url: None,
        }
    }

    fn page(ids: &[&str], next: Option<&str>) -> VideoPage {
        VideoPage {
            videos: ids.iter().map(|id| video(id)).collect(),
            next_cursor: next.map(String::from),
        }
    }

    fn comment(id: &str, video_id: &str) -> Comment {
        Comment {
            id: id.to_string(),
            user_id: "me".into(),
            video_id: video_id.to_string(),
            body: "hello".into(),
            created_at: Utc::now(),
            user: CommentUser {
                id: "me".into(),
                username: "me".into(),
                name: None,
                image: None,
            },
        }
    }

    fn load_first(app: &mut App, ids: &[&str]) -> Activation {
        let request = app.pager.begin_load().unwrap();
        let (_, activation) = app.apply_page(request, Ok(page(ids, Some("c1"))));
        activation.unwrap()
    }

    #[tokio::test]
    async fn test_first_page_activates_first_video() {
        let (mut app, _rx) = test_app();
        let activation = load_first(&mut app, &["a", "b", "c", "d"]);

        assert_eq!(app.active_video().map(|v| v.id.as_str()), Some("a"));
        assert_eq!(activation.count.as_ref().map(|c| c.video_id.as_str()), Some("a"));
        assert_eq!(activation.reaction.as_ref().map(|r| r.video_id.as_str()), Some("a"));
        // Window around index 0 with radius 2 covers a, b, c.
        let prefetched: Vec<&str> = activation.prefetch.iter().map(|t| t.video_id.as_str()).collect();
        assert_eq!(prefetched, vec!["a", "b", "c"]);
        assert_eq!(app.clip_count(), 3);
        assert!(app.playback.current_id().is_some());
    }

    #[tokio::test]
    async fn test_sync_active_does_not_refetch_pending_prefetch() {
        let (mut app, _rx) = test_app();
        load_first(&mut app, &["a", "b", "c", "d"]);
        let again = app.sync_active();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_active_clip_autoplays_with_global_mute() {
        let (mut app, mut rx) = test_app();
        load_first(&mut app, &["a", "b"]);
        while let Ok(event) = rx.try_recv() {
            app.handle_media_event(event);
        }
        let snap = app.playback.snapshot();
        assert!(snap.is_playing);
        assert!(snap.muted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_pauses_previous_clip() {
        let (mut app, mut rx) = test_app();
        load_first(&mut app, &["a", "b", "c"]);
        let first = app.playback.current_id();

        assert_eq!(app.pager.go_next(), Step::Moved { index: 1 });
        app.sync_active();
        assert_ne!(app.playback.current_id(), first);

        let mut saw_pause_for_first = false;
        while let Ok(event) = rx.try_recv() {
            if Some(event.element) == first && event.kind == MediaEventKind::Pause {
                saw_pause_for_first = true;
            }
            app.handle_media_event(event);
        }
        assert!(saw_pause_for_first);
        assert!(app.playback.snapshot().is_playing);
    }

    #[tokio::test]
    async fn test_gesture_suppressed_while_drawer_open() {
        let (mut app, _rx) = test_app();
        load_first(&mut app, &["a", "b"]);
        app.open_comments();

        let step = app.handle_gesture(GestureInput::Wheel { delta_y: 120.0 });
        assert_eq!(step, None);
        assert_eq!(app.pager.active_index(), 0);

        app.close_comments();
        app.handle_gesture(GestureInput::PressStart {
            kind: PointerKind::Mouse,
            y: 300.0,
            pointers: 1,
        });
        app.handle_gesture(GestureInput::PressMove {
            kind: PointerKind::Mouse,
            y: 200.0,
            pointers: 1,
        });
        let step = app.handle_gesture(GestureInput::PressEnd {
            kind: PointerKind::Mouse,
        });
        assert_eq!(step, Some(Step::Moved { index: 1 }));
    }

    #[tokio::test]
    async fn test_prefetch_result_reaches_open_drawer_once() {
        let (mut app, _rx) = test_app();
        let activation = load_first(&mut app, &["a", "b"]);
        assert_eq!(app.open_comments(), Some(DrawerOpen::AwaitPrefetch));

        let ticket = activation.prefetch.into_iter().find(|t| t.video_id == "a").unwrap();
        let list = CommentPage {
            items: vec![comment("c1", "a")],
            next_cursor: None,
        };
        assert!(app.apply_prefetch(ticket, Ok(list), Ok(7)).is_none());
        assert_eq!(app.drawer.items().len(), 1);
        assert_eq!(app.drawer.total_count(), 7);
        assert_eq!(app.action_bar.comment_count(), 7);
    }

    #[tokio::test]
    async fn test_failed_prefetch_hands_drawer_a_fetch() {
        let (mut app, _rx) = test_app();
        let activation = load_first(&mut app, &["a"]);
        app.open_comments();
        let ticket = activation.prefetch.into_iter().next().unwrap();
        let fetch = app
            .apply_prefetch(ticket, Err(ApiError::Timeout), Err(ApiError::Timeout))
            .unwrap();
        assert_eq!(fetch.page.video_id, "a");
        assert!(app.cache.get("a").is_none());
    }

    #[tokio::test]
    async fn test_posted_comment_patches_cache_and_bar_after_close() {
        let (mut app, _rx) = test_app_with(signed_in());
        let activation = load_first(&mut app, &["a"]);
        let ticket = activation.prefetch.into_iter().next().unwrap();
        app.apply_prefetch(ticket, Ok(CommentPage::default()), Ok(0));

        app.open_comments();
        for c in "nice".chars() {
            app.drawer.push_char(c);
        }
        let submit = app.drawer.begin_submit(&app.session).unwrap().unwrap();
        app.close_comments();

        app.apply_posted(
            submit,
            Ok(CreatedComment {
                item: comment("new", "a"),
                total_count: 1,
            }),
        );
        let entry = app.cache.get("a").unwrap();
        assert_eq!(entry.total_count, 1);
        assert_eq!(entry.items[0].id, "new");
        assert_eq!(app.action_bar.comment_count(), 1);
    }

    #[tokio::test]
    async fn test_react_signed_out_queues_sign_in() {
        let (mut app, _rx) = test_app();
        load_first(&mut app, &["a"]);
        assert!(app.react(ReactionKind::Like).is_none());
        let url = app.sign_in_request.take().unwrap();
        assert_eq!(url.path(), "/api/auth/signin");
    }

    #[tokio::test]
    async fn test_unauthorized_reaction_save_redirects() {
        let (mut app, _rx) = test_app_with(signed_in());
        load_first(&mut app, &["a"]);
        let intent = app.react(ReactionKind::Like).unwrap();
        let err = ApiError::HttpStatus {
            status: 401,
            message: None,
        };
        app.apply_reaction_saved(intent, Err(err));
        assert!(app.sign_in_request.is_some());
    }

    #[tokio::test]
    async fn test_reload_clears_feed_and_cache() {
        let (mut app, _rx) = test_app();
        let activation = load_first(&mut app, &["a", "b"]);
        for ticket in activation.prefetch {
            app.apply_prefetch(ticket, Ok(CommentPage::default()), Ok(0));
        }
        assert!(!app.cache.is_empty());

        let request = app.reload().unwrap();
        assert_eq!(request.cursor, None);
        assert!(app.pager.is_empty());
        assert!(app.cache.is_empty());
        assert_eq!(app.clip_count(), 0);
        assert!(app.playback.current_id().is_none());
        assert!(app.action_bar.video_id().is_none());
    }

    #[tokio::test]
    async fn test_stale_page_after_reload_is_ignored() {
        let (mut app, _rx) = test_app();
        let old = app.pager.begin_load().unwrap();
        app.reload();
        let (outcome, activation) = app.apply_page(old, Ok(page(&["x"], None)));
        assert!(outcome.stale);
        assert!(activation.is_none());
        assert!(app.pager.is_empty());
    }

    #[tokio::test]
    async fn test_share_url_prefers_uid() {
        let (mut app, _rx) = test_app();
        load_first(&mut app, &["a"]);
        assert_eq!(
            app.share_url().unwrap().as_str(),
            "http://localhost:3000/?v=uid-a"
        );
    }

    #[tokio::test]
    async fn test_set_status_and_expiry() {
        let (mut app, _rx) = test_app();
        app.set_status("hello");
        assert!(!app.clear_expired_status());
        app.status_message = Some(("old".into(), Instant::now() - Duration::from_secs(4)));
        assert!(app.clear_expired_status());
        assert!(app.status_message.is_none());
    }
}
