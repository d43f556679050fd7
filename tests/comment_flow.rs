//! Integration tests for the comment cache, drawer, action bar and reaction
//! controller working together against in-memory collaborators.
//!
//! The fakes count every call so tests can assert on the number of round
//! trips, not just on the resulting state.

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use shortfeed::action_bar::ActionBar;
use shortfeed::api::{
    ApiError, Comment, CommentPage, CommentSource, CommentUser, CreatedComment, ReactionKind,
    ReactionSource, ReactionSummary, ReactionType, Viewer,
};
use shortfeed::comments::{CommentCache, CommentDrawer, DrawerOpen};
use shortfeed::reaction::{ReactionController, Reconciled};
use shortfeed::session::SessionState;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

fn base() -> Url {
    Url::parse("http://localhost:3000/").unwrap()
}

fn viewer_session(id: &str) -> SessionState {
    SessionState::signed_in(
        base(),
        Viewer {
            id: id.into(),
            username: Some(id.into()),
            name: None,
        },
    )
}

fn comment(id: &str, author: &str, video_id: &str) -> Comment {
    Comment {
        id: id.into(),
        user_id: author.into(),
        video_id: video_id.into(),
        body: format!("comment {id}"),
        created_at: Utc.with_ymd_and_hms(2025, 5, 1, 9, 30, 0).unwrap(),
        user: CommentUser {
            id: author.into(),
            username: author.into(),
            name: None,
            image: None,
        },
    }
}

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct FakeComments {
    items: Mutex<Vec<Comment>>,
    list_calls: AtomicUsize,
    count_calls: AtomicUsize,
    create_calls: AtomicUsize,
    fail_delete: bool,
}

impl FakeComments {
    fn with_items(items: Vec<Comment>) -> Self {
        Self {
            items: Mutex::new(items),
            ..Self::default()
        }
    }

    fn network_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
            + self.count_calls.load(Ordering::SeqCst)
            + self.create_calls.load(Ordering::SeqCst)
    }
}

impl CommentSource for FakeComments {
    async fn list_comments(
        &self,
        _video_id: String,
        cursor: Option<String>,
        take: u32,
    ) -> Result<CommentPage, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        // Let concurrent callers interleave.
        tokio::task::yield_now().await;
        let items = self.items.lock().clone();
        let start = match cursor {
            Some(c) => items.iter().position(|i| i.id == c).map_or(items.len(), |p| p + 1),
            None => 0,
        };
        let page: Vec<Comment> = items.iter().skip(start).take(take as usize).cloned().collect();
        let next_cursor = if start + page.len() < items.len() {
            page.last().map(|c| c.id.clone())
        } else {
            None
        };
        Ok(CommentPage {
            items: page,
            next_cursor,
        })
    }

    async fn comment_count(&self, _video_id: String) -> Result<u64, ApiError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(self.items.lock().len() as u64)
    }

    async fn create_comment(&self, video_id: String, body: String) -> Result<CreatedComment, ApiError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut items = self.items.lock();
        let mut item = comment(&format!("new{}", items.len()), "me", &video_id);
        item.body = body;
        items.insert(0, item.clone());
        Ok(CreatedComment {
            item,
            total_count: items.len() as u64,
        })
    }

    async fn delete_comment(&self, comment_id: String) -> Result<u64, ApiError> {
        if self.fail_delete {
            return Err(ApiError::HttpStatus {
                status: 500,
                message: Some("boom".into()),
            });
        }
        let mut items = self.items.lock();
        items.retain(|c| c.id != comment_id);
        Ok(items.len() as u64)
    }
}

/// Reaction endpoint with the server's toggle semantics.
struct FakeReactions {
    state: Mutex<ReactionSummary>,
    calls: AtomicUsize,
}

impl FakeReactions {
    fn new(like: u64, dislike: u64) -> Self {
        Self {
            state: Mutex::new(ReactionSummary {
                like_count: like,
                dislike_count: dislike,
                my_reaction: None,
            }),
            calls: AtomicUsize::new(0),
        }
    }
}

impl ReactionSource for FakeReactions {
    async fn get_reaction(&self, _video_id: String) -> Result<ReactionSummary, ApiError> {
        Ok(*self.state.lock())
    }

    async fn set_reaction(&self, _video_id: String, kind: ReactionType) -> Result<ReactionSummary, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut s = self.state.lock();
        match s.my_reaction {
            Some(ReactionKind::Like) => s.like_count -= 1,
            Some(ReactionKind::Dislike) => s.dislike_count -= 1,
            None => {}
        }
        s.my_reaction = kind.into();
        match s.my_reaction {
            Some(ReactionKind::Like) => s.like_count += 1,
            Some(ReactionKind::Dislike) => s.dislike_count += 1,
            None => {}
        }
        Ok(*s)
    }
}

// ============================================================================
// Cache + drawer
// ============================================================================

#[tokio::test]
async fn test_drawer_opens_from_cache_without_network() {
    let source = FakeComments::with_items(vec![
        comment("c2", "bob", "v1"),
        comment("c1", "amy", "v1"),
    ]);
    let cache = CommentCache::new();
    assert!(cache.prefetch(&source, "v1", 20).await);
    let calls_after_prefetch = source.network_calls();
    assert_eq!(calls_after_prefetch, 2);

    let mut drawer = CommentDrawer::new(20);
    assert_eq!(drawer.open("v1", &cache), DrawerOpen::WarmStart);

    assert_eq!(source.network_calls(), calls_after_prefetch);
    let entry = cache.get("v1").unwrap();
    assert_eq!(drawer.items(), entry.items.as_slice());
    assert_eq!(drawer.total_count(), entry.total_count);
    assert_eq!(drawer.total_count(), 2);
}

#[tokio::test]
async fn test_concurrent_prefetch_is_one_round_trip_pair() {
    let source = FakeComments::with_items(vec![comment("c1", "amy", "v1")]);
    let cache = CommentCache::new();

    let results =
        futures::future::join_all((0..8).map(|_| cache.prefetch(&source, "v1", 20))).await;

    assert_eq!(results.iter().filter(|stored| **stored).count(), 1);
    assert_eq!(source.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(source.count_calls.load(Ordering::SeqCst), 1);

    // A later call is a no-op too.
    assert!(!cache.prefetch(&source, "v1", 20).await);
    assert_eq!(source.list_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cold_drawer_pages_through_comments() {
    let items: Vec<Comment> = (0..5)
        .rev()
        .map(|i| comment(&format!("c{i}"), "amy", "v1"))
        .collect();
    let source = FakeComments::with_items(items);
    let cache = CommentCache::new();
    let mut drawer = CommentDrawer::new(2);

    let DrawerOpen::Fetch(fetch) = drawer.open("v1", &cache) else {
        panic!("expected a cold fetch");
    };
    drawer.run_fetch(&source, fetch).await;
    assert_eq!(drawer.items().len(), 2);
    assert_eq!(drawer.total_count(), 5);
    assert!(drawer.has_more());

    assert!(drawer.load_more_with(&source).await);
    assert!(drawer.load_more_with(&source).await);
    assert_eq!(drawer.items().len(), 5);
    assert!(!drawer.has_more());
    assert!(!drawer.load_more_with(&source).await);

    let ids: Vec<&str> = drawer.items().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["c4", "c3", "c2", "c1", "c0"]);
}

#[tokio::test]
async fn test_post_and_delete_patch_shared_cache_and_bar() {
    let source = FakeComments::with_items(vec![comment("c1", "amy", "v1")]);
    let session = viewer_session("me");
    let cache = CommentCache::new();
    cache.prefetch(&source, "v1", 20).await;

    let mut bar = ActionBar::new(Some(cache.clone()), true);
    assert!(bar.uses_shared_cache());
    let refresh = bar.set_video("v1").unwrap();
    assert_eq!(bar.comment_count(), 1);

    let mut drawer = CommentDrawer::new(20);
    drawer.open("v1", &cache);
    for c in "  first!  ".chars() {
        drawer.push_char(c);
    }
    let created = drawer.submit_with(&source, &session).await.unwrap().unwrap().unwrap();
    assert_eq!(created.item.body, "first!");
    cache.record_created(&created.item, created.total_count);
    bar.apply_count("v1", created.total_count);

    assert_eq!(drawer.total_count(), 2);
    assert_eq!(bar.comment_count(), 2);
    let entry = cache.get("v1").unwrap();
    assert_eq!(entry.total_count, 2);
    assert_eq!(entry.items[0].id, created.item.id);

    let total = drawer
        .delete_with(&source, &created.item.id, &session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    cache.record_deleted("v1", &created.item.id, total);
    bar.apply_count("v1", total);
    assert_eq!(bar.comment_count(), 1);
    assert_eq!(cache.get("v1").unwrap().total_count, 1);

    // The refresh issued on video change still lands.
    assert!(bar.refresh_count_with(&source, refresh).await);
    assert_eq!(bar.comment_count(), 1);
}

#[tokio::test]
async fn test_failed_delete_restores_comment() {
    let source = FakeComments {
        items: Mutex::new(vec![comment("c1", "me", "v1"), comment("c0", "me", "v1")]),
        fail_delete: true,
        ..FakeComments::default()
    };
    let session = viewer_session("me");
    let cache = CommentCache::new();
    cache.prefetch(&source, "v1", 20).await;

    let mut drawer = CommentDrawer::new(20);
    drawer.open("v1", &cache);
    let result = drawer.delete_with(&source, "c1", &session).await.unwrap().unwrap();
    assert!(result.is_err());

    let ids: Vec<&str> = drawer.items().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c0"]);
    assert!(drawer.notice().is_some());
}

#[tokio::test]
async fn test_signed_out_submit_asks_for_sign_in() {
    let source = FakeComments::default();
    let session = SessionState::signed_out(base());
    let cache = CommentCache::new();
    cache.prefetch(&source, "v1", 20).await;

    let mut drawer = CommentDrawer::new(20);
    drawer.open("v1", &cache);
    drawer.push_char('x');
    let err = drawer.submit_with(&source, &session).await.unwrap_err();
    assert_eq!(err.sign_in_url.path(), "/api/auth/signin");
    assert_eq!(source.create_calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Reactions
// ============================================================================

#[tokio::test]
async fn test_like_twice_returns_to_start() {
    let server = FakeReactions::new(3, 1);
    let session = viewer_session("me");
    let mut controller = ReactionController::new("v1", true);
    controller.load_with(&server).await.unwrap();
    let before = controller.summary();

    let first = controller.react_with(&server, ReactionKind::Like, &session).await.unwrap();
    assert_eq!(first, Reconciled::Confirmed);
    assert_eq!(controller.like_count(), 4);

    controller.react_with(&server, ReactionKind::Like, &session).await.unwrap();
    assert_eq!(controller.summary(), before);
    assert_eq!(server.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_dislike_is_optimistic_then_confirmed() {
    let server = FakeReactions::new(5, 2);
    let session = viewer_session("me");
    let mut controller = ReactionController::new("v1", true);
    controller.load_with(&server).await.unwrap();

    let intent = controller.react(ReactionKind::Dislike, &session).unwrap();
    assert_eq!(intent.requested, ReactionType::Dislike);
    assert_eq!(
        (controller.like_count(), controller.dislike_count()),
        (5, 3)
    );
    assert_eq!(controller.my_reaction(), Some(ReactionKind::Dislike));

    let confirmed = server
        .set_reaction(intent.video_id.clone(), intent.requested)
        .await;
    assert_eq!(controller.reconcile(intent, confirmed), Reconciled::Confirmed);
    assert_eq!(
        controller.summary(),
        ReactionSummary {
            like_count: 5,
            dislike_count: 3,
            my_reaction: Some(ReactionKind::Dislike),
        }
    );
}

#[tokio::test]
async fn test_swap_like_to_dislike() {
    let server = FakeReactions::new(0, 0);
    let session = viewer_session("me");
    let mut controller = ReactionController::new("v1", true);
    controller.load_with(&server).await.unwrap();

    controller.react_with(&server, ReactionKind::Like, &session).await.unwrap();
    controller.react_with(&server, ReactionKind::Dislike, &session).await.unwrap();
    assert_eq!(
        (controller.like_count(), controller.dislike_count()),
        (0, 1)
    );
    assert_eq!(controller.my_reaction(), Some(ReactionKind::Dislike));
}
