//! Helper functions for UI operations.
//!
//! Every network call the UI makes goes through one of the `spawn_*`
//! functions here. Each runs on its own tokio task, catches panics, and
//! reports back through an [`AppEvent`].

use crate::api::{ApiClient, ApiError, CommentSource, ReactionSource, VideoSource};
use crate::app::{Activation, App, AppEvent};
use crate::comments::{DeleteTicket, DrawerFetch, PageTicket, SubmitTicket};
use crate::feed::PageRequest;
use crate::reaction::ReactionIntent;
use crate::util::validate_media_url;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Wraps a future to catch panics and convert them to errors.
///
/// Instead of the task silently disappearing (caught by Tokio's runtime but
/// not handled), panics are converted to `Err(String)` containing the panic
/// message.
pub(super) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else if let Some(e) = panic.downcast_ref::<Box<dyn std::error::Error + Send>>() {
                e.to_string()
            } else {
                format!("Unknown panic: {:?}", (*panic).type_id())
            }
        })
}

/// Runs `work` in the background and sends the event it produces. A panic
/// becomes `AppEvent::TaskPanicked`.
fn spawn_event<F>(task: &'static str, tx: &mpsc::Sender<AppEvent>, work: F) -> AbortHandle
where
    F: Future<Output = AppEvent> + Send + 'static,
{
    spawn_event_or(task, tx, work, move |error| AppEvent::TaskPanicked { task, error })
}

/// Like [`spawn_event`], but a panic is turned into the event built by
/// `on_panic`. Used where the receiving state holds a slot that only the
/// task's own result releases.
fn spawn_event_or<F, P>(
    task: &'static str,
    tx: &mpsc::Sender<AppEvent>,
    work: F,
    on_panic: P,
) -> AbortHandle
where
    F: Future<Output = AppEvent> + Send + 'static,
    P: FnOnce(String) -> AppEvent + Send + 'static,
{
    let tx = tx.clone();
    let handle = tokio::spawn(async move {
        let event = match catch_task_panic(work).await {
            Ok(event) => event,
            Err(panic_msg) => {
                tracing::error!(task, error = %panic_msg, "Background task panicked");
                on_panic(panic_msg)
            }
        };
        if let Err(e) = tx.send(event).await {
            tracing::warn!(task, error = %e, "Channel send failed (receiver dropped)");
        }
    });
    handle.abort_handle()
}

pub(super) fn spawn_page_load(api: &ApiClient, request: PageRequest, tx: &mpsc::Sender<AppEvent>) {
    let api = api.clone();
    tracing::debug!(cursor = ?request.cursor, limit = request.limit, "Spawning page load");
    let fallback = request.clone();
    spawn_event_or(
        "page_load",
        tx,
        async move {
            let result = api.fetch_videos(request.cursor.clone(), request.limit).await;
            AppEvent::PageLoaded { request, result }
        },
        move |error| AppEvent::PageLoaded {
            request: fallback,
            result: Err(ApiError::TaskFailed(error)),
        },
    );
}

/// Starts the count refresh, reaction load and comment prefetches that
/// follow an active video change.
pub(super) fn spawn_activation(app: &mut App, activation: Activation, tx: &mpsc::Sender<AppEvent>) {
    let take = app.config.comment_take();

    if let Some(refresh) = activation.count {
        let api = app.api.clone();
        let handle = spawn_event("comment_count", tx, async move {
            let result = api.comment_count(refresh.video_id.clone()).await;
            AppEvent::CommentCountLoaded { refresh, result }
        });
        app.track_video_task(handle);
    }

    if let Some(load) = activation.reaction {
        let api = app.api.clone();
        let handle = spawn_event("reaction_load", tx, async move {
            let result = api.get_reaction(load.video_id.clone()).await;
            AppEvent::ReactionLoaded {
                video_id: load.video_id,
                seq: load.seq,
                result,
            }
        });
        app.track_video_task(handle);
    }

    // Prefetches fill a session-wide cache and are not tied to one video.
    for ticket in activation.prefetch {
        let api = app.api.clone();
        let fallback = ticket.clone();
        spawn_event_or(
            "prefetch",
            tx,
            async move {
                let video_id = ticket.video_id.clone();
                let (list, count) = futures::join!(
                    api.list_comments(video_id.clone(), None, take),
                    api.comment_count(video_id),
                );
                AppEvent::CommentsPrefetched {
                    ticket,
                    list,
                    count,
                }
            },
            move |error| AppEvent::CommentsPrefetched {
                ticket: fallback,
                list: Err(ApiError::TaskFailed(error.clone())),
                count: Err(ApiError::TaskFailed(error)),
            },
        );
    }
}

/// Fetches the drawer's first page and count in parallel. Both tasks are
/// aborted when the drawer closes.
pub(super) fn spawn_drawer_fetch(app: &mut App, fetch: DrawerFetch, tx: &mpsc::Sender<AppEvent>) {
    let DrawerFetch { page, count } = fetch;
    spawn_drawer_page(app, page, tx);

    let api = app.api.clone();
    let handle = spawn_event("drawer_count", tx, async move {
        let result = api.comment_count(count.video_id.clone()).await;
        AppEvent::DrawerCount {
            ticket: count,
            result,
        }
    });
    app.drawer.track_fetch(handle);
}

pub(super) fn spawn_drawer_page(app: &mut App, ticket: PageTicket, tx: &mpsc::Sender<AppEvent>) {
    let api = app.api.clone();
    let handle = spawn_event("drawer_page", tx, async move {
        let result = api
            .list_comments(ticket.video_id.clone(), ticket.cursor.clone(), ticket.take)
            .await;
        AppEvent::DrawerPage { ticket, result }
    });
    app.drawer.track_fetch(handle);
}

/// Posting is not aborted with the drawer; the server may already have
/// stored the comment.
pub(super) fn spawn_submit(api: &ApiClient, ticket: SubmitTicket, tx: &mpsc::Sender<AppEvent>) {
    let api = api.clone();
    spawn_event("comment_post", tx, async move {
        let result = api
            .create_comment(ticket.video_id.clone(), ticket.body.clone())
            .await;
        AppEvent::CommentPosted { ticket, result }
    });
}

pub(super) fn spawn_delete(api: &ApiClient, ticket: DeleteTicket, tx: &mpsc::Sender<AppEvent>) {
    let api = api.clone();
    spawn_event("comment_delete", tx, async move {
        let result = api.delete_comment(ticket.comment_id.clone()).await;
        AppEvent::CommentDeleted { ticket, result }
    });
}

/// The reaction request is never cancelled.
pub(super) fn spawn_reaction_save(api: &ApiClient, intent: ReactionIntent, tx: &mpsc::Sender<AppEvent>) {
    let api = api.clone();
    spawn_event("reaction_save", tx, async move {
        let result = api
            .set_reaction(intent.video_id.clone(), intent.requested)
            .await;
        AppEvent::ReactionSaved { intent, result }
    });
}

pub(super) fn spawn_viewer_resolve(api: &ApiClient, tx: &mpsc::Sender<AppEvent>) {
    let api = api.clone();
    spawn_event("viewer", tx, async move {
        AppEvent::ViewerResolved {
            result: api.fetch_viewer().await,
        }
    });
}

/// Opens a queued sign-in page in the system browser.
pub(super) fn open_pending_sign_in(app: &mut App) {
    let Some(url) = app.sign_in_request.take() else {
        return;
    };
    if let Err(e) = open::that(url.as_str()) {
        tracing::warn!(url = %url, error = %e, "Failed to open browser");
        app.set_status(format!("Sign in at {}", url));
    }
}

/// Hands the active video's media URL to the system player.
pub(super) fn open_active_media(app: &mut App) {
    let Some(video) = app.active_video() else {
        return;
    };
    let media_url = video.media_url.clone();
    // SEC: Validate URL before open::that() to prevent command injection
    match validate_media_url(&media_url) {
        Ok(url) => {
            if let Err(e) = open::that(url.as_str()) {
                app.set_status(format!("Failed to open player: {}", e));
            } else {
                app.set_status("Opened in player");
            }
        }
        Err(e) => {
            tracing::warn!(url = %media_url, error = %e, "Refusing to open media URL");
            app.set_status(format!("Invalid media URL: {}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_catch_task_panic_ok() {
        let result = catch_task_panic(async { 42 }).await;
        assert_eq!(result, Ok(42));
    }

    fn explode(msg: &str) -> u32 {
        panic!("{}", msg)
    }

    fn explode_static() -> u32 {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_catch_task_panic_str_message() {
        let result = catch_task_panic(async { explode_static() }).await;
        assert_eq!(result, Err("boom".to_string()));
    }

    #[tokio::test]
    async fn test_catch_task_panic_formatted_message() {
        let result = catch_task_panic(async { explode("bad video 7") }).await;
        assert_eq!(result, Err("bad video 7".to_string()));
    }

    #[tokio::test]
    async fn test_spawned_panic_is_reported() {
        let (tx, mut rx) = mpsc::channel(4);
        spawn_event("test_task", &tx, async {
            explode("kaboom");
            AppEvent::ViewerResolved { result: Ok(None) }
        });
        match rx.recv().await {
            Some(AppEvent::TaskPanicked { task, error }) => {
                assert_eq!(task, "test_task");
                assert_eq!(error, "kaboom");
            }
            _ => panic!("expected TaskPanicked"),
        }
    }

    #[tokio::test]
    async fn test_panicked_page_load_releases_pager() {
        use crate::api::ErrorKind;
        use crate::feed::{FeedPager, Identity, PagerSettings};

        let mut pager = FeedPager::new(Box::new(Identity), PagerSettings::default());
        let request = pager.begin_load().unwrap();
        let fallback = request.clone();
        let (tx, mut rx) = mpsc::channel(4);
        spawn_event_or(
            "page_load",
            &tx,
            async move {
                explode("decoder bug");
                AppEvent::PageLoaded {
                    request,
                    result: Ok(Default::default()),
                }
            },
            move |error| AppEvent::PageLoaded {
                request: fallback,
                result: Err(ApiError::TaskFailed(error)),
            },
        );

        let Some(AppEvent::PageLoaded { request, result }) = rx.recv().await else {
            panic!("expected PageLoaded");
        };
        assert_eq!(result.as_ref().unwrap_err().kind(), ErrorKind::Transport);
        pager.complete_load(request, result);
        assert!(!pager.is_loading());
        assert!(pager.last_error().unwrap().is_retryable());
        assert!(pager.begin_load().is_some());
    }

    #[tokio::test]
    async fn test_panicked_prefetch_clears_pending() {
        use crate::comments::CommentCache;

        let cache = CommentCache::new();
        let ticket = cache.begin_prefetch("v1").unwrap();
        let fallback = ticket.clone();
        let (tx, mut rx) = mpsc::channel(4);
        spawn_event_or(
            "prefetch",
            &tx,
            async move {
                explode_static();
                AppEvent::CommentsPrefetched {
                    ticket,
                    list: Ok(Default::default()),
                    count: Ok(0),
                }
            },
            move |error| AppEvent::CommentsPrefetched {
                ticket: fallback,
                list: Err(ApiError::TaskFailed(error.clone())),
                count: Err(ApiError::TaskFailed(error)),
            },
        );

        let Some(AppEvent::CommentsPrefetched { ticket, list, count }) = rx.recv().await else {
            panic!("expected CommentsPrefetched");
        };
        assert!(!cache.complete_prefetch(ticket, list, count));
        assert!(!cache.is_pending("v1"));
        assert!(cache.begin_prefetch("v1").is_some());
    }
}
