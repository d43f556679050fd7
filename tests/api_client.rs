//! End-to-end tests of the client core against a mock HTTP service.

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use shortfeed::api::{build_http_client, ApiClient, ReactionKind, Viewer};
use shortfeed::comments::CommentCache;
use shortfeed::feed::{FeedPager, Identity, PagerSettings};
use shortfeed::reaction::{ReactionController, Reconciled};
use shortfeed::session::SessionState;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, token: Option<&str>) -> ApiClient {
    let http = build_http_client(Duration::from_secs(5)).unwrap();
    ApiClient::new(
        http,
        Url::parse(&server.uri()).unwrap(),
        token.map(|t| SecretString::from(t.to_string())),
        Duration::from_secs(5),
    )
}

fn comment_json(id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "userId": "u2",
        "videoId": "v1",
        "body": format!("comment {id}"),
        "createdAt": "2026-03-01T12:00:00Z",
        "user": {"id": "u2", "username": "bob"}
    })
}

#[tokio::test]
async fn test_concurrent_prefetch_hits_each_endpoint_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/videos/v1/comments"))
        .and(query_param("take", "20"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({
                    "items": [comment_json("c2"), comment_json("c1")],
                    "nextCursor": "c1"
                }))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/videos/v1/comment-count"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true, "count": 9})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let cache = CommentCache::new();
    let results =
        futures::future::join_all((0..4).map(|_| cache.prefetch(&client, "v1", 20))).await;

    assert_eq!(results.iter().filter(|stored| **stored).count(), 1);
    let entry = cache.get("v1").unwrap();
    assert_eq!(entry.total_count, 9);
    assert_eq!(entry.items.len(), 2);
    assert_eq!(entry.next_cursor.as_deref(), Some("c1"));

    // Cached: a later prefetch makes no request.
    assert!(!cache.prefetch(&client, "v1", 20).await);
}

#[tokio::test]
async fn test_failed_count_still_caches_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/videos/v1/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [comment_json("c1")],
            "nextCursor": null
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/videos/v1/comment-count"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let cache = CommentCache::new();
    assert!(cache.prefetch(&client, "v1", 20).await);
    assert_eq!(cache.get("v1").unwrap().total_count, 1);
}

#[tokio::test]
async fn test_pager_reads_cursor_pages_until_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/videos"))
        .and(query_param("cursor", "n1"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "videos": [],
            "nextCursor": null
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/videos"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "videos": [
                {"id": "v1", "uid": "a", "title": "One", "videoUrl": "https://cdn/v1.mp4"},
                {"id": "v2", "uid": "b", "title": "Two", "videoUrl": "https://cdn/v2.mp4"}
            ],
            "nextCursor": "n1"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let mut pager = FeedPager::new(Box::new(Identity), PagerSettings::default());
    assert!(pager.load_more(&client).await);
    assert_eq!(pager.len(), 2);
    assert_eq!(pager.active_item().map(|v| v.id.as_str()), Some("v1"));

    assert!(!pager.load_more(&client).await);
    assert!(pager.is_exhausted());
    assert_eq!(pager.len(), 2);
}

#[tokio::test]
async fn test_reaction_round_trip_with_session_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/videos/v1/reaction"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "likeCount": 5, "dislikeCount": 2, "myReaction": null
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/videos/v1/reaction"))
        .and(body_json(serde_json::json!({"type": "DISLIKE"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "likeCount": 5, "dislikeCount": 3, "myReaction": "DISLIKE"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("tok"));
    let session = SessionState::signed_in(
        Url::parse(&server.uri()).unwrap(),
        Viewer {
            id: "u1".into(),
            username: None,
            name: None,
        },
    );

    let mut reactions = ReactionController::new("v1", true);
    reactions.load_with(&client).await.unwrap();
    assert_eq!((reactions.like_count(), reactions.dislike_count()), (5, 2));

    let outcome = reactions
        .react_with(&client, ReactionKind::Dislike, &session)
        .await
        .unwrap();
    assert!(matches!(outcome, Reconciled::Confirmed));
    assert_eq!(reactions.dislike_count(), 3);
    assert_eq!(reactions.my_reaction(), Some(ReactionKind::Dislike));
}
