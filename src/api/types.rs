use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A video as listed in the feed.
///
/// The listing endpoint returns full records; only the fields the client
/// renders are kept. `videoUrl`/`thumbnailUrl` are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRef {
    pub id: String,
    #[serde(default)]
    pub uid: Option<String>,
    pub title: String,
    #[serde(alias = "videoUrl")]
    pub media_url: String,
    #[serde(default, alias = "thumbnailUrl")]
    pub poster_url: Option<String>,
}

/// One page of the feed listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPage {
    #[serde(default)]
    pub videos: Vec<VideoRef>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommentUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl CommentUser {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub user_id: String,
    pub video_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub user: CommentUser,
}

/// One page of comments, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPage {
    #[serde(default)]
    pub items: Vec<Comment>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Result of creating a comment: the stored item and the new total.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedComment {
    pub item: Comment,
    pub total_count: u64,
}

/// A persisted reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReactionKind {
    Like,
    Dislike,
}

/// Reaction requested from the server; `None` clears the viewer's reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReactionType {
    Like,
    Dislike,
    None,
}

impl From<Option<ReactionKind>> for ReactionType {
    fn from(kind: Option<ReactionKind>) -> Self {
        match kind {
            Some(ReactionKind::Like) => ReactionType::Like,
            Some(ReactionKind::Dislike) => ReactionType::Dislike,
            None => ReactionType::None,
        }
    }
}

impl From<ReactionType> for Option<ReactionKind> {
    fn from(t: ReactionType) -> Self {
        match t {
            ReactionType::Like => Some(ReactionKind::Like),
            ReactionType::Dislike => Some(ReactionKind::Dislike),
            ReactionType::None => None,
        }
    }
}

/// Aggregate reaction counts plus the viewer's own reaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReactionSummary {
    pub like_count: u64,
    pub dislike_count: u64,
    pub my_reaction: Option<ReactionKind>,
}

/// The signed-in viewer as resolved by the identity provider's session
/// endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    /// The service's own user id; comment ownership is checked against it.
    pub id: String,
    pub username: Option<String>,
    pub name: Option<String>,
}

/// Body of the video creation call, sent after the blob upload finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVideo {
    pub uid: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub storage_path: String,
    pub video_url: String,
}

/// The created video as echoed back by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: String,
    pub uid: String,
    pub title: String,
    pub video_url: String,
}
