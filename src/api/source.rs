use super::error::ApiError;
use super::types::{
    CommentPage, CreatedComment, NewVideo, ReactionSummary, ReactionType, VideoPage, VideoRecord,
};
use std::future::Future;

/// Paginated video listing.
pub trait VideoSource: Send + Sync {
    fn fetch_videos(
        &self,
        cursor: Option<String>,
        limit: u32,
    ) -> impl Future<Output = Result<VideoPage, ApiError>> + Send;
}

/// Comment list, count and mutations for a video.
pub trait CommentSource: Send + Sync {
    fn list_comments(
        &self,
        video_id: String,
        cursor: Option<String>,
        take: u32,
    ) -> impl Future<Output = Result<CommentPage, ApiError>> + Send;

    fn comment_count(&self, video_id: String)
        -> impl Future<Output = Result<u64, ApiError>> + Send;

    fn create_comment(
        &self,
        video_id: String,
        body: String,
    ) -> impl Future<Output = Result<CreatedComment, ApiError>> + Send;

    /// Deletes a comment and returns the video's updated total.
    fn delete_comment(&self, comment_id: String)
        -> impl Future<Output = Result<u64, ApiError>> + Send;
}

/// Reaction aggregate and the viewer's own reaction.
pub trait ReactionSource: Send + Sync {
    fn get_reaction(
        &self,
        video_id: String,
    ) -> impl Future<Output = Result<ReactionSummary, ApiError>> + Send;

    fn set_reaction(
        &self,
        video_id: String,
        reaction: ReactionType,
    ) -> impl Future<Output = Result<ReactionSummary, ApiError>> + Send;
}

/// Creates the video record once its media is in blob storage.
pub trait VideoPublisher: Send + Sync {
    fn create_video(&self, video: NewVideo)
        -> impl Future<Output = Result<VideoRecord, ApiError>> + Send;
}
