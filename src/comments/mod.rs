//! Comment data shared between the feed window and the comment drawer.

mod cache;
mod drawer;

pub use cache::{CommentCache, CommentCacheEntry, PrefetchTicket};
pub use drawer::{
    validate_body, CommentDrawer, CommentInputError, CountTicket, DeleteTicket, DrawerFetch, DrawerOpen,
    PageTicket, SubmitTicket, MAX_COMMENT_CHARS,
};
