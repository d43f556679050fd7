//! The swipeable video feed.
//!
//! - [`pager`] - cursor pagination, id dedup, active index and render window
//! - [`gesture`] - wheel/touch/mouse input reduced to next/prev steps
//! - [`shuffle`] - injectable page ordering

mod gesture;
mod pager;
mod shuffle;

pub use gesture::{classify, Direction, GestureInput, GestureTracker, PointerKind};
pub use pager::{FeedPager, LoadOutcome, LoadState, PageRequest, PagerSettings, Step};
pub use shuffle::{FisherYates, Identity, Shuffle};
