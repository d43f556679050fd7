//! Like/dislike state for one video with optimistic updates.

use crate::api::{ApiError, ReactionKind, ReactionSource, ReactionSummary, ReactionType};
use crate::session::{AuthRequired, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Counts {
    like: u64,
    dislike: u64,
    mine: Option<ReactionKind>,
}

/// A reaction change already applied locally, waiting for the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionIntent {
    pub video_id: String,
    /// What to persist; `None` clears the viewer's reaction.
    pub requested: ReactionType,
    seq: u64,
    before: Counts,
}

/// What [`ReactionController::reconcile`] did with a server result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Server state replaced the local state.
    Confirmed,
    /// The request failed and the optimistic delta was reverted.
    RolledBack,
    /// The request failed and the optimistic state was left as is.
    Kept,
    /// A newer change or another video owns the state now.
    Stale,
}

#[derive(Debug, Clone)]
pub struct ReactionController {
    video_id: String,
    counts: Counts,
    seq: u64,
    loaded: bool,
    rollback: bool,
}

impl ReactionController {
    /// `rollback` selects whether a failed request reverts its optimistic
    /// delta.
    pub fn new(video_id: impl Into<String>, rollback: bool) -> Self {
        Self {
            video_id: video_id.into(),
            counts: Counts {
                like: 0,
                dislike: 0,
                mine: None,
            },
            seq: 0,
            loaded: false,
            rollback,
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn like_count(&self) -> u64 {
        self.counts.like
    }

    pub fn dislike_count(&self) -> u64 {
        self.counts.dislike
    }

    pub fn my_reaction(&self) -> Option<ReactionKind> {
        self.counts.mine
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn summary(&self) -> ReactionSummary {
        ReactionSummary {
            like_count: self.counts.like,
            dislike_count: self.counts.dislike,
            my_reaction: self.counts.mine,
        }
    }

    fn overwrite(&mut self, summary: ReactionSummary) {
        self.counts = Counts {
            like: summary.like_count,
            dislike: summary.dislike_count,
            mine: summary.my_reaction,
        };
        self.loaded = true;
    }

    /// Sequence number to pass back to [`apply_loaded`](Self::apply_loaded).
    pub fn begin_load(&self) -> u64 {
        self.seq
    }

    /// Applies a fetched summary unless the viewer reacted in the meantime.
    pub fn apply_loaded(&mut self, video_id: &str, seq: u64, summary: ReactionSummary) -> bool {
        if video_id != self.video_id || seq != self.seq {
            return false;
        }
        self.overwrite(summary);
        true
    }

    /// Applies the toggle locally and returns what to persist.
    ///
    /// Asking for the reaction already held clears it; asking for the other
    /// one swaps directly.
    pub fn react(
        &mut self,
        kind: ReactionKind,
        session: &SessionState,
    ) -> Result<ReactionIntent, AuthRequired> {
        session.require()?;

        let before = self.counts;
        let prev = before.mine;
        let next = if prev == Some(kind) { None } else { Some(kind) };

        let mut like = before.like;
        let mut dislike = before.dislike;
        match prev {
            Some(ReactionKind::Like) => like = like.saturating_sub(1),
            Some(ReactionKind::Dislike) => dislike = dislike.saturating_sub(1),
            None => {}
        }
        match next {
            Some(ReactionKind::Like) => like += 1,
            Some(ReactionKind::Dislike) => dislike += 1,
            None => {}
        }

        self.counts = Counts {
            like,
            dislike,
            mine: next,
        };
        self.seq += 1;

        tracing::debug!(
            video_id = %self.video_id,
            from = ?prev,
            to = ?next,
            "Optimistic reaction applied"
        );

        Ok(ReactionIntent {
            video_id: self.video_id.clone(),
            requested: ReactionType::from(next),
            seq: self.seq,
            before,
        })
    }

    /// Folds the server's answer to `intent` back into local state.
    pub fn reconcile(
        &mut self,
        intent: ReactionIntent,
        result: Result<ReactionSummary, ApiError>,
    ) -> Reconciled {
        if intent.video_id != self.video_id {
            return Reconciled::Stale;
        }
        match result {
            Ok(summary) => {
                if intent.seq != self.seq {
                    return Reconciled::Stale;
                }
                self.overwrite(summary);
                Reconciled::Confirmed
            }
            Err(e) => {
                tracing::warn!(video_id = %intent.video_id, error = %e, "Failed to save reaction");
                if self.rollback && intent.seq == self.seq {
                    self.counts = intent.before;
                    Reconciled::RolledBack
                } else {
                    Reconciled::Kept
                }
            }
        }
    }

    pub async fn load_with<S: ReactionSource>(&mut self, source: &S) -> Result<(), ApiError> {
        let seq = self.begin_load();
        let video_id = self.video_id.clone();
        let summary = source.get_reaction(video_id.clone()).await?;
        self.apply_loaded(&video_id, seq, summary);
        Ok(())
    }

    pub async fn react_with<S: ReactionSource>(
        &mut self,
        source: &S,
        kind: ReactionKind,
        session: &SessionState,
    ) -> Result<Reconciled, AuthRequired> {
        let intent = self.react(kind, session)?;
        let result = source
            .set_reaction(intent.video_id.clone(), intent.requested)
            .await;
        Ok(self.reconcile(intent, result))
    }
}
