use crate::api::VideoRef;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Reorders a freshly fetched page before it is merged into the feed.
pub trait Shuffle: Send {
    fn permute(&mut self, items: Vec<VideoRef>) -> Vec<VideoRef>;
}

/// Uniform random permutation.
pub struct FisherYates {
    rng: StdRng,
}

impl FisherYates {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic ordering for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Shuffle for FisherYates {
    fn permute(&mut self, mut items: Vec<VideoRef>) -> Vec<VideoRef> {
        items.shuffle(&mut self.rng);
        items
    }
}

/// Keeps server order.
#[derive(Debug, Default, Clone, Copy)]
pub struct Identity;

impl Shuffle for Identity {
    fn permute(&mut self, items: Vec<VideoRef>) -> Vec<VideoRef> {
        items
    }
}
