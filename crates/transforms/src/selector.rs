//! Seeded random decisions shared by the transforms.

use cleft_utils::errors::TransformError;
use cleft_utils::Ratio;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Draws the per-candidate decisions of a transform from a seeded generator.
///
/// Works over an owned generator or over `&mut StdRng` handed out by the pass pipeline.
#[derive(Debug)]
pub struct RandomSelector<R: Rng> {
    rng: R,
}

impl RandomSelector<StdRng> {
    pub fn from_seed(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomSelector<R> {
    pub const fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Draws a uniform real in `[0, 1)` and accepts when it does not exceed `ratio`.
    ///
    /// Every call consumes exactly one draw. The bounds are exact: `1.0` always accepts and
    /// `0.0` never does, whatever the draw.
    pub fn should_apply(&mut self, ratio: Ratio) -> bool {
        let draw = self.rng.random::<f64>();
        let ratio = ratio.get();
        ratio > 0.0 && draw <= ratio
    }

    /// Picks one element uniformly.
    pub fn pick_one<'a, T>(&mut self, candidates: &'a [T]) -> Result<&'a T, TransformError> {
        if candidates.is_empty() {
            return Err(TransformError::InvalidArgument(
                "cannot pick from an empty candidate list".into(),
            ));
        }
        let index = self.rng.random_range(0..candidates.len());
        Ok(&candidates[index])
    }
}
