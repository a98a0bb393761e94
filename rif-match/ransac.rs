use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rif_core::{Frame, Match};

use crate::affine::{AffineModel, AffineSolver};
use crate::error::{MatchError, MatchResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Points fitted exactly by each hypothesis
const SAMPLE_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RansacConfig {
    pub max_iterations: usize,
    /// Fewer correspondences than this yield no model
    pub min_matches: usize,
    pub min_inliers: usize,
    /// Squared reprojection error below which a correspondence is an inlier
    pub dist_thresh_sq: f32,
    /// Refit the winning hypothesis on its inliers by least squares
    pub refine: bool,
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            min_matches: 4,
            min_inliers: 4,
            dist_thresh_sq: 9.0,
            refine: true,
            seed: 0,
        }
    }
}

impl RansacConfig {
    pub fn validate(&self) -> MatchResult<()> {
        if self.max_iterations == 0 {
            return Err(MatchError::InvalidRansacConfig {
                reason: "max_iterations must be positive".to_string(),
            });
        }
        if self.min_matches < SAMPLE_SIZE {
            return Err(MatchError::InvalidRansacConfig {
                reason: format!("min_matches must be at least {}", SAMPLE_SIZE),
            });
        }
        if !(self.dist_thresh_sq > 0.0) {
            return Err(MatchError::InvalidRansacConfig {
                reason: format!("dist_thresh_sq must be positive, got {}", self.dist_thresh_sq),
            });
        }
        Ok(())
    }
}

/// Winning model and the indices of the correspondences it explains
#[derive(Debug, Clone, PartialEq)]
pub struct RansacOutcome {
    pub model: AffineModel,
    pub inliers: Vec<usize>,
}

/// Fixed-budget RANSAC over 3-point affine hypotheses
#[derive(Debug, Clone)]
pub struct Ransac<R = Xoshiro256PlusPlus> {
    config: RansacConfig,
    rng: R,
}

impl Ransac<Xoshiro256PlusPlus> {
    /// Deterministic estimator seeded from `config.seed`
    pub fn new(config: RansacConfig) -> Self {
        let rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
        Self { config, rng }
    }
}

impl Default for Ransac<Xoshiro256PlusPlus> {
    fn default() -> Self {
        Self::new(RansacConfig::default())
    }
}

impl<R: Rng> Ransac<R> {
    pub fn with_rng(config: RansacConfig, rng: R) -> Self {
        Self { config, rng }
    }

    pub fn config(&self) -> &RansacConfig {
        &self.config
    }

    /// Estimate the model mapping reference frames onto query frames.
    ///
    /// `inliers` index into `matches`.
    pub fn verify(
        &mut self,
        query_frames: &[Frame],
        reference_frames: &[Frame],
        matches: &[Match],
    ) -> Option<RansacOutcome> {
        let pairs: Vec<_> = matches
            .iter()
            .filter_map(|m| {
                let q = query_frames.get(m.query)?;
                let r = reference_frames.get(m.reference)?;
                Some(((r.x, r.y), (q.x, q.y)))
            })
            .collect();
        if pairs.len() != matches.len() {
            log::warn!(
                "Dropped {} matches with out of range indices",
                matches.len() - pairs.len()
            );
        }
        self.estimate(&pairs)
    }

    /// Estimate from `(source, destination)` point pairs
    pub fn estimate(&mut self, pairs: &[((f32, f32), (f32, f32))]) -> Option<RansacOutcome> {
        if pairs.len() < self.config.min_matches.max(SAMPLE_SIZE) {
            return None;
        }

        let mut best: Option<RansacOutcome> = None;
        let mut best_count = 0;

        for _ in 0..self.config.max_iterations {
            let sample = index::sample(&mut self.rng, pairs.len(), SAMPLE_SIZE);

            let mut solver = AffineSolver::new();
            for i in sample.iter() {
                let (src, dst) = pairs[i];
                solver.add_match(src, dst);
            }
            let Some(model) = solver.compute_transform() else {
                continue;
            };

            let inliers = self.inliers(&model, pairs);
            if inliers.len() > best_count && inliers.len() >= self.config.min_inliers {
                best_count = inliers.len();
                best = Some(RansacOutcome { model, inliers });
            }
        }

        let outcome = best?;
        log::debug!(
            "RANSAC kept {}/{} inliers after {} iterations",
            outcome.inliers.len(),
            pairs.len(),
            self.config.max_iterations
        );

        if self.config.refine {
            Some(self.refine(outcome, pairs))
        } else {
            Some(outcome)
        }
    }

    fn inliers(&self, model: &AffineModel, pairs: &[((f32, f32), (f32, f32))]) -> Vec<usize> {
        pairs
            .iter()
            .enumerate()
            .filter(|(_, (src, dst))| {
                let (x, y) = model.transform(src.0, src.1);
                let (ex, ey) = (x - dst.0, y - dst.1);
                ex * ex + ey * ey < self.config.dist_thresh_sq
            })
            .map(|(i, _)| i)
            .collect()
    }

    fn refine(&self, outcome: RansacOutcome, pairs: &[((f32, f32), (f32, f32))]) -> RansacOutcome {
        let mut solver = AffineSolver::new();
        for &i in &outcome.inliers {
            let (src, dst) = pairs[i];
            solver.add_match(src, dst);
        }
        match solver.compute_transform() {
            Some(model) => {
                let inliers = self.inliers(&model, pairs);
                if inliers.len() >= outcome.inliers.len() {
                    RansacOutcome { model, inliers }
                } else {
                    outcome
                }
            }
            None => outcome,
        }
    }
}
