//! Question sampling for quiz runs.
//!
//! Sampling is shuffle-then-truncate so a draw never repeats a question.
//! The random source is a seedable [`StdRng`] owned by the sampler, which
//! makes every sampling path reproducible in tests.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::model::{Difficulty, Question};

/// Shuffle `all` (Fisher–Yates) and keep the first `n` items.
///
/// Returns `min(n, all.len())` items, each input item at most once.
pub fn random_subset<T, R: Rng + ?Sized>(mut all: Vec<T>, n: usize, rng: &mut R) -> Vec<T> {
    all.shuffle(rng);
    all.truncate(n);
    all
}

/// Proportions of easy, medium, and hard questions in a mixed draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixRatio {
    #[serde(default = "default_easy")]
    pub easy: f64,
    #[serde(default = "default_medium")]
    pub medium: f64,
    #[serde(default = "default_hard")]
    pub hard: f64,
}

fn default_easy() -> f64 {
    0.4
}
fn default_medium() -> f64 {
    0.4
}
fn default_hard() -> f64 {
    0.2
}

impl Default for MixRatio {
    fn default() -> Self {
        Self {
            easy: default_easy(),
            medium: default_medium(),
            hard: default_hard(),
        }
    }
}

impl MixRatio {
    pub fn ratio(&self, difficulty: Difficulty) -> f64 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }

    /// Requested size of each difficulty bucket for a draw of `n`,
    /// `ceil(n * ratio)` per bucket. Ratios are clamped to `0.0..=1.0`, so
    /// no bucket asks for more than `n`.
    pub fn bucket_sizes(&self, n: usize) -> [(Difficulty, usize); 3] {
        Difficulty::ALL.map(|d| {
            // Ratios go through basis points so the ceiling is not thrown
            // off by float representation (10 * 0.4 must be 4, not 5).
            let bp = (self.ratio(d).clamp(0.0, 1.0) * 10_000.0).round() as u128;
            let want = (n as u128 * bp).div_ceil(10_000);
            (d, usize::try_from(want).unwrap_or(n))
        })
    }

    /// Check that every ratio lies in `0.0..=1.0` and at least one is
    /// positive.
    pub fn validate(&self) -> Result<(), String> {
        let ratios = [self.easy, self.medium, self.hard];
        if ratios.iter().any(|r| !(0.0..=1.0).contains(r)) {
            return Err("mix ratios must be between 0.0 and 1.0".into());
        }
        if ratios.iter().sum::<f64>() <= 0.0 {
            return Err("at least one mix ratio must be positive".into());
        }
        Ok(())
    }
}

/// Draw a difficulty-proportioned set of up to `n` questions from `all`.
///
/// Each difficulty bucket is sampled independently, the buckets are
/// concatenated, reshuffled, and truncated to `n`. A bucket smaller than
/// its share yields fewer questions; other buckets do not make up the
/// difference, so the result can be shorter than `n`.
pub fn mixed_composition<R: Rng + ?Sized>(
    all: Vec<Question>,
    n: usize,
    mix: &MixRatio,
    rng: &mut R,
) -> Vec<Question> {
    let mut buckets: [Vec<Question>; 3] = Default::default();
    for question in all {
        let slot = match question.difficulty {
            Difficulty::Easy => 0,
            Difficulty::Medium => 1,
            Difficulty::Hard => 2,
        };
        buckets[slot].push(question);
    }

    let total: usize = buckets.iter().map(Vec::len).sum();
    let mut drawn = Vec::with_capacity(n.min(total));
    for ((difficulty, want), bucket) in mix.bucket_sizes(n).into_iter().zip(buckets) {
        let have = bucket.len();
        if have < want {
            tracing::debug!("{difficulty} bucket short: wanted {want}, have {have}");
        }
        drawn.extend(random_subset(bucket, want.min(have), rng));
    }

    random_subset(drawn, n, rng)
}

/// Sampler owning the random source used for every draw.
pub struct QuestionSampler {
    rng: Mutex<StdRng>,
    mix: MixRatio,
}

impl QuestionSampler {
    /// Create a sampler; `seed` makes every draw reproducible, `None` seeds
    /// from OS entropy.
    pub fn new(mix: MixRatio, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
            mix,
        }
    }

    /// Default mix with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self::new(MixRatio::default(), Some(seed))
    }

    pub fn mix(&self) -> &MixRatio {
        &self.mix
    }

    pub fn random_subset<T>(&self, all: Vec<T>, n: usize) -> Vec<T> {
        self.with_rng(|rng| random_subset(all, n, rng))
    }

    pub fn mixed_composition(&self, all: Vec<Question>, n: usize) -> Vec<Question> {
        let mix = self.mix;
        self.with_rng(|rng| mixed_composition(all, n, &mix, rng))
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        // A panic while holding the lock cannot leave the RNG in a state
        // that matters, so recover from poisoning.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut *rng)
    }
}

impl Default for QuestionSampler {
    fn default() -> Self {
        Self::new(MixRatio::default(), None)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::model::fixtures::corpus;

    fn ids(questions: &[Question]) -> Vec<String> {
        questions.iter().map(|q| q.id.clone()).collect()
    }

    #[test]
    fn random_subset_is_permutation_then_truncate() {
        let all = corpus(5, 5, 5);
        let input: HashSet<_> = ids(&all).into_iter().collect();
        let mut rng = StdRng::seed_from_u64(7);

        for n in [0, 1, 7, 15, 40] {
            let out = random_subset(all.clone(), n, &mut rng);
            assert_eq!(out.len(), n.min(all.len()));
            let unique: HashSet<_> = ids(&out).into_iter().collect();
            assert_eq!(unique.len(), out.len(), "repeat in draw of {n}");
            assert!(unique.is_subset(&input));
        }

        let full = random_subset(all.clone(), all.len(), &mut rng);
        let mut sorted_in = ids(&all);
        let mut sorted_out = ids(&full);
        sorted_in.sort();
        sorted_out.sort();
        assert_eq!(sorted_in, sorted_out);
    }

    #[test]
    fn same_seed_same_draw() {
        let a = QuestionSampler::seeded(42).random_subset(corpus(4, 4, 4), 6);
        let b = QuestionSampler::seeded(42).random_subset(corpus(4, 4, 4), 6);
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn bucket_sizes_use_ceiling() {
        let mix = MixRatio::default();
        assert_eq!(
            mix.bucket_sizes(10),
            [
                (Difficulty::Easy, 4),
                (Difficulty::Medium, 4),
                (Difficulty::Hard, 2)
            ]
        );
        // 7 * 0.4 = 2.8 -> 3, 7 * 0.2 = 1.4 -> 2
        assert_eq!(
            mix.bucket_sizes(7),
            [
                (Difficulty::Easy, 3),
                (Difficulty::Medium, 3),
                (Difficulty::Hard, 2)
            ]
        );
        assert_eq!(mix.bucket_sizes(0).map(|(_, n)| n), [0, 0, 0]);
    }

    #[test]
    fn mixed_composition_of_ten() {
        let sampler = QuestionSampler::seeded(1);
        let out = sampler.mixed_composition(corpus(4, 4, 2), 10);
        assert_eq!(out.len(), 10);
        let unique: HashSet<_> = ids(&out).into_iter().collect();
        assert_eq!(unique.len(), 10);
    }

    #[test]
    fn mixed_composition_respects_proportions() {
        let sampler = QuestionSampler::seeded(3);
        let out = sampler.mixed_composition(corpus(20, 20, 20), 10);
        let count = |d| out.iter().filter(|q| q.difficulty == d).count();
        assert_eq!(count(Difficulty::Easy), 4);
        assert_eq!(count(Difficulty::Medium), 4);
        assert_eq!(count(Difficulty::Hard), 2);
    }

    #[test]
    fn mixed_composition_does_not_backfill_short_bucket() {
        let sampler = QuestionSampler::seeded(9);
        // Only one hard question where two are wanted.
        let out = sampler.mixed_composition(corpus(10, 10, 1), 10);
        assert_eq!(out.len(), 9);
        assert_eq!(
            out.iter()
                .filter(|q| q.difficulty == Difficulty::Hard)
                .count(),
            1
        );
    }

    #[test]
    fn mixed_composition_truncates_ceiling_overshoot() {
        // Buckets of 3 + 3 + 2 = 8 are drawn for n = 7.
        let sampler = QuestionSampler::seeded(5);
        let out = sampler.mixed_composition(corpus(10, 10, 10), 7);
        assert_eq!(out.len(), 7);
    }

    #[test]
    fn mix_validation() {
        assert!(MixRatio::default().validate().is_ok());
        let negative = MixRatio {
            easy: -0.1,
            ..Default::default()
        };
        assert!(negative.validate().is_err());
        let zero = MixRatio {
            easy: 0.0,
            medium: 0.0,
            hard: 0.0,
        };
        assert!(zero.validate().is_err());
        let huge = MixRatio {
            easy: 1e300,
            ..Default::default()
        };
        assert!(huge.validate().is_err());
        let nan = MixRatio {
            hard: f64::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn huge_count_returns_whole_short_corpus() {
        let sampler = QuestionSampler::seeded(2);
        for n in [usize::MAX, usize::MAX / 20_000] {
            let out = sampler.mixed_composition(corpus(4, 4, 2), n);
            assert_eq!(out.len(), 10, "draw of {n}");
            let unique: HashSet<_> = ids(&out).into_iter().collect();
            assert_eq!(unique.len(), 10);
        }
    }

    #[test]
    fn bucket_sizes_never_exceed_count() {
        let greedy = MixRatio {
            easy: 1e300,
            medium: 0.4,
            hard: 0.2,
        };
        let sizes = greedy.bucket_sizes(usize::MAX).map(|(_, n)| n);
        assert_eq!(sizes[0], usize::MAX);
        assert_eq!(greedy.bucket_sizes(10).map(|(_, n)| n), [10, 4, 2]);
    }
}
