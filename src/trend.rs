//! Online popularity (trend score) acquisition.
//!
//! Scores come from an external interest source in production; the cache
//! falls back to a seeded uniform draw per brand when no source is wired
//! in. The cache is scoped to a run and passed explicitly, so two runs
//! never share state and a run with a fixed seed is reproducible.

use crate::core::RawRecord;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tracing::debug;

/// Fallback score range, matching the plausible band of a 0-100 interest
/// index.
const FALLBACK_RANGE: (f64, f64) = (30.0, 80.0);

/// Supplies the latest popularity score for a brand.
pub trait TrendScoreProvider {
    fn latest_score(&mut self, brand: &str) -> f64;
}

/// Run-scoped score cache: each brand is resolved at most once per run.
#[derive(Debug)]
pub struct TrendScoreCache {
    scores: HashMap<String, f64>,
    rng: StdRng,
    low: f64,
    high: f64,
}

impl TrendScoreCache {
    pub fn new(seed: u64) -> Self {
        Self {
            scores: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
            low: FALLBACK_RANGE.0,
            high: FALLBACK_RANGE.1,
        }
    }

    /// Override the fallback range. `low` must be below `high`.
    pub fn with_range(mut self, low: f64, high: f64) -> Self {
        debug_assert!(low < high);
        self.low = low;
        self.high = high;
        self
    }

    /// Pre-seed a brand's score, e.g. from an external lookup.
    pub fn insert(&mut self, brand: impl Into<String>, score: f64) {
        self.scores.insert(brand.into(), score);
    }
}

impl TrendScoreProvider for TrendScoreCache {
    fn latest_score(&mut self, brand: &str) -> f64 {
        if let Some(&score) = self.scores.get(brand) {
            return score;
        }
        let score = self.rng.gen_range(self.low..self.high);
        debug!(brand, score, "using fallback trend score");
        self.scores.insert(brand.to_string(), score);
        score
    }
}

/// Overwrite the popularity of every record on the latest observed date
/// with the provider's current score for its brand. Earlier records keep
/// their historical values.
pub fn refresh_latest_scores(records: &mut [RawRecord], provider: &mut impl TrendScoreProvider) {
    let Some(latest) = records.iter().map(|r| r.date).max() else {
        return;
    };
    let mut refreshed = 0usize;
    for record in records.iter_mut().filter(|r| r.date == latest) {
        let brand = record.brand.clone();
        record.online_popularity = Some(provider.latest_score(&brand));
        refreshed += 1;
    }
    debug!(%latest, refreshed, "refreshed latest trend scores");
}
