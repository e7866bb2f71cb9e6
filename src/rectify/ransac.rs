//! Generic consensus sampling.
//!
//! Implement [`Estimator`] for a model and call [`ransac`]. Small problems are
//! solved by enumerating every minimal subset, so the result is deterministic;
//! larger ones draw seeded random samples with an adaptive iteration bound.

use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

const MAX_ITERS: usize = 2000;
const INLIER_THRESHOLD_PX: f64 = 8.0;
const MIN_INLIERS: usize = 4;
const CONFIDENCE: f64 = 0.995;
const SEED: u64 = 0x0AD5_EED;
const EXHAUSTIVE_LIMIT: usize = 5000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    pub max_iters: usize,
    /// Residual at or below which a datum counts as an inlier (canonical pixels).
    pub inlier_threshold_px: f64,
    pub min_inliers: usize,
    pub confidence: f64,
    pub seed: u64,
    /// Enumerate all minimal subsets when there are at most this many.
    pub exhaustive_limit: usize,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iters: MAX_ITERS,
            inlier_threshold_px: INLIER_THRESHOLD_PX,
            min_inliers: MIN_INLIERS,
            confidence: CONFIDENCE,
            seed: SEED,
            exhaustive_limit: EXHAUSTIVE_LIMIT,
        }
    }
}

pub trait Estimator {
    type Datum;
    type Model;

    const MIN_SAMPLES: usize;

    /// Fits a model to the sampled indices; `None` if fitting fails.
    fn fit(data: &[Self::Datum], sample: &[usize]) -> Option<Self::Model>;

    /// Non-negative residual in the units of `inlier_threshold_px`.
    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64;

    fn is_degenerate(_data: &[Self::Datum], _sample: &[usize]) -> bool {
        false
    }

    /// Optional least-squares refit on the consensus set.
    fn refit(_data: &[Self::Datum], _inliers: &[usize]) -> Option<Self::Model> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct RansacOutcome<M> {
    pub model: M,
    pub inliers: Vec<usize>,
    pub inlier_rms: f64,
    pub iterations: usize,
}

struct Scored<M> {
    model: M,
    inliers: Vec<usize>,
    rms: f64,
}

fn score<E: Estimator>(model: E::Model, data: &[E::Datum], threshold: f64) -> Scored<E::Model> {
    let mut inliers = Vec::new();
    let mut sum_sq = 0.0;
    for (i, datum) in data.iter().enumerate() {
        let r = E::residual(&model, datum);
        if r <= threshold {
            inliers.push(i);
            sum_sq += r * r;
        }
    }
    let rms = if inliers.is_empty() {
        f64::INFINITY
    } else {
        (sum_sq / inliers.len() as f64).sqrt()
    };
    Scored {
        model,
        inliers,
        rms,
    }
}

fn is_better<M>(candidate: &Scored<M>, best: Option<&Scored<M>>) -> bool {
    match best {
        None => true,
        Some(b) => {
            candidate.inliers.len() > b.inliers.len()
                || (candidate.inliers.len() == b.inliers.len() && candidate.rms < b.rms)
        }
    }
}

fn binomial(n: usize, k: usize) -> u128 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc * (n - i) as u128 / (i + 1) as u128;
    }
    acc
}

/// Advances `idx` to the next k-combination of `0..n` in lexicographic order.
fn next_combination(idx: &mut [usize], n: usize) -> bool {
    let k = idx.len();
    let mut i = k;
    while i > 0 {
        i -= 1;
        if idx[i] < n - k + i {
            idx[i] += 1;
            for j in i + 1..k {
                idx[j] = idx[j - 1] + 1;
            }
            return true;
        }
    }
    false
}

fn adaptive_iterations(config: &RansacConfig, inlier_ratio: f64, k: usize, done: usize) -> usize {
    if config.confidence <= 0.0 || inlier_ratio <= 0.0 {
        return config.max_iters;
    }
    let denom = (1.0 - inlier_ratio.powi(k as i32)).max(1e-12).ln();
    if denom >= 0.0 {
        return config.max_iters;
    }
    let needed = ((1.0 - config.confidence).ln() / denom).ceil() as usize;
    needed.clamp(done, config.max_iters)
}

/// Runs consensus sampling; `None` when no model reaches `min_inliers`.
pub fn ransac<E: Estimator>(
    data: &[E::Datum],
    config: &RansacConfig,
) -> Option<RansacOutcome<E::Model>> {
    let n = data.len();
    let k = E::MIN_SAMPLES;
    if n < k {
        return None;
    }

    let mut best: Option<Scored<E::Model>> = None;
    let mut iterations = 0usize;

    let consider = |sample: &[usize], best: &mut Option<Scored<E::Model>>| {
        if E::is_degenerate(data, sample) {
            return;
        }
        let Some(model) = E::fit(data, sample) else {
            return;
        };
        let scored = score::<E>(model, data, config.inlier_threshold_px);
        if is_better(&scored, best.as_ref()) {
            *best = Some(scored);
        }
    };

    if binomial(n, k) <= config.exhaustive_limit as u128 {
        let mut sample: Vec<usize> = (0..k).collect();
        loop {
            iterations += 1;
            consider(&sample, &mut best);
            if !next_combination(&mut sample, n) {
                break;
            }
        }
    } else {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut budget = config.max_iters;
        while iterations < budget {
            iterations += 1;
            let sample = rand::seq::index::sample(&mut rng, n, k).into_vec();
            consider(&sample, &mut best);
            if let Some(b) = best.as_ref() {
                let ratio = b.inliers.len() as f64 / n as f64;
                budget = adaptive_iterations(config, ratio, k, iterations);
            }
        }
    }

    let mut best = best?;
    if best.inliers.len() < config.min_inliers.max(k) {
        tracing::debug!(
            inliers = best.inliers.len(),
            required = config.min_inliers.max(k),
            "consensus too small"
        );
        return None;
    }

    if let Some(refined) = E::refit(data, &best.inliers) {
        let rescored = score::<E>(refined, data, config.inlier_threshold_px);
        if rescored.inliers.len() >= best.inliers.len() {
            best = rescored;
        }
    }

    Some(RansacOutcome {
        model: best.model,
        inliers: best.inliers,
        inlier_rms: best.rms,
        iterations,
    })
}
