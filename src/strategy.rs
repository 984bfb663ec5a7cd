use std::cmp::Reverse;

use ordered_float::NotNan;
use serde::Deserialize;

use crate::catalog::Candidate;
use crate::config::PaddingMode;
use crate::location::RequestContext;
use crate::num::Weight;
use crate::telemetry::{scoped, Metric, Telemetry};

/// Rank points awarded to the best performing candidate by [`Strategy::MultiFactor`].
const MAX_RANK_POINTS: f64 = 1000.0;

/// Source of uniform randomness for the probabilistic strategies. Every [`rand::Rng`] is one;
/// tests substitute fixed sequences to check selection math exactly.
pub trait RandomSource {
    /// A uniform draw from `[0, upper)`.
    fn uniform(&mut self, upper: f64) -> f64;
    /// A uniform index into a non-empty slice of length `len`.
    fn index(&mut self, len: usize) -> usize;
}

impl<R: rand::Rng> RandomSource for R {
    fn uniform(&mut self, upper: f64) -> f64 {
        self.gen::<f64>() * upper
    }

    fn index(&mut self, len: usize) -> usize {
        self.gen_range(0..len)
    }
}

/// How one candidate is chosen among the admissible ones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Strategy {
    /// Uniform draw.
    #[default]
    Random,
    /// Draw proportional to each candidate's configured weight.
    WeightedRandom,
    /// Best candidate by a single RUM metric: lowest performance or highest uptime.
    Extremum { metric: Metric },
    /// Relative performance rank, scaled by the scoring profile and the candidate's market
    /// multiplier for the request's continent.
    MultiFactor,
}

/// Strategy inputs fixed at configuration load.
#[derive(Clone, Copy, Debug)]
pub struct Scoring {
    pub padding_mode: PaddingMode,
    pub profile_weight: Weight,
}

impl Default for Scoring {
    fn default() -> Self {
        Self {
            padding_mode: PaddingMode::Absolute,
            profile_weight: Weight::ONE,
        }
    }
}

impl Strategy {
    /// Pick one of `candidates`. A single candidate is always picked, whatever the strategy,
    /// and `None` means the strategy could not choose (no candidates, no usable weights or
    /// telemetry).
    pub fn select<'c, T, R>(
        &self,
        candidates: &[&'c Candidate],
        context: &RequestContext,
        scoring: &Scoring,
        telemetry: &T,
        rng: &mut R,
    ) -> Option<&'c Candidate>
    where
        T: Telemetry + ?Sized,
        R: RandomSource + ?Sized,
    {
        if let [only] = candidates {
            return Some(*only);
        }
        let selection = match self {
            Strategy::Random => random_choice(candidates, rng),
            Strategy::WeightedRandom => weighted_random_choice(candidates, rng),
            Strategy::Extremum { metric } => {
                extremum_by_metric(candidates, *metric, context, scoring.padding_mode, telemetry)
            }
            Strategy::MultiFactor => {
                multi_factor_weighted_score(candidates, context, scoring, telemetry)
            }
        };
        match selection {
            Some(candidate) => {
                tracing::debug!(strategy = ?self, candidate = %candidate.id, "selected")
            }
            None => tracing::warn!(
                strategy = ?self,
                candidates = candidates.len(),
                "strategy could not choose a candidate"
            ),
        }
        selection
    }
}

pub fn random_choice<'c, R>(candidates: &[&'c Candidate], rng: &mut R) -> Option<&'c Candidate>
where
    R: RandomSource + ?Sized,
{
    if candidates.is_empty() {
        return None;
    }
    candidates.get(rng.index(candidates.len())).copied()
}

/// Walk candidates in order, accumulating weight, and pick the first whose cumulative weight
/// exceeds a uniform draw from `[0, total)`. Zero-weight candidates are never picked.
pub fn weighted_random_choice<'c, R>(
    candidates: &[&'c Candidate],
    rng: &mut R,
) -> Option<&'c Candidate>
where
    R: RandomSource + ?Sized,
{
    let total: Weight = candidates.iter().map(|c| c.weight).sum();
    if total.is_zero() {
        return None;
    }
    let draw = rng.uniform(total.as_f64());
    let mut cumulative = 0.0;
    for candidate in candidates.iter().filter(|c| !c.weight.is_zero()) {
        cumulative += candidate.weight.as_f64();
        if cumulative > draw {
            return Some(*candidate);
        }
    }
    // Only reachable through floating point rounding of the draw.
    candidates.iter().rev().find(|c| !c.weight.is_zero()).copied()
}

/// The candidate's scoped performance with its padding applied.
pub fn padded_performance<T>(
    candidate: &Candidate,
    context: &RequestContext,
    padding_mode: PaddingMode,
    telemetry: &T,
) -> Option<f64>
where
    T: Telemetry + ?Sized,
{
    let performance = scoped(telemetry, Metric::Performance, &candidate.id, context)?;
    Some(padding_mode.apply(performance, candidate.padding))
}

/// Lowest padded performance, or highest uptime. Candidates without the metric are skipped and
/// ties go to the earliest candidate.
pub fn extremum_by_metric<'c, T>(
    candidates: &[&'c Candidate],
    metric: Metric,
    context: &RequestContext,
    padding_mode: PaddingMode,
    telemetry: &T,
) -> Option<&'c Candidate>
where
    T: Telemetry + ?Sized,
{
    let measured = candidates.iter().filter_map(|candidate| {
        let value = match metric {
            Metric::Performance => padded_performance(candidate, context, padding_mode, telemetry),
            Metric::Uptime => scoped(telemetry, Metric::Uptime, &candidate.id, context),
        }?;
        Some((*candidate, NotNan::new(value).ok()?))
    });
    let best = match metric {
        Metric::Performance => measured.min_by_key(|(_, value)| *value),
        Metric::Uptime => measured.min_by_key(|(_, value)| Reverse(*value)),
    };
    best.map(|(candidate, _)| candidate)
}

/// Rank score per candidate, `None` where performance telemetry is missing.
///
/// The best (lowest) performance earns [`MAX_RANK_POINTS`] and the others earn points in
/// proportion to how close they come to it, floored to whole points. Non-positive performance
/// earns nothing, so a best of zero leaves every candidate at zero. Points are then scaled by
/// the profile weight and by the candidate's market multiplier for the request's continent,
/// when it defines one.
pub fn multi_factor_scores<T>(
    candidates: &[&Candidate],
    context: &RequestContext,
    scoring: &Scoring,
    telemetry: &T,
) -> Vec<Option<f64>>
where
    T: Telemetry + ?Sized,
{
    let performance: Vec<Option<f64>> = candidates
        .iter()
        .map(|c| padded_performance(c, context, scoring.padding_mode, telemetry))
        .collect();
    let best = performance.iter().flatten().copied().min_by(f64::total_cmp);

    candidates
        .iter()
        .zip(performance)
        .map(|(candidate, performance)| {
            let performance = performance?;
            let points = match best {
                Some(best) if performance > 0.0 => {
                    (best / performance * MAX_RANK_POINTS).floor()
                        * scoring.profile_weight.as_f64()
                }
                _ => 0.0,
            };
            let multiplier = candidate
                .market_multiplier(context.continent)
                .unwrap_or(Weight::ONE);
            Some(points * multiplier.as_f64())
        })
        .collect()
}

/// Highest [`multi_factor_scores`] entry, ties going to the earliest candidate.
pub fn multi_factor_weighted_score<'c, T>(
    candidates: &[&'c Candidate],
    context: &RequestContext,
    scoring: &Scoring,
    telemetry: &T,
) -> Option<&'c Candidate>
where
    T: Telemetry + ?Sized,
{
    let scores = multi_factor_scores(candidates, context, scoring, telemetry);
    candidates
        .iter()
        .zip(scores)
        .filter_map(|(candidate, score)| Some((*candidate, NotNan::new(score?).ok()?)))
        .min_by_key(|(_, score)| Reverse(*score))
        .map(|(candidate, _)| candidate)
}
