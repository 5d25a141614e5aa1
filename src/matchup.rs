use serde::Serialize;
use tracing::{debug, warn};

use crate::aggregate::{AggregationMode, TeamKeyProfile};
use crate::config::{EngineConfig, PredictorConfig};
use crate::error::{Degradation, DegradationReason, EngineError, EngineResult};
use crate::game_keys::{Key, PerKey};
use crate::score_model::ScoreProjection;
use crate::turnover_regression::TurnoverOutlook;

const TOP_DRIVERS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyOutcome {
    TeamA,
    TeamB,
    Tie,
    /// One side had no value for the key; nobody is credited.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyComparison {
    pub key: Key,
    pub team_a: Option<f64>,
    pub team_b: Option<f64>,
    pub margin: Option<f64>,
    pub outcome: KeyOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WinProbability {
    pub team_a: f64,
    pub keys_won_a: usize,
    pub keys_won_b: usize,
    pub ties: usize,
    pub margin_signal: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyDriver {
    pub key: Key,
    pub outcome: KeyOutcome,
    pub margin: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpponentAdjustment {
    pub team: String,
    pub key: Key,
    pub adjusted: f64,
    pub unadjusted: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchupResult {
    pub team_a: String,
    pub team_b: String,
    pub mode: AggregationMode,
    pub win_probability_a: f64,
    pub win_probability_b: f64,
    pub comparisons: Vec<KeyComparison>,
    pub keys_won_a: usize,
    pub keys_won_b: usize,
    pub ties: usize,
    pub margin_signal: f64,
    pub drivers: Vec<KeyDriver>,
    pub adjustments: Vec<OpponentAdjustment>,
    pub projection: ScoreProjection,
    /// Score model and key model point at different winners.
    pub direction_conflict: bool,
    pub coverage: Vec<String>,
    pub degradations: Vec<Degradation>,
    pub turnover_outlook: Option<TurnoverOutlook>,
}

impl MatchupResult {
    pub fn favorite(&self) -> Option<&str> {
        if self.win_probability_a > 0.5 {
            Some(&self.team_a)
        } else if self.win_probability_a < 0.5 {
            Some(&self.team_b)
        } else {
            None
        }
    }
}

/// Higher wins on every key; margins within the key's epsilon are ties.
pub fn compare_keys(
    a: &TeamKeyProfile,
    b: &TeamKeyProfile,
    cfg: &PredictorConfig,
) -> Vec<KeyComparison> {
    Key::ALL
        .iter()
        .map(|&key| {
            let (va, vb) = (a.value(key), b.value(key));
            let (margin, outcome) = match (va, vb) {
                (Some(x), Some(y)) => {
                    let m = x - y;
                    let outcome = if m.abs() <= *cfg.tie_epsilon.get(key) {
                        KeyOutcome::Tie
                    } else if m > 0.0 {
                        KeyOutcome::TeamA
                    } else {
                        KeyOutcome::TeamB
                    };
                    (Some(m), outcome)
                }
                _ => (None, KeyOutcome::Unavailable),
            };
            KeyComparison {
                key,
                team_a: va,
                team_b: vb,
                margin,
                outcome,
            }
        })
        .collect()
}

// x / (1 + x): below 1 for any finite margin and still rising where tanh
// would already have rounded to 1.
fn squash(x: f64) -> f64 {
    x / (1.0 + x)
}

// Signed, squashed margin on a decided key, before normalisation.
fn key_contribution(c: &KeyComparison, cfg: &PredictorConfig) -> f64 {
    let Some(m) = c.margin else {
        return 0.0;
    };
    let strength = squash(m.abs() / cfg.margin_scale.get(c.key)) * cfg.importance.get(c.key);
    match c.outcome {
        KeyOutcome::TeamA => strength,
        KeyOutcome::TeamB => -strength,
        KeyOutcome::Tie | KeyOutcome::Unavailable => 0.0,
    }
}

/// Probability that team A wins, from key comparisons only.
///
/// With `d = keys won by A - keys won by B`, equal counts give exactly 0.5.
/// Otherwise `p = sigmoid(count_slope * (d + margin_share * s))` where `s` is
/// the importance-weighted `x / (1 + x)` squash of each decided margin
/// (`x = |margin| / margin_scale`), normalised into (-1, 1). Because `margin_share <= 0.5` a whole key always outweighs any
/// margin swing, so `p` rises with every key won and with every margin widened
/// on a won key.
pub fn win_probability(comparisons: &[KeyComparison], cfg: &PredictorConfig) -> WinProbability {
    let keys_won_a = comparisons
        .iter()
        .filter(|c| c.outcome == KeyOutcome::TeamA)
        .count();
    let keys_won_b = comparisons
        .iter()
        .filter(|c| c.outcome == KeyOutcome::TeamB)
        .count();
    let ties = comparisons
        .iter()
        .filter(|c| c.outcome == KeyOutcome::Tie)
        .count();

    let total_importance: f64 = Key::ALL.iter().map(|k| cfg.importance.get(*k)).sum();
    let margin_signal = comparisons
        .iter()
        .map(|c| key_contribution(c, cfg))
        .sum::<f64>()
        / total_importance;

    let count_diff = keys_won_a as f64 - keys_won_b as f64;
    let team_a = if keys_won_a == keys_won_b {
        0.5
    } else {
        sigmoid(cfg.count_slope * (count_diff + cfg.margin_share * margin_signal))
    };

    WinProbability {
        team_a,
        keys_won_a,
        keys_won_b,
        ties,
        margin_signal,
    }
}

pub fn predict_matchup(
    a: &TeamKeyProfile,
    b: &TeamKeyProfile,
    cfg: &EngineConfig,
) -> EngineResult<MatchupResult> {
    let comparisons = compare_keys(a, b, &cfg.predictor);

    let mut degradations: Vec<Degradation> = a
        .degradations
        .iter()
        .chain(b.degradations.iter())
        .cloned()
        .collect();
    for c in comparisons.iter().filter(|c| c.outcome == KeyOutcome::Unavailable) {
        let d = Degradation::new(
            format!("{} vs {}", a.team, b.team),
            Some(c.key),
            DegradationReason::KeyUnavailable,
        );
        if cfg.predictor.strict_keys {
            return Err(EngineError::DegradedInput(d));
        }
        warn!(key = c.key.label(), "key unavailable for matchup, counted for neither side");
        degradations.push(d);
    }

    let wp = win_probability(&comparisons, &cfg.predictor);

    let margins: PerKey<Option<f64>> = PerKey::from_fn(|key| {
        comparisons
            .iter()
            .find(|c| c.key == key)
            .and_then(|c| c.margin)
    });
    let projection = cfg.score_model.project(&margins);
    let direction_conflict = (wp.team_a > 0.5 && projection.margin < 0.0)
        || (wp.team_a < 0.5 && projection.margin > 0.0);
    if direction_conflict {
        debug!(p = wp.team_a, margin = projection.margin, "score projection disagrees with keys");
    }

    Ok(MatchupResult {
        team_a: a.team.clone(),
        team_b: b.team.clone(),
        mode: a.mode,
        win_probability_a: wp.team_a,
        win_probability_b: 1.0 - wp.team_a,
        drivers: top_drivers(&comparisons, &cfg.predictor),
        adjustments: opponent_adjustments(a, b),
        comparisons,
        keys_won_a: wp.keys_won_a,
        keys_won_b: wp.keys_won_b,
        ties: wp.ties,
        margin_signal: wp.margin_signal,
        projection,
        direction_conflict,
        coverage: vec![a.coverage_note(), b.coverage_note()],
        degradations,
        turnover_outlook: None,
    })
}

fn top_drivers(comparisons: &[KeyComparison], cfg: &PredictorConfig) -> Vec<KeyDriver> {
    let mut drivers: Vec<KeyDriver> = comparisons
        .iter()
        .filter(|c| matches!(c.outcome, KeyOutcome::TeamA | KeyOutcome::TeamB))
        .filter_map(|c| {
            Some(KeyDriver {
                key: c.key,
                outcome: c.outcome,
                margin: c.margin?,
                contribution: key_contribution(c, cfg),
            })
        })
        .collect();
    drivers.sort_by(|x, y| {
        y.contribution
            .abs()
            .total_cmp(&x.contribution.abs())
            .then(x.key.cmp(&y.key))
    });
    drivers.truncate(TOP_DRIVERS);
    drivers
}

fn opponent_adjustments(a: &TeamKeyProfile, b: &TeamKeyProfile) -> Vec<OpponentAdjustment> {
    let mut out = Vec::new();
    for profile in [a, b] {
        if profile.mode != AggregationMode::OppWeighted {
            continue;
        }
        for key in Key::ALL {
            let (Some(adjusted), Some(unadjusted)) = (profile.value(key), *profile.unweighted.get(key))
            else {
                continue;
            };
            out.push(OpponentAdjustment {
                team: profile.team.clone(),
                key,
                adjusted,
                unadjusted,
                delta: adjusted - unadjusted,
            });
        }
    }
    out
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
