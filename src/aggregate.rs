use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{AggregationConfig, OpponentWeighting};
use crate::defense_strength::LeagueDefenses;
use crate::error::{Degradation, DegradationReason, EngineError, EngineResult};
use crate::game_keys::{GameKeySet, Key, PerKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    Regular,
    OppWeighted,
}

impl AggregationMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "regular" | "reg" => Some(AggregationMode::Regular),
            "opp_weighted" | "weighted" => Some(AggregationMode::OppWeighted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameWeight {
    pub game_id: String,
    pub opponent: Option<String>,
    pub opponent_difficulty: f64,
    pub strength_weight: f64,
    pub dampener: f64,
    pub weight: f64,
    pub included: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub game_id: String,
    pub value: f64,
    pub weight: f64,
    pub share: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamKeyProfile {
    pub team: String,
    pub mode: AggregationMode,
    pub values: PerKey<Option<f64>>,
    /// Plain mean over the same games, for showing how much weighting moved each key.
    pub unweighted: PerKey<Option<f64>>,
    pub games_used: usize,
    pub games_total: usize,
    pub weights: Vec<GameWeight>,
    pub contributors: PerKey<Vec<Contribution>>,
    pub mean_opponent_difficulty: Option<f64>,
    pub degradations: Vec<Degradation>,
}

impl TeamKeyProfile {
    pub fn value(&self, key: Key) -> Option<f64> {
        *self.values.get(key)
    }

    pub fn coverage_note(&self) -> String {
        format!(
            "{}: based on {} of {} games",
            self.team, self.games_used, self.games_total
        )
    }

    pub fn weight_for(&self, game_id: &str) -> Option<f64> {
        self.weights
            .iter()
            .find(|w| w.game_id == game_id)
            .map(|w| w.weight)
    }
}

/// Weight from the opponent's composite alone. Non-decreasing in composite for
/// every form; strictly increasing for the exponential default.
pub fn opponent_weight(form: OpponentWeighting, composite: f64) -> f64 {
    match form {
        OpponentWeighting::Exponential { rate } => (rate * composite).exp(),
        OpponentWeighting::Linear { base, scale, floor } => (base + scale * composite).max(floor),
    }
}

/// `takeaways` is how often the opponent gave the ball away in that game.
pub fn meltdown_dampener(takeaways: u32, cfg: &AggregationConfig) -> f64 {
    if takeaways > cfg.meltdown_turnover_threshold {
        cfg.meltdown_factor
    } else {
        1.0
    }
}

pub fn aggregate_keys(
    team: &str,
    games: &[GameKeySet],
    mode: AggregationMode,
    defenses: &LeagueDefenses,
    cfg: &AggregationConfig,
) -> EngineResult<TeamKeyProfile> {
    let mut ordered: Vec<&GameKeySet> = games.iter().collect();
    ordered.sort_by(|a, b| a.game_id.cmp(&b.game_id));

    let mut degradations = Vec::new();
    let mut weights = Vec::with_capacity(ordered.len());
    for g in &ordered {
        let opponent_difficulty = g
            .opponent
            .as_deref()
            .map_or(0.0, |opp| defenses.composite(opp));
        let (strength_weight, dampener) = match mode {
            AggregationMode::Regular => (1.0, 1.0),
            AggregationMode::OppWeighted => (
                opponent_weight(cfg.weighting, opponent_difficulty),
                meltdown_dampener(g.takeaways, cfg),
            ),
        };
        if dampener < 1.0 {
            debug!(team, game_id = %g.game_id, takeaways = g.takeaways, "meltdown dampener applied");
        }
        if !g.usable {
            degradations.extend(g.degradations.iter().cloned());
        }
        weights.push(GameWeight {
            game_id: g.game_id.clone(),
            opponent: g.opponent.clone(),
            opponent_difficulty,
            strength_weight,
            dampener,
            weight: strength_weight * dampener,
            included: g.usable,
        });
    }

    let games_used = ordered.iter().filter(|g| g.usable).count();
    if games_used == 0 {
        warn!(team, games = ordered.len(), "no usable games to aggregate");
        return Err(EngineError::InsufficientData(format!(
            "{team}: no usable games ({} requested)",
            ordered.len()
        )));
    }

    let mut values = PerKey::default();
    let mut unweighted = PerKey::default();
    let mut contributors: PerKey<Vec<Contribution>> = PerKey::default();

    for key in Key::ALL {
        let mut sum_w = 0.0;
        let mut sum_wv = 0.0;
        let mut sum_v = 0.0;
        let mut rows = Vec::new();
        for (g, w) in ordered.iter().zip(weights.iter()) {
            if !g.usable {
                continue;
            }
            let Some(v) = g.value(key) else {
                degradations.extend(g.degradations.iter().filter(|d| d.key == Some(key)).cloned());
                continue;
            };
            sum_w += w.weight;
            sum_wv += w.weight * v;
            sum_v += v;
            rows.push(Contribution {
                game_id: g.game_id.clone(),
                value: v,
                weight: w.weight,
                share: 0.0,
            });
        }
        if rows.is_empty() || sum_w <= 0.0 {
            degradations.push(Degradation::new(team, Some(key), DegradationReason::NoContributors));
            continue;
        }
        for row in rows.iter_mut() {
            row.share = row.weight / sum_w;
        }
        *values.get_mut(key) = Some(sum_wv / sum_w);
        *unweighted.get_mut(key) = Some(sum_v / rows.len() as f64);
        *contributors.get_mut(key) = rows;
    }

    let used: Vec<&GameWeight> = weights.iter().filter(|w| w.included).collect();
    let mean_opponent_difficulty =
        Some(used.iter().map(|w| w.opponent_difficulty).sum::<f64>() / used.len() as f64);

    Ok(TeamKeyProfile {
        team: team.to_string(),
        mode,
        values,
        unweighted,
        games_used,
        games_total: ordered.len(),
        weights,
        contributors,
        mean_opponent_difficulty,
        degradations,
    })
}
