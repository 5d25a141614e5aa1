use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::config::{EngineConfig, QbConfig};
use crate::defense_strength::{LeagueDefenses, StrengthMethod, success_of};
use crate::error::{Degradation, DegradationReason, EngineError, EngineResult};
use crate::play::{Play, PlayType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QbComponent {
    DriveSustainability,
    HighLeverage,
    OffScript,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentScore {
    pub component: QbComponent,
    pub raw: Option<f64>,
    pub adjusted: Option<f64>,
    pub plays: usize,
    pub mean_opponent_difficulty: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TurnoverAttribution {
    pub interceptions_qb_fault: u32,
    pub interceptions_other: u32,
    pub fumbles_qb_fault: u32,
    pub fumbles_other: u32,
    pub weighted: f64,
}

/// One game's share of the season tallies, for auditing the pooled scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QbGameLine {
    pub game_id: String,
    pub opponent: String,
    pub opponent_difficulty: f64,
    pub plays: usize,
    pub drive_plays: usize,
    pub drives_sustained: usize,
    pub leverage_plays: usize,
    pub leverage_successes: usize,
    pub off_script_plays: usize,
    pub off_script_value: f64,
    pub turnovers: TurnoverAttribution,
}

impl QbGameLine {
    fn new(game_id: &str, opponent: &str, opponent_difficulty: f64) -> Self {
        Self {
            game_id: game_id.to_string(),
            opponent: opponent.to_string(),
            opponent_difficulty,
            plays: 0,
            drive_plays: 0,
            drives_sustained: 0,
            leverage_plays: 0,
            leverage_successes: 0,
            off_script_plays: 0,
            off_script_value: 0.0,
            turnovers: TurnoverAttribution::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QbProductionResult {
    pub qb: String,
    pub team: String,
    pub value_metric: StrengthMethod,
    pub drive_sustainability: ComponentScore,
    pub high_leverage: ComponentScore,
    pub off_script: ComponentScore,
    pub combined: f64,
    pub plays: usize,
    pub mean_opponent_difficulty: f64,
    pub turnovers: TurnoverAttribution,
    /// Per-game breakdown in game-id order.
    pub games: Vec<QbGameLine>,
    pub degradations: Vec<Degradation>,
}

const NAME_SUFFIXES: [&str; 5] = ["JR", "SR", "II", "III", "IV"];

fn normalize_name(raw: &str) -> String {
    raw.trim().to_ascii_uppercase().replace('.', " ")
}

fn name_tokens(raw: &str) -> Vec<String> {
    normalize_name(raw)
        .split_whitespace()
        .filter(|tok| !NAME_SUFFIXES.contains(tok))
        .map(str::to_string)
        .collect()
}

/// Same surname, plus the same first initial when both names carry a first
/// name. Feeds abbreviate to "P.Mahomes".
pub fn qb_name_matches(candidate: &str, qb: &str) -> bool {
    let cand = name_tokens(candidate);
    let target = name_tokens(qb);
    let (Some(cand_last), Some(target_last)) = (cand.last(), target.last()) else {
        return false;
    };
    if cand_last != target_last {
        return false;
    }
    if cand.len() < 2 || target.len() < 2 {
        return true;
    }
    cand[0].chars().next() == target[0].chars().next()
}

pub fn is_qb_play(p: &Play, qb: &str) -> bool {
    let named = |name: &Option<String>| name.as_deref().is_some_and(|n| qb_name_matches(n, qb));
    named(&p.passer) || named(&p.rusher)
}

pub fn score_qb(
    qb: &str,
    team: &str,
    plays: &[Play],
    defenses: &LeagueDefenses,
    cfg: &EngineConfig,
) -> EngineResult<QbProductionResult> {
    let mut qb_plays: Vec<&Play> = plays
        .iter()
        .filter(|p| p.offense == team && p.is_snap() && is_qb_play(p, qb))
        .collect();
    if qb_plays.is_empty() {
        return Err(EngineError::InsufficientData(format!("{qb} ({team}): no plays")));
    }
    qb_plays.sort_by(|a, b| a.game_id.cmp(&b.game_id).then(a.play_id.cmp(&b.play_id)));

    let qcfg = &cfg.qb;
    let keys = &cfg.keys;
    let scope = format!("{qb} ({team})");
    let mut degradations = Vec::new();

    let mut drive = Tally::default();
    let mut leverage = Tally::default();
    let mut off_script = Tally::default();
    let mut leverage_missing = 0usize;
    let mut off_script_missing = 0usize;
    let mut lines: BTreeMap<&str, QbGameLine> = BTreeMap::new();

    for p in &qb_plays {
        let difficulty = defenses.difficulty(&p.defense);
        let line = lines
            .entry(p.game_id.as_str())
            .or_insert_with(|| QbGameLine::new(&p.game_id, &p.defense, difficulty));
        line.plays += 1;

        let sustained = p.down_converted() || (p.yards_gained >= 0 && !p.turnover());
        drive.push(if sustained { 1.0 } else { 0.0 }, difficulty);
        line.drive_plays += 1;
        if sustained {
            line.drives_sustained += 1;
        }

        if p.down == Some(keys.third_down_number) || p.in_red_zone(keys.red_zone_yardline) {
            match success_of(p) {
                Some(s) => {
                    leverage.push(if s { 1.0 } else { 0.0 }, difficulty);
                    line.leverage_plays += 1;
                    if s {
                        line.leverage_successes += 1;
                    }
                }
                None => leverage_missing += 1,
            }
        }

        if p.scramble {
            match defenses.method.play_value(p) {
                Some(v) => {
                    off_script.push(v, difficulty);
                    line.off_script_plays += 1;
                    line.off_script_value += v;
                }
                None => off_script_missing += 1,
            }
        }
    }
    let games: Vec<QbGameLine> = lines
        .into_values()
        .map(|mut line| {
            let in_game: Vec<&Play> = qb_plays
                .iter()
                .copied()
                .filter(|p| p.game_id == line.game_id)
                .collect();
            line.turnovers = attribute_turnovers(&in_game, qb, qcfg);
            line
        })
        .collect();
    if leverage_missing + off_script_missing > 0 {
        debug!(qb, leverage_missing, off_script_missing, "plays without a usable value");
        degradations.push(Degradation::new(scope.clone(), None, DegradationReason::MissingValueMetric));
    }

    let drive_sustainability = drive.score(
        QbComponent::DriveSustainability,
        qcfg.sensitivity.drive_sustainability,
    );
    let high_leverage = leverage.score(QbComponent::HighLeverage, qcfg.sensitivity.high_leverage);
    let off_script = off_script.score(QbComponent::OffScript, qcfg.sensitivity.off_script);

    let combined = combine(qcfg, &drive_sustainability, &high_leverage, &off_script);
    let mean_opponent_difficulty =
        qb_plays.iter().map(|p| defenses.difficulty(&p.defense)).sum::<f64>() / qb_plays.len() as f64;

    Ok(QbProductionResult {
        qb: qb.to_string(),
        team: team.to_string(),
        value_metric: defenses.method,
        drive_sustainability,
        high_leverage,
        off_script,
        combined,
        plays: qb_plays.len(),
        mean_opponent_difficulty,
        turnovers: attribute_turnovers(&qb_plays, qb, qcfg),
        games,
        degradations,
    })
}

/// Declared weights renormalised over the components that have a value.
fn combine(cfg: &QbConfig, drive: &ComponentScore, leverage: &ComponentScore, off_script: &ComponentScore) -> f64 {
    let parts = [
        (cfg.weights.drive_sustainability, drive.adjusted),
        (cfg.weights.high_leverage, leverage.adjusted),
        (cfg.weights.off_script, off_script.adjusted),
    ];
    let (sum_w, sum_wv) = parts
        .iter()
        .filter_map(|(w, v)| v.map(|v| (*w, v)))
        .fold((0.0, 0.0), |(sw, swv), (w, v)| (sw + w, swv + w * v));
    if sum_w > 0.0 { sum_wv / sum_w } else { 0.0 }
}

pub fn attribute_turnovers(plays: &[&Play], qb: &str, cfg: &QbConfig) -> TurnoverAttribution {
    let mut out = TurnoverAttribution::default();
    for p in plays {
        if p.interception {
            // Missing air yards count against the receiver side.
            if p.air_yards.is_some_and(|ay| ay >= cfg.deep_air_yards) {
                out.interceptions_qb_fault += 1;
            } else {
                out.interceptions_other += 1;
            }
        }
        if p.fumble_lost {
            let qb_carry = p.play_type == PlayType::Rush
                && p.rusher.as_deref().is_some_and(|r| qb_name_matches(r, qb));
            if p.play_type == PlayType::Sack || qb_carry {
                out.fumbles_qb_fault += 1;
            } else {
                out.fumbles_other += 1;
            }
        }
    }
    out.weighted = f64::from(out.interceptions_qb_fault) * cfg.int_qb_fault_weight
        + f64::from(out.interceptions_other) * cfg.int_other_weight
        + f64::from(out.fumbles_qb_fault) * cfg.fumble_qb_fault_weight
        + f64::from(out.fumbles_other) * cfg.fumble_other_weight;
    out
}

#[derive(Default)]
struct Tally {
    sum: f64,
    difficulty_sum: f64,
    n: usize,
}

impl Tally {
    fn push(&mut self, value: f64, difficulty: f64) {
        self.sum += value;
        self.difficulty_sum += difficulty;
        self.n += 1;
    }

    // Adjusted = raw + sensitivity * mean difficulty faced on these plays.
    fn score(&self, component: QbComponent, sensitivity: f64) -> ComponentScore {
        if self.n == 0 {
            return ComponentScore {
                component,
                raw: None,
                adjusted: None,
                plays: 0,
                mean_opponent_difficulty: 0.0,
            };
        }
        let raw = self.sum / self.n as f64;
        let mean_difficulty = self.difficulty_sum / self.n as f64;
        ComponentScore {
            component,
            raw: Some(raw),
            adjusted: Some(raw + sensitivity * mean_difficulty),
            plays: self.n,
            mean_opponent_difficulty: mean_difficulty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_matching_handles_feed_abbreviations() {
        assert!(qb_name_matches("P.Mahomes", "Patrick Mahomes"));
        assert!(qb_name_matches(" j.allen ", "J.Allen"));
        assert!(!qb_name_matches("J.Allen", "Patrick Mahomes"));
        assert!(!qb_name_matches("", "Patrick Mahomes"));
        assert!(qb_name_matches("Mahomes", "Patrick Mahomes"));
        assert!(qb_name_matches("P.Mahomes II", "Patrick Mahomes"));
    }

    #[test]
    fn shared_first_name_is_not_a_match() {
        assert!(!qb_name_matches("Josh Jacobs", "Josh Allen"));
        assert!(!qb_name_matches("J.Jacobs", "J.Allen"));
        assert!(!qb_name_matches("A.Allen", "Josh Allen"));
        assert!(qb_name_matches("J.Allen", "Josh Allen"));
    }

    #[test]
    fn short_intermediate_interceptions_are_not_qb_fault() {
        let mut deep = Play::snap("g", 1, "KC", "BUF", PlayType::Pass);
        deep.interception = true;
        deep.air_yards = Some(22);
        let mut short = Play::snap("g", 2, "KC", "BUF", PlayType::Pass);
        short.interception = true;
        short.air_yards = Some(3);
        let mut sack = Play::snap("g", 3, "KC", "BUF", PlayType::Sack);
        sack.fumble_lost = true;
        let out = attribute_turnovers(&[&deep, &short, &sack], "Mahomes", &QbConfig::default());
        assert_eq!(out.interceptions_qb_fault, 1);
        assert_eq!(out.interceptions_other, 1);
        assert_eq!(out.fumbles_qb_fault, 1);
        assert!((out.weighted - (1.0 + 0.35 + 0.75)).abs() < 1e-12);
    }
}
