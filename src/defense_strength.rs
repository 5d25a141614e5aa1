use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::game_keys::{Key, PerKey, extract_season_games};
use crate::play::{Play, SeasonType, final_score};

/// Plays guaranteed to come from the regular season. Postseason snaps are
/// dropped on construction so they can never feed the strength estimate.
#[derive(Debug, Clone, Default)]
pub struct RegularSeasonPlays {
    plays: Vec<Play>,
}

impl RegularSeasonPlays {
    pub fn new(plays: Vec<Play>) -> Self {
        let before = plays.len();
        let plays: Vec<Play> = plays
            .into_iter()
            .filter(|p| p.season_type == SeasonType::Regular)
            .collect();
        let dropped = before - plays.len();
        if dropped > 0 {
            debug!(dropped, "dropped postseason plays from strength input");
        }
        Self { plays }
    }

    pub fn plays(&self) -> &[Play] {
        &self.plays
    }

    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthMethod {
    Epa,
    SuccessRate,
}

impl StrengthMethod {
    /// EPA when the season's feed carries it on any scrimmage snap.
    pub fn select(plays: &[Play]) -> Self {
        if plays.iter().any(|p| p.is_snap() && p.epa.is_some()) {
            StrengthMethod::Epa
        } else {
            StrengthMethod::SuccessRate
        }
    }

    pub fn play_value(self, p: &Play) -> Option<f64> {
        match self {
            StrengthMethod::Epa => p.epa,
            StrengthMethod::SuccessRate => success_of(p).map(|s| if s { 1.0 } else { 0.0 }),
        }
    }
}

/// Success flag from the feed, then EPA sign, then the classic down/distance rule
/// (40% of to-go on first down, 60% on second, all of it on third and fourth).
pub fn success_of(p: &Play) -> Option<bool> {
    if let Some(s) = p.success {
        return Some(s);
    }
    if let Some(epa) = p.epa {
        return Some(epa > 0.0);
    }
    if p.turnover() {
        return Some(false);
    }
    if p.offensive_touchdown() {
        return Some(true);
    }
    let down = p.down?;
    let togo = f64::from(p.yards_to_go?);
    let gained = f64::from(p.yards_gained);
    Some(match down {
        1 => gained >= 0.4 * togo,
        2 => gained >= 0.6 * togo,
        _ => gained >= togo,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefenseStrength {
    pub team: String,
    /// z-scored toughness from value allowed per snap (higher = harder to move the ball on).
    pub difficulty_z: f64,
    /// Mean over the five keys of the z-scored key performance allowed, sign flipped.
    pub schedule_z: f64,
    /// z-scored regular-season win pct; 0 without a scored record.
    pub record_z: f64,
    pub composite: f64,
    pub value_allowed: Option<f64>,
    pub win_pct: Option<f64>,
    pub games: usize,
    pub snaps: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeagueDefenses {
    pub season: Option<u16>,
    pub method: StrengthMethod,
    pub teams: BTreeMap<String, DefenseStrength>,
}

impl LeagueDefenses {
    pub fn empty(method: StrengthMethod) -> Self {
        Self {
            season: None,
            method,
            teams: BTreeMap::new(),
        }
    }

    pub fn get(&self, team: &str) -> Option<&DefenseStrength> {
        self.teams.get(team)
    }

    /// Blended strength; unknown teams are league average.
    pub fn composite(&self, team: &str) -> f64 {
        self.get(team).map_or(0.0, |d| d.composite)
    }

    pub fn difficulty(&self, team: &str) -> f64 {
        self.get(team).map_or(0.0, |d| d.difficulty_z)
    }

    pub fn win_pct(&self, team: &str) -> Option<f64> {
        self.get(team).and_then(|d| d.win_pct)
    }
}

pub fn estimate_defenses(plays: &RegularSeasonPlays, cfg: &EngineConfig) -> LeagueDefenses {
    let plays = plays.plays();
    let method = StrengthMethod::select(plays);
    let season = plays.iter().map(|p| p.season).max();

    let mut value_sum: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    let mut snaps: BTreeMap<&str, usize> = BTreeMap::new();
    for p in plays.iter().filter(|p| p.is_snap()) {
        *snaps.entry(p.defense.as_str()).or_default() += 1;
        if let Some(v) = method.play_value(p) {
            let slot = value_sum.entry(p.defense.as_str()).or_default();
            slot.0 += v;
            slot.1 += 1;
        }
    }
    let value_allowed: BTreeMap<&str, f64> = value_sum
        .iter()
        .filter(|(_, (_, n))| *n > 0)
        .map(|(team, (sum, n))| (*team, sum / *n as f64))
        .collect();
    let toughness: Vec<(&str, f64)> = value_allowed.iter().map(|(t, v)| (*t, -v)).collect();
    let difficulty = zscores(&toughness);

    let schedule = schedule_component(plays, cfg);
    let records = win_pcts(plays);
    let record_values: Vec<(&str, f64)> = records.iter().map(|(t, (pct, _))| (t.as_str(), *pct)).collect();
    let record = zscores(&record_values);

    let teams: BTreeSet<&str> = plays
        .iter()
        .flat_map(|p| [p.home_team.as_str(), p.away_team.as_str()])
        .collect();

    let ew = cfg.strength.efficiency_weight;
    let sw = cfg.strength.schedule_weight;
    let rw = cfg.strength.record_weight;
    let mut out = BTreeMap::new();
    for team in teams {
        let difficulty_z = difficulty.get(team).copied().unwrap_or(0.0);
        let schedule_z = schedule.get(team).copied().unwrap_or(0.0);
        let record_z = record.get(team).copied().unwrap_or(0.0);
        let composite = (ew * difficulty_z + sw * schedule_z + rw * record_z) / (ew + sw + rw);
        let (win_pct, games) = match records.get(team) {
            Some(&(pct, games)) => (Some(pct), games),
            None => (None, 0),
        };
        out.insert(
            team.to_string(),
            DefenseStrength {
                team: team.to_string(),
                difficulty_z,
                schedule_z,
                record_z,
                composite,
                value_allowed: value_allowed.get(team).copied(),
                win_pct,
                games,
                snaps: snaps.get(team).copied().unwrap_or(0),
            },
        );
    }

    info!(
        season = season.unwrap_or_default(),
        method = ?method,
        teams = out.len(),
        "estimated defensive strength"
    );
    LeagueDefenses {
        season,
        method,
        teams: out,
    }
}

// Per defense, what its opponents produced on each key, z-scored against the
// league and flipped so that allowing less scores higher.
fn schedule_component(plays: &[Play], cfg: &EngineConfig) -> BTreeMap<String, f64> {
    let offenses: Vec<&str> = plays
        .iter()
        .map(|p| p.offense.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let per_offense: Vec<Vec<(String, PerKey<Option<f64>>)>> = offenses
        .par_iter()
        .map(|team| {
            extract_season_games(plays, team, &cfg.keys)
                .into_iter()
                .filter(|g| g.usable)
                .filter_map(|g| {
                    let opp = g.opponent.clone()?;
                    Some((opp, g.keys.map(|_, v| v.value())))
                })
                .collect()
        })
        .collect();

    let mut allowed: BTreeMap<String, PerKey<(f64, usize)>> = BTreeMap::new();
    for (defense, keys) in per_offense.into_iter().flatten() {
        let slot = allowed.entry(defense).or_default();
        for key in Key::ALL {
            if let Some(v) = *keys.get(key) {
                let acc = slot.get_mut(key);
                acc.0 += v;
                acc.1 += 1;
            }
        }
    }

    let mut per_key_z: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for key in Key::ALL {
        let means: Vec<(&str, f64)> = allowed
            .iter()
            .filter_map(|(team, acc)| {
                let (sum, n) = *acc.get(key);
                (n > 0).then(|| (team.as_str(), -(sum / n as f64)))
            })
            .collect();
        for (team, z) in zscores(&means) {
            let slot = per_key_z.entry(team.to_string()).or_default();
            slot.0 += z;
            slot.1 += 1;
        }
    }
    per_key_z
        .into_iter()
        .map(|(team, (sum, n))| (team, sum / n as f64))
        .collect()
}

fn win_pcts(plays: &[Play]) -> BTreeMap<String, (f64, usize)> {
    let mut games: BTreeMap<&str, Vec<&Play>> = BTreeMap::new();
    for p in plays {
        games.entry(p.game_id.as_str()).or_default().push(p);
    }
    let mut record: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for game in games.values() {
        let Some((home_pts, away_pts)) = final_score(game.iter().copied()) else {
            continue;
        };
        let (home_credit, away_credit) = match home_pts.cmp(&away_pts) {
            std::cmp::Ordering::Greater => (1.0, 0.0),
            std::cmp::Ordering::Less => (0.0, 1.0),
            std::cmp::Ordering::Equal => (0.5, 0.5),
        };
        for (team, credit) in [(&game[0].home_team, home_credit), (&game[0].away_team, away_credit)] {
            let slot = record.entry(team.clone()).or_default();
            slot.0 += credit;
            slot.1 += 1;
        }
    }
    record
        .into_iter()
        .map(|(team, (wins, n))| (team, (wins / n as f64, n)))
        .collect()
}

/// Sample z-scores. Fewer than two values or zero spread gives 0 for everyone.
pub fn zscores<'a>(values: &[(&'a str, f64)]) -> BTreeMap<&'a str, f64> {
    let n = values.len();
    if n < 2 {
        return values.iter().map(|(t, _)| (*t, 0.0)).collect();
    }
    let mean = values.iter().map(|(_, v)| v).sum::<f64>() / n as f64;
    let var = values.iter().map(|(_, v)| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let sd = var.sqrt();
    values
        .iter()
        .map(|(t, v)| {
            let z = if sd > 1e-12 { (v - mean) / sd } else { 0.0 };
            (*t, z)
        })
        .collect()
}
