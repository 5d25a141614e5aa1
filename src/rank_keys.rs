use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::aggregate::{AggregationMode, TeamKeyProfile, aggregate_keys};
use crate::config::EngineConfig;
use crate::defense_strength::LeagueDefenses;
use crate::game_keys::{Key, PerKey, extract_season_games};
use crate::play::Play;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeyRank {
    pub value: f64,
    /// 1 is best.
    pub rank: usize,
    pub percentile: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamKeyRanks {
    pub team: String,
    pub ranks: PerKey<Option<KeyRank>>,
}

/// Percentile of each team's key among the profiles given; ties split the difference.
pub fn rank_profiles(profiles: &[TeamKeyProfile]) -> Vec<TeamKeyRanks> {
    let mut out: Vec<TeamKeyRanks> = profiles
        .iter()
        .map(|p| TeamKeyRanks {
            team: p.team.clone(),
            ranks: PerKey::default(),
        })
        .collect();

    for key in Key::ALL {
        let values: Vec<Option<f64>> = profiles.iter().map(|p| p.value(key)).collect();
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        let n = present.len();
        for (slot, value) in out.iter_mut().zip(values.iter()) {
            let Some(v) = *value else {
                continue;
            };
            let below = present.iter().filter(|x| **x < v).count();
            let above = present.iter().filter(|x| **x > v).count();
            let equal_others = n - below - above - 1;
            let percentile = if n > 1 {
                100.0 * (below as f64 + 0.5 * equal_others as f64) / (n - 1) as f64
            } else {
                50.0
            };
            *slot.ranks.get_mut(key) = Some(KeyRank {
                value: v,
                rank: above + 1,
                percentile,
            });
        }
    }
    out
}

/// Profiles for every team found in `plays`, built in parallel. Teams without a
/// usable game are left out.
pub fn league_profiles(
    plays: &[Play],
    mode: AggregationMode,
    defenses: &LeagueDefenses,
    cfg: &EngineConfig,
) -> Vec<TeamKeyProfile> {
    let teams: Vec<&str> = plays
        .iter()
        .map(|p| p.offense.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    teams
        .par_iter()
        .filter_map(|team| {
            let games = extract_season_games(plays, team, &cfg.keys);
            match aggregate_keys(team, &games, mode, defenses, &cfg.aggregation) {
                Ok(profile) => Some(profile),
                Err(err) => {
                    debug!(team = *team, %err, "team left out of ranks");
                    None
                }
            }
        })
        .collect()
}

pub fn league_ranks(
    plays: &[Play],
    mode: AggregationMode,
    defenses: &LeagueDefenses,
    cfg: &EngineConfig,
) -> Vec<TeamKeyRanks> {
    rank_profiles(&league_profiles(plays, mode, defenses, cfg))
}
