use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::availability::{ReadinessReport, assess_readiness, require_usable};
use crate::error::{EngineError, EngineResult};
use crate::play::{GameType, Play, SeasonType};
use crate::qb_production::is_qb_play;

/// Where the engine gets plays from. Implementations return already
/// materialised plays; any fetching or caching happens behind this trait.
pub trait PlaySource {
    /// Every play of `season` restricted to `game_type`. Fails with
    /// `DataUnavailable` when the season is missing or lacks required fields.
    fn league_plays(&self, season: u16, game_type: GameType) -> EngineResult<Vec<Play>>;

    fn seasons(&self) -> EngineResult<Vec<u16>>;

    fn get_plays(&self, team: &str, season: u16, game_type: GameType) -> EngineResult<Vec<Play>> {
        let plays = self.league_plays(season, game_type)?;
        Ok(plays.into_iter().filter(|p| p.involves(team)).collect())
    }

    fn get_plays_for_qb(&self, qb: &str, team: &str, season: u16) -> EngineResult<Vec<Play>> {
        let plays = self.get_plays(team, season, GameType::All)?;
        Ok(plays
            .into_iter()
            .filter(|p| p.offense == team && is_qb_play(p, qb))
            .collect())
    }

    fn readiness(&self, season: u16) -> EngineResult<ReadinessReport> {
        let plays = self.raw_season(season)?;
        Ok(assess_readiness(season, &plays))
    }

    /// The season as stored, without the readiness gate.
    fn raw_season(&self, season: u16) -> EngineResult<Vec<Play>>;
}

/// Shared gate for implementations: season present, required fields populated,
/// then narrowed to the requested game type.
pub fn gate_season(season: u16, plays: Vec<Play>, game_type: GameType) -> EngineResult<Vec<Play>> {
    if plays.is_empty() {
        return Err(EngineError::DataUnavailable(format!("no plays stored for season {season}")));
    }
    require_usable(season, &plays)?;
    let out: Vec<Play> = plays
        .into_iter()
        .filter(|p| game_type.includes(p.season_type))
        .collect();
    debug!(season, ?game_type, plays = out.len(), "served plays");
    Ok(out)
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPlaySource {
    plays: Vec<Play>,
}

impl MemoryPlaySource {
    pub fn new(plays: Vec<Play>) -> Self {
        Self { plays }
    }

    pub fn extend(&mut self, plays: impl IntoIterator<Item = Play>) {
        self.plays.extend(plays);
    }

    pub fn len(&self) -> usize {
        self.plays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }
}

impl PlaySource for MemoryPlaySource {
    fn league_plays(&self, season: u16, game_type: GameType) -> EngineResult<Vec<Play>> {
        gate_season(season, self.raw_season(season)?, game_type)
    }

    fn seasons(&self) -> EngineResult<Vec<u16>> {
        let set: BTreeSet<u16> = self.plays.iter().map(|p| p.season).collect();
        Ok(set.into_iter().collect())
    }

    fn raw_season(&self, season: u16) -> EngineResult<Vec<Play>> {
        Ok(self
            .plays
            .iter()
            .filter(|p| p.season == season)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamGame {
    pub game_id: String,
    pub opponent: String,
    pub season_type: SeasonType,
    pub week: Option<u8>,
    pub home: bool,
}

/// Games `team` appears in, ordered by game id.
pub fn team_games(plays: &[Play], team: &str) -> Vec<TeamGame> {
    let mut games: BTreeMap<&str, TeamGame> = BTreeMap::new();
    for p in plays {
        let Some(opponent) = p.opponent_of(team) else {
            continue;
        };
        games.entry(p.game_id.as_str()).or_insert_with(|| TeamGame {
            game_id: p.game_id.clone(),
            opponent: opponent.to_string(),
            season_type: p.season_type,
            week: p.week,
            home: p.home_team == team,
        });
    }
    games.into_values().collect()
}
