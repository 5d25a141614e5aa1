use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregate::{AggregationMode, TeamKeyProfile, aggregate_keys};
use crate::availability::ReadinessReport;
use crate::config::{EngineConfig, StoreBacking};
use crate::data_access::{MemoryPlaySource, PlaySource};
use crate::defense_strength::{LeagueDefenses, RegularSeasonPlays, estimate_defenses};
use crate::error::EngineResult;
use crate::game_keys::extract_season_games;
use crate::matchup::{MatchupResult, predict_matchup};
use crate::play::{GameType, Play};
use crate::play_store::SqlitePlayStore;
use crate::qb_production::{QbProductionResult, score_qb};
use crate::rank_keys::{TeamKeyRanks, league_ranks};
use crate::turnover_regression::{TurnoverOutlook, team_expected_turnovers};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchupRequest {
    pub team_a: String,
    pub team_b: String,
    pub season: u16,
    pub game_type: GameType,
    pub mode: AggregationMode,
}

/// Wires a play source and one configuration through the full prediction flow.
pub struct KeysEngine<S> {
    source: S,
    config: EngineConfig,
}

impl<S: PlaySource> KeysEngine<S> {
    pub fn new(source: S, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { source, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn readiness(&self, season: u16) -> EngineResult<ReadinessReport> {
        self.source.readiness(season)
    }

    /// Strength of every defense from that season's regular-season plays only.
    pub fn defenses(&self, season: u16) -> EngineResult<LeagueDefenses> {
        let plays = self.source.league_plays(season, GameType::Regular)?;
        let regular = RegularSeasonPlays::new(plays);
        if regular.is_empty() {
            warn!(season, "no regular-season plays, opponent strength is neutral");
        }
        Ok(estimate_defenses(&regular, &self.config))
    }

    pub fn team_profile(
        &self,
        team: &str,
        season: u16,
        game_type: GameType,
        mode: AggregationMode,
        defenses: &LeagueDefenses,
    ) -> EngineResult<TeamKeyProfile> {
        let plays = self.source.get_plays(team, season, game_type)?;
        let games = extract_season_games(&plays, team, &self.config.keys);
        aggregate_keys(team, &games, mode, defenses, &self.config.aggregation)
    }

    pub fn predict(&self, req: &MatchupRequest) -> EngineResult<MatchupResult> {
        let defenses = self.defenses(req.season)?;
        let a = self.team_profile(&req.team_a, req.season, req.game_type, req.mode, &defenses)?;
        let b = self.team_profile(&req.team_b, req.season, req.game_type, req.mode, &defenses)?;
        let mut result = predict_matchup(&a, &b, &self.config)?;
        result.turnover_outlook = Some(TurnoverOutlook::new(
            self.expected_giveaways(&req.team_a, req.season)?,
            self.expected_giveaways(&req.team_b, req.season)?,
        ));
        info!(
            team_a = %req.team_a,
            team_b = %req.team_b,
            season = req.season,
            p_a = result.win_probability_a,
            keys_a = result.keys_won_a,
            keys_b = result.keys_won_b,
            "matchup predicted"
        );
        Ok(result)
    }

    pub fn qb_production(&self, qb: &str, team: &str, season: u16) -> EngineResult<QbProductionResult> {
        let defenses = self.defenses(season)?;
        let plays = self.source.get_plays_for_qb(qb, team, season)?;
        score_qb(qb, team, &plays, &defenses, &self.config)
    }

    pub fn ranks(&self, season: u16, game_type: GameType, mode: AggregationMode) -> EngineResult<Vec<TeamKeyRanks>> {
        let defenses = self.defenses(season)?;
        let plays = self.source.league_plays(season, game_type)?;
        Ok(league_ranks(&plays, mode, &defenses, &self.config))
    }

    fn expected_giveaways(&self, team: &str, season: u16) -> EngineResult<Option<f64>> {
        let plays = self.source.get_plays(team, season, GameType::All)?;
        let games = extract_season_games(&plays, team, &self.config.keys);
        Ok(team_expected_turnovers(&games, &self.config.turnovers))
    }
}

/// The store selected by configuration.
pub enum BackedSource {
    Memory(MemoryPlaySource),
    Sqlite(SqlitePlayStore),
}

impl BackedSource {
    pub fn open(backing: &StoreBacking, seed: Vec<Play>) -> Result<Self> {
        Ok(match backing {
            StoreBacking::Memory => BackedSource::Memory(MemoryPlaySource::new(seed)),
            StoreBacking::Sqlite { path } => {
                let mut store = SqlitePlayStore::open(path)?;
                if !seed.is_empty() {
                    store.upsert(&seed)?;
                }
                BackedSource::Sqlite(store)
            }
        })
    }
}

impl PlaySource for BackedSource {
    fn league_plays(&self, season: u16, game_type: GameType) -> EngineResult<Vec<Play>> {
        match self {
            BackedSource::Memory(s) => s.league_plays(season, game_type),
            BackedSource::Sqlite(s) => s.league_plays(season, game_type),
        }
    }

    fn seasons(&self) -> EngineResult<Vec<u16>> {
        match self {
            BackedSource::Memory(s) => s.seasons(),
            BackedSource::Sqlite(s) => s.seasons(),
        }
    }

    fn raw_season(&self, season: u16) -> EngineResult<Vec<Play>> {
        match self {
            BackedSource::Memory(s) => s.raw_season(season),
            BackedSource::Sqlite(s) => s.raw_season(season),
        }
    }
}
