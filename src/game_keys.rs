use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::KeyConfig;
use crate::error::{Degradation, DegradationReason};
use crate::play::{Play, PlayType, SeasonType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    TimeOfPossession,
    Turnovers,
    BigPlays,
    ThirdDown,
    RedZone,
}

impl Key {
    pub const ALL: [Key; 5] = [
        Key::TimeOfPossession,
        Key::Turnovers,
        Key::BigPlays,
        Key::ThirdDown,
        Key::RedZone,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Key::TimeOfPossession => "TOP",
            Key::Turnovers => "TO",
            Key::BigPlays => "BIG",
            Key::ThirdDown => "3D",
            Key::RedZone => "RZ",
        }
    }
}

/// One value per key. Field names double as the JSON config keys.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerKey<T> {
    pub top: T,
    pub turnovers: T,
    pub big_plays: T,
    pub third_down: T,
    pub red_zone: T,
}

impl<T> PerKey<T> {
    pub fn from_fn(mut f: impl FnMut(Key) -> T) -> Self {
        Self {
            top: f(Key::TimeOfPossession),
            turnovers: f(Key::Turnovers),
            big_plays: f(Key::BigPlays),
            third_down: f(Key::ThirdDown),
            red_zone: f(Key::RedZone),
        }
    }

    pub fn get(&self, key: Key) -> &T {
        match key {
            Key::TimeOfPossession => &self.top,
            Key::Turnovers => &self.turnovers,
            Key::BigPlays => &self.big_plays,
            Key::ThirdDown => &self.third_down,
            Key::RedZone => &self.red_zone,
        }
    }

    pub fn get_mut(&mut self, key: Key) -> &mut T {
        match key {
            Key::TimeOfPossession => &mut self.top,
            Key::Turnovers => &mut self.turnovers,
            Key::BigPlays => &mut self.big_plays,
            Key::ThirdDown => &mut self.third_down,
            Key::RedZone => &mut self.red_zone,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(Key, &T) -> U) -> PerKey<U> {
        PerKey::from_fn(|key| f(key, self.get(key)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum KeyValue {
    Value(f64),
    /// Denominator was zero (no third downs, no red-zone trips, no possessions).
    NoAttempts,
    /// The team had no plays in the game.
    Unusable,
}

impl KeyValue {
    pub fn value(self) -> Option<f64> {
        match self {
            KeyValue::Value(v) => Some(v),
            _ => None,
        }
    }

    fn ratio(num: u32, den: u32) -> Self {
        if den == 0 {
            KeyValue::NoAttempts
        } else {
            KeyValue::Value(f64::from(num) / f64::from(den))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopSource {
    Clock,
    PossessionProxy,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameKeySet {
    pub game_id: String,
    pub team: String,
    pub opponent: Option<String>,
    pub season_type: Option<SeasonType>,
    pub usable: bool,
    pub keys: PerKey<KeyValue>,
    pub top_source: TopSource,
    pub giveaways: u32,
    pub takeaways: u32,
    pub big_plays: u32,
    pub third_down_attempts: u32,
    pub third_down_conversions: u32,
    pub red_zone_trips: u32,
    pub red_zone_tds: u32,
    pub offensive_plays: u32,
    pub degradations: Vec<Degradation>,
}

impl GameKeySet {
    fn unusable(game_id: &str, team: &str) -> Self {
        Self {
            game_id: game_id.to_string(),
            team: team.to_string(),
            opponent: None,
            season_type: None,
            usable: false,
            keys: PerKey::from_fn(|_| KeyValue::Unusable),
            top_source: TopSource::PossessionProxy,
            giveaways: 0,
            takeaways: 0,
            big_plays: 0,
            third_down_attempts: 0,
            third_down_conversions: 0,
            red_zone_trips: 0,
            red_zone_tds: 0,
            offensive_plays: 0,
            degradations: vec![Degradation::new(
                format!("{team} {game_id}"),
                None,
                DegradationReason::UnusableGame,
            )],
        }
    }

    pub fn value(&self, key: Key) -> Option<f64> {
        self.keys.get(key).value()
    }
}

/// Five keys for `team` in one game. `plays` may hold the whole game or more;
/// anything outside `game_id` or not involving the team is ignored.
pub fn extract_game_keys(game_id: &str, team: &str, plays: &[Play], cfg: &KeyConfig) -> GameKeySet {
    let mut game: Vec<&Play> = plays
        .iter()
        .filter(|p| p.game_id == game_id && (p.offense == team || p.defense == team))
        .collect();
    if game.is_empty() {
        return GameKeySet::unusable(game_id, team);
    }
    game.sort_by_key(|p| p.play_id);

    let scope = format!("{team} {game_id}");
    let mut degradations = Vec::new();
    let possessions = possession_ids(&game);

    let (top, top_source) = time_of_possession(team, &game, &possessions);
    if top_source == TopSource::PossessionProxy {
        degradations.push(Degradation::new(
            scope.clone(),
            Some(Key::TimeOfPossession),
            DegradationReason::PossessionProxy,
        ));
    }

    let mut giveaways = 0u32;
    let mut takeaways = 0u32;
    let mut big_plays = 0u32;
    let mut third_attempts = 0u32;
    let mut third_conversions = 0u32;
    let mut offensive_plays = 0u32;
    let mut rz_trips: BTreeSet<u32> = BTreeSet::new();
    let mut rz_td_drives: BTreeSet<u32> = BTreeSet::new();

    for (p, &poss) in game.iter().zip(possessions.iter()) {
        if p.no_play {
            continue;
        }
        if p.defense == team {
            if p.turnover() {
                takeaways += 1;
            }
            continue;
        }

        if p.turnover() {
            giveaways += 1;
        }
        if p.play_type.is_scrimmage() {
            offensive_plays += 1;
        }
        if is_big_play(p, cfg) {
            big_plays += 1;
        }
        if p.is_snap() && p.down == Some(cfg.third_down_number) {
            third_attempts += 1;
            if p.down_converted() {
                third_conversions += 1;
            }
        }
        if p.in_red_zone(cfg.red_zone_yardline) {
            rz_trips.insert(poss);
        }
        if p.offensive_touchdown() {
            rz_td_drives.insert(poss);
        }
    }

    let red_zone_tds = rz_trips.intersection(&rz_td_drives).count() as u32;
    let red_zone_trips = rz_trips.len() as u32;

    let keys = PerKey {
        top,
        turnovers: KeyValue::Value(f64::from(takeaways) - f64::from(giveaways)),
        big_plays: KeyValue::Value(f64::from(big_plays)),
        third_down: KeyValue::ratio(third_conversions, third_attempts),
        red_zone: KeyValue::ratio(red_zone_tds, red_zone_trips),
    };
    for key in Key::ALL {
        if *keys.get(key) == KeyValue::NoAttempts {
            degradations.push(Degradation::new(scope.clone(), Some(key), DegradationReason::NoAttempts));
        }
    }

    let first = game[0];
    GameKeySet {
        game_id: game_id.to_string(),
        team: team.to_string(),
        opponent: first.opponent_of(team).map(str::to_string),
        season_type: Some(first.season_type),
        usable: true,
        keys,
        top_source,
        giveaways,
        takeaways,
        big_plays,
        third_down_attempts: third_attempts,
        third_down_conversions: third_conversions,
        red_zone_trips,
        red_zone_tds,
        offensive_plays,
        degradations,
    }
}

/// Every game of `team` found in `plays`, ordered by game id.
pub fn extract_season_games(plays: &[Play], team: &str, cfg: &KeyConfig) -> Vec<GameKeySet> {
    let mut by_game: BTreeMap<&str, Vec<Play>> = BTreeMap::new();
    for p in plays.iter().filter(|p| p.offense == team || p.defense == team) {
        by_game.entry(p.game_id.as_str()).or_default().push(p.clone());
    }
    by_game
        .into_iter()
        .map(|(game_id, game_plays)| extract_game_keys(game_id, team, &game_plays, cfg))
        .collect()
}

pub fn is_big_play(p: &Play, cfg: &KeyConfig) -> bool {
    if p.no_play {
        return false;
    }
    match p.play_type {
        PlayType::Pass => p.yards_gained >= cfg.big_play_pass_yards,
        PlayType::Rush => p.yards_gained >= cfg.big_play_rush_yards,
        _ => false,
    }
}

// Drive ids when the feed has them for every play, otherwise a running counter
// bumped whenever the offense changes. `game` must be in play order.
fn possession_ids(game: &[&Play]) -> Vec<u32> {
    if game.iter().all(|p| p.drive.is_some()) {
        return game.iter().map(|p| p.drive.unwrap_or_default()).collect();
    }
    let mut out = Vec::with_capacity(game.len());
    let mut current = 0u32;
    let mut last_offense: Option<&str> = None;
    for p in game {
        if last_offense.is_some_and(|o| o != p.offense) {
            current += 1;
        }
        last_offense = Some(p.offense.as_str());
        out.push(current);
    }
    out
}

// The clock is trusted only when every possession carries a drive time;
// partial coverage falls back to the possession count.
fn time_of_possession(team: &str, game: &[&Play], possessions: &[u32]) -> (KeyValue, TopSource) {
    let mut drives: BTreeMap<u32, (bool, Option<u32>)> = BTreeMap::new();
    for (p, &poss) in game.iter().zip(possessions.iter()) {
        let slot = drives.entry(poss).or_insert((p.offense == team, None));
        if slot.1.is_none() {
            slot.1 = p.drive_time_secs;
        }
    }

    let team_drives = drives.values().filter(|(ours, _)| *ours).count() as u32;
    let total_drives = drives.len() as u32;

    let fully_clocked = drives.values().all(|(_, secs)| secs.is_some());
    if fully_clocked {
        let mut team_secs = 0u64;
        let mut total_secs = 0u64;
        for (ours, secs) in drives.values() {
            let secs = u64::from(secs.unwrap_or(0));
            total_secs += secs;
            if *ours {
                team_secs += secs;
            }
        }
        if total_secs > 0 {
            return (
                KeyValue::Value(team_secs as f64 / total_secs as f64),
                TopSource::Clock,
            );
        }
    } else if drives.values().any(|(_, secs)| secs.is_some()) {
        debug!(team, drives = total_drives, "partial drive clock, using possession count");
    }
    (KeyValue::ratio(team_drives, total_drives), TopSource::PossessionProxy)
}
