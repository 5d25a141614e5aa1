use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonType {
    Regular,
    Postseason,
}

impl SeasonType {
    pub fn as_str(self) -> &'static str {
        match self {
            SeasonType::Regular => "REG",
            SeasonType::Postseason => "POST",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "REG" | "REGULAR" => Some(SeasonType::Regular),
            "POST" | "POSTSEASON" => Some(SeasonType::Postseason),
            _ => None,
        }
    }
}

/// Which slice of a season a caller asks the data layer for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    Regular,
    Postseason,
    All,
}

impl GameType {
    pub fn includes(self, season_type: SeasonType) -> bool {
        match self {
            GameType::Regular => season_type == SeasonType::Regular,
            GameType::Postseason => season_type == SeasonType::Postseason,
            GameType::All => true,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "reg" | "regular" => Some(GameType::Regular),
            "post" | "postseason" => Some(GameType::Postseason),
            "all" | "both" => Some(GameType::All),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayType {
    Pass,
    Rush,
    Sack,
    Other,
}

impl PlayType {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayType::Pass => "pass",
            PlayType::Rush => "run",
            PlayType::Sack => "sack",
            PlayType::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pass" => PlayType::Pass,
            "run" | "rush" => PlayType::Rush,
            "sack" => PlayType::Sack,
            _ => PlayType::Other,
        }
    }

    pub fn is_scrimmage(self) -> bool {
        matches!(self, PlayType::Pass | PlayType::Rush | PlayType::Sack)
    }
}

/// One snap from a play-by-play feed. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Play {
    pub game_id: String,
    pub play_id: u32,
    pub season: u16,
    pub season_type: SeasonType,
    #[serde(default)]
    pub week: Option<u8>,
    pub home_team: String,
    pub away_team: String,
    pub offense: String,
    pub defense: String,
    #[serde(default)]
    pub drive: Option<u32>,
    // Length of the whole drive this play belongs to, repeated on every play of it.
    #[serde(default)]
    pub drive_time_secs: Option<u32>,
    #[serde(default)]
    pub down: Option<u8>,
    #[serde(default)]
    pub yards_to_go: Option<u8>,
    // Distance to the opponent end zone.
    #[serde(default)]
    pub yardline_100: Option<u8>,
    pub play_type: PlayType,
    #[serde(default)]
    pub yards_gained: i16,
    #[serde(default)]
    pub first_down: Option<bool>,
    #[serde(default)]
    pub touchdown: bool,
    #[serde(default)]
    pub interception: bool,
    #[serde(default)]
    pub fumble_lost: bool,
    #[serde(default)]
    pub no_play: bool,
    #[serde(default)]
    pub scramble: bool,
    #[serde(default)]
    pub epa: Option<f64>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub passer: Option<String>,
    #[serde(default)]
    pub rusher: Option<String>,
    #[serde(default)]
    pub air_yards: Option<i16>,
    #[serde(default)]
    pub home_score: Option<u16>,
    #[serde(default)]
    pub away_score: Option<u16>,
}

impl Play {
    /// A clean regular-season scrimmage snap with every optional field empty.
    pub fn snap(game_id: &str, play_id: u32, offense: &str, defense: &str, play_type: PlayType) -> Self {
        Self {
            game_id: game_id.to_string(),
            play_id,
            season: 2024,
            season_type: SeasonType::Regular,
            week: None,
            home_team: offense.to_string(),
            away_team: defense.to_string(),
            offense: offense.to_string(),
            defense: defense.to_string(),
            drive: None,
            drive_time_secs: None,
            down: None,
            yards_to_go: None,
            yardline_100: None,
            play_type,
            yards_gained: 0,
            first_down: None,
            touchdown: false,
            interception: false,
            fumble_lost: false,
            no_play: false,
            scramble: false,
            epa: None,
            success: None,
            passer: None,
            rusher: None,
            air_yards: None,
            home_score: None,
            away_score: None,
        }
    }

    pub fn turnover(&self) -> bool {
        self.interception || self.fumble_lost
    }

    /// Touchdown credited to the offense. A return score after a takeaway belongs to the defense.
    pub fn offensive_touchdown(&self) -> bool {
        self.touchdown && !self.turnover()
    }

    /// Counted scrimmage snap: pass, rush or sack that was not wiped out by a penalty.
    pub fn is_snap(&self) -> bool {
        self.play_type.is_scrimmage() && !self.no_play
    }

    pub fn involves(&self, team: &str) -> bool {
        self.home_team == team || self.away_team == team
    }

    pub fn opponent_of(&self, team: &str) -> Option<&str> {
        if self.home_team == team {
            Some(self.away_team.as_str())
        } else if self.away_team == team {
            Some(self.home_team.as_str())
        } else {
            None
        }
    }

    pub fn down_converted(&self) -> bool {
        if self.offensive_touchdown() {
            return true;
        }
        match self.first_down {
            Some(flag) => flag,
            None => self
                .yards_to_go
                .is_some_and(|togo| self.yards_gained >= i16::from(togo)),
        }
    }

    pub fn in_red_zone(&self, red_zone_yardline: u8) -> bool {
        self.yardline_100.is_some_and(|y| y <= red_zone_yardline)
    }
}

/// Final score of a game as the highest running score seen on any of its plays.
pub fn final_score<'a>(plays: impl IntoIterator<Item = &'a Play>) -> Option<(u16, u16)> {
    let mut home: Option<u16> = None;
    let mut away: Option<u16> = None;
    for p in plays {
        if let Some(h) = p.home_score {
            home = Some(home.map_or(h, |cur| cur.max(h)));
        }
        if let Some(a) = p.away_score {
            away = Some(away.map_or(a, |cur| cur.max(a)));
        }
    }
    Some((home?, away?))
}
