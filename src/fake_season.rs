use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::play::{Play, PlayType, SeasonType, final_score};

const DRIVES_PER_GAME: u32 = 22;
const MAX_PLAYS_PER_DRIVE: u32 = 16;

#[derive(Debug, Clone)]
pub struct FakeTeam {
    pub code: String,
    pub qb: String,
    /// Roughly -1..1; moves success and explosive-play odds.
    pub offense: f64,
    pub defense: f64,
}

impl FakeTeam {
    pub fn new(code: &str, qb: &str, offense: f64, defense: f64) -> Self {
        Self {
            code: code.to_string(),
            qb: qb.to_string(),
            offense,
            defense,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeSeasonConfig {
    pub seed: u64,
    pub season: u16,
    pub teams: Vec<FakeTeam>,
    pub meetings: u8,
    pub playoff_teams: usize,
    pub with_epa: bool,
    pub with_clock: bool,
}

impl Default for FakeSeasonConfig {
    fn default() -> Self {
        Self {
            seed: 2024,
            season: 2024,
            teams: vec![
                FakeTeam::new("KC", "P.Mahomes", 0.6, 0.5),
                FakeTeam::new("BUF", "J.Allen", 0.7, 0.2),
                FakeTeam::new("BAL", "L.Jackson", 0.8, 0.3),
                FakeTeam::new("SF", "B.Purdy", 0.4, 0.4),
                FakeTeam::new("PHI", "J.Hurts", 0.5, 0.6),
                FakeTeam::new("DET", "J.Goff", 0.6, 0.0),
                FakeTeam::new("CIN", "J.Burrow", 0.3, -0.4),
                FakeTeam::new("NYG", "D.Jones", -0.6, -0.2),
            ],
            meetings: 2,
            playoff_teams: 4,
            with_epa: true,
            with_clock: true,
        }
    }
}

/// Deterministic synthetic league: a round robin regular season followed by a
/// seeded single-elimination bracket. Same config, same plays.
pub fn generate_season(cfg: &FakeSeasonConfig) -> Vec<Play> {
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut plays = Vec::new();

    let mut week = 1u8;
    for meeting in 0..cfg.meetings {
        for i in 0..cfg.teams.len() {
            for j in (i + 1)..cfg.teams.len() {
                let (home, away) = if (i + j + usize::from(meeting)) % 2 == 0 {
                    (&cfg.teams[i], &cfg.teams[j])
                } else {
                    (&cfg.teams[j], &cfg.teams[i])
                };
                let game = GameSpec {
                    season: cfg.season,
                    season_type: SeasonType::Regular,
                    week,
                    home,
                    away,
                };
                simulate_game(&mut rng, &game, cfg, &mut plays);
                week = week.wrapping_add(1);
            }
        }
    }

    let mut seeds = standings(&plays, cfg);
    seeds.truncate(cfg.playoff_teams.max(2));
    let mut round_week = 100u8;
    while seeds.len() > 1 {
        let mut next = Vec::new();
        let n = seeds.len();
        for k in 0..n / 2 {
            let (Some(home), Some(away)) = (find_team(cfg, &seeds[k]), find_team(cfg, &seeds[n - 1 - k])) else {
                continue;
            };
            let game = GameSpec {
                season: cfg.season,
                season_type: SeasonType::Postseason,
                week: round_week,
                home,
                away,
            };
            let start = plays.len();
            simulate_game(&mut rng, &game, cfg, &mut plays);
            if let Some((h, a)) = final_score(&plays[start..]) {
                next.push(if h >= a { home.code.clone() } else { away.code.clone() });
            }
        }
        seeds = next;
        round_week += 1;
    }
    plays
}

struct GameSpec<'a> {
    season: u16,
    season_type: SeasonType,
    week: u8,
    home: &'a FakeTeam,
    away: &'a FakeTeam,
}

impl GameSpec<'_> {
    fn game_id(&self) -> String {
        format!("{}_{:02}_{}_{}", self.season, self.week, self.away.code, self.home.code)
    }
}

struct Scoreboard {
    home: u16,
    away: u16,
    play_id: u32,
}

fn simulate_game(rng: &mut StdRng, game: &GameSpec<'_>, cfg: &FakeSeasonConfig, out: &mut Vec<Play>) {
    let mut board = Scoreboard {
        home: 0,
        away: 0,
        play_id: 1,
    };
    let mut home_ball = rng.gen_bool(0.5);
    for drive in 1..=DRIVES_PER_GAME {
        let (off, def) = if home_ball {
            (game.home, game.away)
        } else {
            (game.away, game.home)
        };
        simulate_drive(rng, game, drive, off, def, home_ball, &mut board, cfg, out);
        home_ball = !home_ball;
    }
    // Postseason games cannot end level; settle it with an overtime field goal.
    if game.season_type == SeasonType::Postseason && board.home == board.away {
        board.home += 3;
        let mut p = base_play(game, DRIVES_PER_GAME + 1, game.home, game.away, board.play_id, PlayType::Other);
        p.yardline_100 = Some(25);
        p.home_score = Some(board.home);
        p.away_score = Some(board.away);
        out.push(p);
    }
}

#[allow(clippy::too_many_arguments)]
fn simulate_drive(
    rng: &mut StdRng,
    game: &GameSpec<'_>,
    drive: u32,
    off: &FakeTeam,
    def: &FakeTeam,
    home_ball: bool,
    board: &mut Scoreboard,
    cfg: &FakeSeasonConfig,
    out: &mut Vec<Play>,
) {
    let edge = off.offense - def.defense;
    let mut yardline: i16 = rng.gen_range(60..=80);
    let mut down: u8 = 1;
    let mut togo: i16 = 10;
    let start = out.len();
    let mut secs = 0u32;

    for _ in 0..MAX_PLAYS_PER_DRIVE {
        if down == 4 {
            let mut kick = base_play(game, drive, off, def, board.play_id, PlayType::Other);
            kick.down = Some(4);
            kick.yards_to_go = Some(togo.clamp(1, 99) as u8);
            kick.yardline_100 = Some(yardline.clamp(1, 99) as u8);
            if yardline <= 35 && rng.gen_bool(0.8) {
                score(board, home_ball, 3);
            }
            kick.home_score = Some(board.home);
            kick.away_score = Some(board.away);
            board.play_id += 1;
            secs += 6;
            out.push(kick);
            break;
        }

        let roll: f64 = rng.r#gen();
        let scramble = roll < 0.05;
        let play_type = if scramble {
            PlayType::Rush
        } else if roll < 0.05 + prob(0.05 - 0.02 * edge) {
            PlayType::Sack
        } else if roll < 0.58 {
            PlayType::Pass
        } else {
            PlayType::Rush
        };

        let mut gained: i16 = match play_type {
            PlayType::Pass => {
                if rng.gen_bool(prob(0.62 + 0.06 * edge)) {
                    let base = rng.gen_range(2..=12);
                    if rng.gen_bool(prob(0.12 + 0.04 * edge)) {
                        base + rng.gen_range(12..=40)
                    } else {
                        base
                    }
                } else {
                    0
                }
            }
            PlayType::Rush => {
                let base = rng.gen_range(-2..=6);
                if rng.gen_bool(prob(0.07 + 0.03 * edge)) {
                    base + rng.gen_range(8..=30)
                } else {
                    base
                }
            }
            _ => -rng.gen_range(3..=9),
        };
        gained = gained.min(yardline);

        let interception = play_type == PlayType::Pass && rng.gen_bool(prob(0.025 - 0.01 * edge));
        let fumble_lost = play_type != PlayType::Pass && rng.gen_bool(prob(0.012 - 0.004 * edge));
        let turnover = interception || fumble_lost;
        if turnover {
            gained = gained.min(0).max(-(99 - yardline));
        }
        let touchdown = !turnover && gained >= yardline;
        let first_down = !turnover && gained >= togo;

        let mut p = base_play(game, drive, off, def, board.play_id, play_type);
        p.down = Some(down);
        p.yards_to_go = Some(togo.clamp(1, 99) as u8);
        p.yardline_100 = Some(yardline.clamp(1, 99) as u8);
        p.yards_gained = gained;
        p.first_down = Some(first_down);
        p.touchdown = touchdown;
        p.interception = interception;
        p.fumble_lost = fumble_lost;
        p.scramble = scramble;
        match play_type {
            PlayType::Pass | PlayType::Sack => {
                p.passer = Some(off.qb.clone());
                if play_type == PlayType::Pass {
                    p.air_yards = Some(if interception { rng.gen_range(-2..=30) } else { gained.max(0) });
                }
            }
            PlayType::Rush if scramble => p.rusher = Some(off.qb.clone()),
            PlayType::Rush => p.rusher = Some(format!("{}.RB", off.code)),
            PlayType::Other => {}
        }
        let epa = play_epa(gained, togo, down, touchdown, turnover) + rng.gen_range(-0.3..0.3);
        if cfg.with_epa {
            p.epa = Some(epa);
            p.success = Some(epa > 0.0);
        }
        if touchdown {
            score(board, home_ball, 7);
        }
        p.home_score = Some(board.home);
        p.away_score = Some(board.away);
        board.play_id += 1;
        secs += rng.gen_range(24..=40);
        out.push(p);

        if turnover || touchdown {
            break;
        }
        yardline = (yardline - gained).min(99);
        if first_down {
            down = 1;
            togo = 10i16.min(yardline);
        } else {
            down += 1;
            togo = (togo - gained).max(1);
        }
    }

    if cfg.with_clock {
        for p in &mut out[start..] {
            p.drive_time_secs = Some(secs);
        }
    }
}

fn base_play(game: &GameSpec<'_>, drive: u32, off: &FakeTeam, def: &FakeTeam, play_id: u32, play_type: PlayType) -> Play {
    let mut p = Play::snap(&game.game_id(), play_id, &off.code, &def.code, play_type);
    p.season = game.season;
    p.season_type = game.season_type;
    p.week = Some(game.week);
    p.home_team = game.home.code.clone();
    p.away_team = game.away.code.clone();
    p.drive = Some(drive);
    p
}

fn score(board: &mut Scoreboard, home_ball: bool, points: u16) {
    if home_ball {
        board.home += points;
    } else {
        board.away += points;
    }
}

fn play_epa(gained: i16, togo: i16, down: u8, touchdown: bool, turnover: bool) -> f64 {
    if turnover {
        return -3.5;
    }
    if touchdown {
        return 2.5;
    }
    let need = f64::from(togo) * if down == 1 { 0.4 } else { 0.8 };
    (f64::from(gained) - need) / 8.0
}

fn prob(p: f64) -> f64 {
    p.clamp(0.001, 0.999)
}

fn find_team<'a>(cfg: &'a FakeSeasonConfig, code: &str) -> Option<&'a FakeTeam> {
    cfg.teams.iter().find(|t| t.code == code)
}

// Teams ordered by regular-season wins, then point differential, then code.
fn standings(plays: &[Play], cfg: &FakeSeasonConfig) -> Vec<String> {
    let mut games: BTreeMap<&str, Vec<&Play>> = BTreeMap::new();
    for p in plays.iter().filter(|p| p.season_type == SeasonType::Regular) {
        games.entry(p.game_id.as_str()).or_default().push(p);
    }
    let mut table: BTreeMap<&str, (f64, i32)> = cfg.teams.iter().map(|t| (t.code.as_str(), (0.0, 0))).collect();
    for game in games.values() {
        let Some((h, a)) = final_score(game.iter().copied()) else {
            continue;
        };
        let diff = i32::from(h) - i32::from(a);
        let home_credit = match diff.signum() {
            1 => 1.0,
            -1 => 0.0,
            _ => 0.5,
        };
        if let Some(row) = table.get_mut(game[0].home_team.as_str()) {
            row.0 += home_credit;
            row.1 += diff;
        }
        if let Some(row) = table.get_mut(game[0].away_team.as_str()) {
            row.0 += 1.0 - home_credit;
            row.1 -= diff;
        }
    }
    let mut rows: Vec<(&str, (f64, i32))> = table.into_iter().collect();
    rows.sort_by(|x, y| {
        y.1.0
            .total_cmp(&x.1.0)
            .then(y.1.1.cmp(&x.1.1))
            .then(x.0.cmp(y.0))
    });
    rows.into_iter().map(|(code, _)| code.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_plays() {
        let cfg = FakeSeasonConfig::default();
        assert_eq!(generate_season(&cfg), generate_season(&cfg));
    }

    #[test]
    fn bracket_is_played() {
        let plays = generate_season(&FakeSeasonConfig::default());
        let post_games: std::collections::BTreeSet<&str> = plays
            .iter()
            .filter(|p| p.season_type == SeasonType::Postseason)
            .map(|p| p.game_id.as_str())
            .collect();
        assert_eq!(post_games.len(), 3);
    }
}
