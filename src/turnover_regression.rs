use serde::Serialize;

use crate::config::TurnoverConfig;
use crate::game_keys::GameKeySet;
use crate::play::SeasonType;

/// Expected giveaways per game, pulled toward the regular-season rate so a
/// short postseason run does not dominate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnoverOutlook {
    pub team_a_expected: Option<f64>,
    pub team_b_expected: Option<f64>,
    /// Positive when team A is expected to give the ball away less.
    pub edge_a: Option<f64>,
}

impl TurnoverOutlook {
    pub fn new(team_a_expected: Option<f64>, team_b_expected: Option<f64>) -> Self {
        let edge_a = match (team_a_expected, team_b_expected) {
            (Some(a), Some(b)) => Some(b - a),
            _ => None,
        };
        Self {
            team_a_expected,
            team_b_expected,
            edge_a,
        }
    }
}

pub fn giveaways_per_game(games: &[GameKeySet], season_type: SeasonType) -> Option<f64> {
    let (sum, n) = games
        .iter()
        .filter(|g| g.usable && g.season_type == Some(season_type))
        .fold((0u32, 0u32), |(s, n), g| (s + g.giveaways, n + 1));
    (n > 0).then(|| f64::from(sum) / f64::from(n))
}

pub fn expected_turnovers(season_rate: Option<f64>, post_rate: Option<f64>, cfg: &TurnoverConfig) -> Option<f64> {
    let raw = match (season_rate, post_rate) {
        (Some(s), Some(p)) => {
            (cfg.postseason_weight * p + cfg.season_weight * s) / (cfg.postseason_weight + cfg.season_weight)
        }
        (Some(s), None) => s,
        (None, Some(p)) => p,
        (None, None) => return None,
    };
    Some(raw.clamp(cfg.min_expected, cfg.max_expected))
}

pub fn team_expected_turnovers(games: &[GameKeySet], cfg: &TurnoverConfig) -> Option<f64> {
    expected_turnovers(
        giveaways_per_game(games, SeasonType::Regular),
        giveaways_per_game(games, SeasonType::Postseason),
        cfg,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_and_clamp() {
        let cfg = TurnoverConfig::default();
        let v = expected_turnovers(Some(1.0), Some(2.0), &cfg).expect("value");
        assert!((v - 1.55).abs() < 1e-12);
        assert_eq!(expected_turnovers(Some(0.0), None, &cfg), Some(0.4));
        assert_eq!(expected_turnovers(None, Some(5.0), &cfg), Some(2.2));
        assert_eq!(expected_turnovers(None, None, &cfg), None);
    }

    #[test]
    fn edge_favours_the_careful_team() {
        let outlook = TurnoverOutlook::new(Some(0.8), Some(1.6));
        assert!(outlook.edge_a.expect("edge") > 0.0);
    }
}
