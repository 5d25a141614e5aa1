use std::collections::BTreeMap;

use gridiron_keys::config::EngineConfig;
use gridiron_keys::defense_strength::{DefenseStrength, LeagueDefenses, StrengthMethod};
use gridiron_keys::error::EngineError;
use gridiron_keys::play::{Play, PlayType};
use gridiron_keys::qb_production::{QbGameLine, score_qb};

fn league() -> LeagueDefenses {
    let mut teams = BTreeMap::new();
    for (team, z) in [("HARD", 1.5), ("SOFT", -1.0)] {
        teams.insert(
            team.to_string(),
            DefenseStrength {
                team: team.to_string(),
                difficulty_z: z,
                schedule_z: 0.0,
                record_z: 0.0,
                composite: z,
                value_allowed: None,
                win_pct: None,
                games: 17,
                snaps: 1000,
            },
        );
    }
    LeagueDefenses {
        season: Some(2024),
        method: StrengthMethod::Epa,
        teams,
    }
}

// Same drive of QB plays against whichever defense is named.
fn drive_against(defense: &str) -> Vec<Play> {
    let game = format!("2024_03_{defense}_KC");
    let mut out = Vec::new();

    let mut first = Play::snap(&game, 1, "KC", defense, PlayType::Pass);
    first.down = Some(1);
    first.yards_to_go = Some(10);
    first.yards_gained = 7;
    first.passer = Some("P.Mahomes".to_string());
    first.epa = Some(0.4);
    out.push(first);

    let mut third = Play::snap(&game, 2, "KC", defense, PlayType::Pass);
    third.down = Some(3);
    third.yards_to_go = Some(3);
    third.yards_gained = 5;
    third.first_down = Some(true);
    third.passer = Some("P.Mahomes".to_string());
    third.epa = Some(1.1);
    out.push(third);

    let mut scramble = Play::snap(&game, 3, "KC", defense, PlayType::Rush);
    scramble.down = Some(2);
    scramble.yards_to_go = Some(8);
    scramble.yards_gained = 12;
    scramble.scramble = true;
    scramble.rusher = Some("P.Mahomes".to_string());
    scramble.epa = Some(0.9);
    out.push(scramble);

    let mut red_zone = Play::snap(&game, 4, "KC", defense, PlayType::Pass);
    red_zone.down = Some(1);
    red_zone.yards_to_go = Some(10);
    red_zone.yardline_100 = Some(12);
    red_zone.yards_gained = 0;
    red_zone.passer = Some("P.Mahomes".to_string());
    red_zone.epa = Some(-0.6);
    out.push(red_zone);

    let mut backup = Play::snap(&game, 5, "KC", defense, PlayType::Pass);
    backup.passer = Some("C.Wentz".to_string());
    backup.yards_gained = 30;
    out.push(backup);

    let mut handoff = Play::snap(&game, 6, "KC", defense, PlayType::Rush);
    handoff.rusher = Some("I.Pacheco".to_string());
    handoff.yards_gained = 4;
    out.push(handoff);

    out
}

#[test]
fn harder_defense_lifts_identical_production() {
    let cfg = EngineConfig::default();
    let defenses = league();
    let hard = score_qb("Patrick Mahomes", "KC", &drive_against("HARD"), &defenses, &cfg)
        .expect("vs hard");
    let soft = score_qb("Patrick Mahomes", "KC", &drive_against("SOFT"), &defenses, &cfg)
        .expect("vs soft");

    assert_eq!(hard.plays, 4);
    assert_eq!(soft.plays, 4);
    for (h, s) in [
        (&hard.drive_sustainability, &soft.drive_sustainability),
        (&hard.high_leverage, &soft.high_leverage),
        (&hard.off_script, &soft.off_script),
    ] {
        assert_eq!(h.raw, s.raw);
        assert!(h.adjusted.unwrap() > s.adjusted.unwrap());
    }
    assert!(hard.combined > soft.combined);
    assert!(hard.mean_opponent_difficulty > soft.mean_opponent_difficulty);
}

#[test]
fn components_measure_what_they_name() {
    let cfg = EngineConfig::default();
    let result = score_qb("P.Mahomes", "KC", &drive_against("SOFT"), &league(), &cfg)
        .expect("score");

    // Every snap kept the drive alive: no giveaway, no lost yardage.
    assert_eq!(result.drive_sustainability.plays, 4);
    assert_eq!(result.drive_sustainability.raw, Some(1.0));
    // The third down converted, the red-zone throw went backwards in EPA.
    assert_eq!(result.high_leverage.plays, 2);
    assert_eq!(result.high_leverage.raw, Some(0.5));
    assert_eq!(result.off_script.plays, 1);
    assert_eq!(result.off_script.raw, Some(0.9));
    assert_eq!(result.value_metric, StrengthMethod::Epa);
}

#[test]
fn missing_off_script_renormalises_the_blend() {
    let cfg = EngineConfig::default();
    let plays: Vec<Play> = drive_against("SOFT")
        .into_iter()
        .filter(|p| !p.scramble)
        .collect();
    let result = score_qb("P.Mahomes", "KC", &plays, &league(), &cfg).expect("score");

    assert_eq!(result.off_script.adjusted, None);
    let w = &cfg.qb.weights;
    let expected = (w.drive_sustainability * result.drive_sustainability.adjusted.unwrap()
        + w.high_leverage * result.high_leverage.adjusted.unwrap())
        / (w.drive_sustainability + w.high_leverage);
    assert!((result.combined - expected).abs() < 1e-12);
}

#[test]
fn qb_without_plays_is_insufficient_data() {
    let cfg = EngineConfig::default();
    let err = score_qb("J.Allen", "KC", &drive_against("SOFT"), &league(), &cfg);
    assert!(matches!(err, Err(EngineError::InsufficientData(_))));

    let empty = score_qb("P.Mahomes", "KC", &[], &league(), &cfg);
    assert!(matches!(empty, Err(EngineError::InsufficientData(_))));
}

#[test]
fn per_game_lines_add_up_to_the_season() {
    let cfg = EngineConfig::default();
    let mut plays = drive_against("HARD");
    plays.extend(drive_against("SOFT"));
    let mut pick = Play::snap("2024_03_SOFT_KC", 7, "KC", "SOFT", PlayType::Pass);
    pick.passer = Some("P.Mahomes".to_string());
    pick.interception = true;
    pick.air_yards = Some(25);
    plays.push(pick);

    let result = score_qb("Patrick Mahomes", "KC", &plays, &league(), &cfg).expect("score");
    assert_eq!(result.games.len(), 2);
    let hard = &result.games[0];
    let soft = &result.games[1];
    assert_eq!((hard.opponent.as_str(), hard.opponent_difficulty), ("HARD", 1.5));
    assert_eq!((soft.opponent.as_str(), soft.opponent_difficulty), ("SOFT", -1.0));
    assert_eq!((hard.plays, soft.plays), (4, 5));
    assert_eq!(soft.turnovers.interceptions_qb_fault, 1);
    assert_eq!(hard.turnovers, Default::default());

    let sum = |f: fn(&QbGameLine) -> usize| -> usize {
        result.games.iter().map(f).sum()
    };
    assert_eq!(sum(|g| g.plays), result.plays);
    assert_eq!(sum(|g| g.drive_plays), result.drive_sustainability.plays);
    assert_eq!(sum(|g| g.leverage_plays), result.high_leverage.plays);
    assert_eq!(sum(|g| g.off_script_plays), result.off_script.plays);

    let sustained = sum(|g| g.drives_sustained) as f64 / result.drive_sustainability.plays as f64;
    assert!((sustained - result.drive_sustainability.raw.unwrap()).abs() < 1e-12);
    let ints: u32 = result.games.iter().map(|g| g.turnovers.interceptions_qb_fault).sum();
    assert_eq!(ints, result.turnovers.interceptions_qb_fault);
    let weighted: f64 = result.games.iter().map(|g| g.turnovers.weighted).sum();
    assert!((weighted - result.turnovers.weighted).abs() < 1e-12);
}

#[test]
fn teammate_sharing_a_first_name_is_not_credited() {
    let cfg = EngineConfig::default();
    let mut plays = drive_against("SOFT");
    for p in plays.iter_mut() {
        for name in [&mut p.passer, &mut p.rusher] {
            if name.as_deref() == Some("P.Mahomes") {
                *name = Some("Josh Allen".to_string());
            }
        }
    }
    let mut carry = Play::snap("2024_03_SOFT_KC", 8, "KC", "SOFT", PlayType::Rush);
    carry.rusher = Some("Josh Jacobs".to_string());
    carry.yards_gained = 3;
    plays.push(carry);

    let result = score_qb("Josh Allen", "KC", &plays, &league(), &cfg).expect("score");
    assert_eq!(result.plays, 4);
}
