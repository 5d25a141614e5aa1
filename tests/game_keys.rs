use gridiron_keys::config::KeyConfig;
use gridiron_keys::error::DegradationReason;
use gridiron_keys::game_keys::{Key, KeyValue, TopSource, extract_game_keys, extract_season_games};
use gridiron_keys::play::{Play, PlayType};

fn snap(play_id: u32, offense: &str, play_type: PlayType) -> Play {
    let defense = if offense == "KC" { "BUF" } else { "KC" };
    let mut p = Play::snap("2024_01_BUF_KC", play_id, offense, defense, play_type);
    p.home_team = "KC".to_string();
    p.away_team = "BUF".to_string();
    p
}

fn on_drive(mut p: Play, drive: u32, yardline: u8) -> Play {
    p.drive = Some(drive);
    p.yardline_100 = Some(yardline);
    p
}

#[test]
fn zero_third_down_attempts_is_the_no_attempts_sentinel() {
    let mut first = snap(1, "KC", PlayType::Pass);
    first.down = Some(1);
    first.yards_to_go = Some(10);
    first.yards_gained = 12;
    let mut second = snap(2, "KC", PlayType::Rush);
    second.down = Some(2);
    second.yards_to_go = Some(4);

    let keys = extract_game_keys("2024_01_BUF_KC", "KC", &[first, second], &KeyConfig::default());
    assert!(keys.usable);
    assert_eq!(keys.keys.third_down, KeyValue::NoAttempts);
    assert_eq!(keys.third_down_attempts, 0);
    assert_ne!(keys.keys.third_down, KeyValue::Value(0.0));
    assert!(
        keys.degradations
            .iter()
            .any(|d| d.key == Some(Key::ThirdDown) && d.reason == DegradationReason::NoAttempts)
    );
}

#[test]
fn third_down_conversions_count_first_downs_touchdowns_and_sacks_as_attempts() {
    let mut converted = snap(1, "KC", PlayType::Pass);
    converted.down = Some(3);
    converted.yards_to_go = Some(6);
    converted.yards_gained = 9;
    converted.first_down = Some(true);

    let mut stopped = snap(2, "KC", PlayType::Rush);
    stopped.down = Some(3);
    stopped.yards_to_go = Some(5);
    stopped.yards_gained = 1;
    stopped.first_down = Some(false);

    let mut scored = snap(3, "KC", PlayType::Pass);
    scored.down = Some(3);
    scored.yards_to_go = Some(8);
    scored.yards_gained = 8;
    scored.touchdown = true;

    let mut sacked = snap(4, "KC", PlayType::Sack);
    sacked.down = Some(3);
    sacked.yards_to_go = Some(6);
    sacked.yards_gained = -7;

    let mut flagged = snap(5, "KC", PlayType::Pass);
    flagged.down = Some(3);
    flagged.yards_to_go = Some(6);
    flagged.no_play = true;

    let keys = extract_game_keys(
        "2024_01_BUF_KC",
        "KC",
        &[converted, stopped, scored, sacked, flagged],
        &KeyConfig::default(),
    );
    assert_eq!(keys.third_down_attempts, 4);
    assert_eq!(keys.third_down_conversions, 2);
    assert_eq!(keys.keys.third_down, KeyValue::Value(0.5));
}

#[test]
fn big_plays_use_configured_thresholds_and_skip_nullified_snaps() {
    let mut deep = snap(1, "KC", PlayType::Pass);
    deep.yards_gained = 15;
    let mut short = snap(2, "KC", PlayType::Pass);
    short.yards_gained = 14;
    let mut run = snap(3, "KC", PlayType::Rush);
    run.yards_gained = 10;
    let mut wiped = snap(4, "KC", PlayType::Pass);
    wiped.yards_gained = 40;
    wiped.no_play = true;
    let mut opponent = snap(5, "BUF", PlayType::Pass);
    opponent.yards_gained = 50;
    let plays = vec![deep, short, run, wiped, opponent];

    let default = extract_game_keys("2024_01_BUF_KC", "KC", &plays, &KeyConfig::default());
    assert_eq!(default.big_plays, 2);
    assert_eq!(default.keys.big_plays, KeyValue::Value(2.0));

    let strict = KeyConfig {
        big_play_pass_yards: 20,
        big_play_rush_yards: 12,
        ..KeyConfig::default()
    };
    let tight = extract_game_keys("2024_01_BUF_KC", "KC", &plays, &strict);
    assert_eq!(tight.big_plays, 0);
}

#[test]
fn turnover_differential_is_takeaways_minus_giveaways() {
    let mut thrown = snap(1, "KC", PlayType::Pass);
    thrown.interception = true;
    let mut picked = snap(2, "BUF", PlayType::Pass);
    picked.interception = true;
    let mut stripped = snap(3, "BUF", PlayType::Rush);
    stripped.fumble_lost = true;
    let mut overturned = snap(4, "BUF", PlayType::Pass);
    overturned.interception = true;
    overturned.no_play = true;

    let keys = extract_game_keys(
        "2024_01_BUF_KC",
        "KC",
        &[thrown, picked, stripped, overturned],
        &KeyConfig::default(),
    );
    assert_eq!(keys.giveaways, 1);
    assert_eq!(keys.takeaways, 2);
    assert_eq!(keys.keys.turnovers, KeyValue::Value(1.0));

    let mirror = extract_game_keys(
        "2024_01_BUF_KC",
        "BUF",
        &[
            {
                let mut p = snap(1, "KC", PlayType::Pass);
                p.interception = true;
                p
            },
        ],
        &KeyConfig::default(),
    );
    assert_eq!(mirror.keys.turnovers, KeyValue::Value(1.0));
}

#[test]
fn time_of_possession_uses_drive_clock_once_per_drive() {
    let mut a = on_drive(snap(1, "KC", PlayType::Rush), 1, 75);
    a.drive_time_secs = Some(300);
    let mut b = on_drive(snap(2, "KC", PlayType::Pass), 1, 70);
    b.drive_time_secs = Some(300);
    let mut c = on_drive(snap(3, "BUF", PlayType::Pass), 2, 80);
    c.drive_time_secs = Some(100);

    let keys = extract_game_keys("2024_01_BUF_KC", "KC", &[a, b, c], &KeyConfig::default());
    assert_eq!(keys.top_source, TopSource::Clock);
    assert_eq!(keys.keys.top, KeyValue::Value(0.75));
}

#[test]
fn missing_clock_falls_back_to_possession_share_and_says_so() {
    let a = on_drive(snap(1, "KC", PlayType::Rush), 1, 75);
    let b = on_drive(snap(2, "BUF", PlayType::Pass), 2, 80);
    let c = on_drive(snap(3, "KC", PlayType::Pass), 3, 70);

    let keys = extract_game_keys("2024_01_BUF_KC", "KC", &[a, b, c], &KeyConfig::default());
    assert_eq!(keys.top_source, TopSource::PossessionProxy);
    let Some(share) = keys.keys.top.value() else {
        panic!("expected a possession share");
    };
    assert!((share - 2.0 / 3.0).abs() < 1e-12);
    assert!(
        keys.degradations
            .iter()
            .any(|d| d.reason == DegradationReason::PossessionProxy)
    );
}

#[test]
fn partial_drive_clock_is_not_trusted() {
    let mut plays = Vec::new();
    for (id, offense, drive) in [(1, "KC", 1), (2, "BUF", 2), (3, "KC", 3), (4, "BUF", 4)] {
        let mut p = on_drive(snap(id, offense, PlayType::Pass), drive, 75);
        if offense == "KC" {
            p.drive_time_secs = Some(120);
        }
        plays.push(p);
    }

    let keys = extract_game_keys("2024_01_BUF_KC", "KC", &plays, &KeyConfig::default());
    assert_eq!(keys.top_source, TopSource::PossessionProxy);
    assert_eq!(keys.keys.top, KeyValue::Value(0.5));
    assert!(
        keys.degradations
            .iter()
            .any(|d| d.reason == DegradationReason::PossessionProxy && d.key == Some(Key::TimeOfPossession))
    );
}

#[test]
fn red_zone_rate_counts_trips_not_plays() {
    let mut d1a = on_drive(snap(1, "KC", PlayType::Pass), 1, 30);
    d1a.yards_gained = 15;
    let mut d1b = on_drive(snap(2, "KC", PlayType::Rush), 1, 15);
    d1b.yards_gained = 15;
    d1b.touchdown = true;
    let d2 = on_drive(snap(3, "BUF", PlayType::Pass), 2, 75);
    let mut d3a = on_drive(snap(4, "KC", PlayType::Rush), 3, 18);
    d3a.yards_gained = 2;
    let d3b = on_drive(snap(5, "KC", PlayType::Pass), 3, 16);
    let d4 = on_drive(snap(6, "BUF", PlayType::Rush), 4, 70);
    let mut d5 = on_drive(snap(7, "KC", PlayType::Pass), 5, 60);
    d5.yards_gained = 60;
    d5.touchdown = true;

    let keys = extract_game_keys(
        "2024_01_BUF_KC",
        "KC",
        &[d1a, d1b, d2, d3a, d3b, d4, d5],
        &KeyConfig::default(),
    );
    assert_eq!(keys.red_zone_trips, 2);
    assert_eq!(keys.red_zone_tds, 1);
    assert_eq!(keys.keys.red_zone, KeyValue::Value(0.5));
}

#[test]
fn pick_six_inside_the_twenty_is_not_a_red_zone_touchdown() {
    let mut p = on_drive(snap(1, "KC", PlayType::Pass), 1, 12);
    p.interception = true;
    p.touchdown = true;
    let keys = extract_game_keys("2024_01_BUF_KC", "KC", &[p], &KeyConfig::default());
    assert_eq!(keys.red_zone_trips, 1);
    assert_eq!(keys.keys.red_zone, KeyValue::Value(0.0));
}

#[test]
fn game_without_team_plays_is_unusable_not_zero() {
    let other = snap(1, "KC", PlayType::Pass);
    let keys = extract_game_keys("2024_01_BUF_KC", "DAL", &[other], &KeyConfig::default());
    assert!(!keys.usable);
    for key in Key::ALL {
        assert_eq!(*keys.keys.get(key), KeyValue::Unusable);
    }
    assert!(
        keys.degradations
            .iter()
            .any(|d| d.reason == DegradationReason::UnusableGame)
    );
}

#[test]
fn season_extraction_groups_games_in_id_order() {
    let mut late = snap(1, "KC", PlayType::Pass);
    late.game_id = "2024_05_KC_DEN".to_string();
    late.home_team = "DEN".to_string();
    late.away_team = "KC".to_string();
    late.defense = "DEN".to_string();
    let early = snap(1, "KC", PlayType::Rush);
    let unrelated = {
        let mut p = Play::snap("2024_03_NYJ_MIA", 1, "MIA", "NYJ", PlayType::Pass);
        p.yards_gained = 30;
        p
    };

    let games = extract_season_games(&[late, early, unrelated], "KC", &KeyConfig::default());
    let ids: Vec<&str> = games.iter().map(|g| g.game_id.as_str()).collect();
    assert_eq!(ids, vec!["2024_01_BUF_KC", "2024_05_KC_DEN"]);
    assert_eq!(games[1].opponent.as_deref(), Some("DEN"));
}
