use gridiron_keys::config::EngineConfig;
use gridiron_keys::defense_strength::{RegularSeasonPlays, StrengthMethod, estimate_defenses, success_of};
use gridiron_keys::fake_season::{FakeSeasonConfig, generate_season};
use gridiron_keys::play::{Play, PlayType, SeasonType};

fn series(game: &str, offense: &str, defense: &str, epa: Option<f64>, gained: i16) -> Vec<Play> {
    (1..=6)
        .map(|i| {
            let mut p = Play::snap(game, i, offense, defense, PlayType::Pass);
            p.down = Some(1);
            p.yards_to_go = Some(10);
            p.yardline_100 = Some(60);
            p.yards_gained = gained;
            p.epa = epa;
            p
        })
        .collect()
}

#[test]
fn postseason_plays_are_dropped_on_construction() {
    let mut plays = series("g1", "KC", "BUF", Some(0.1), 5);
    let mut playoff = series("g2", "KC", "BUF", Some(3.0), 40);
    for p in playoff.iter_mut() {
        p.season_type = SeasonType::Postseason;
    }
    plays.extend(playoff);

    let regular = RegularSeasonPlays::new(plays);
    assert_eq!(regular.plays().len(), 6);
    assert!(
        regular
            .plays()
            .iter()
            .all(|p| p.season_type == SeasonType::Regular)
    );
}

#[test]
fn postseason_never_moves_defensive_strength() {
    let season = generate_season(&FakeSeasonConfig::default());
    assert!(season.iter().any(|p| p.season_type == SeasonType::Postseason));
    let regular_only: Vec<Play> = season
        .iter()
        .filter(|p| p.season_type == SeasonType::Regular)
        .cloned()
        .collect();

    let cfg = EngineConfig::default();
    let with_post = estimate_defenses(&RegularSeasonPlays::new(season), &cfg);
    let without_post = estimate_defenses(&RegularSeasonPlays::new(regular_only), &cfg);
    assert_eq!(with_post.teams, without_post.teams);
}

#[test]
fn stingier_defense_is_harder() {
    let mut plays = Vec::new();
    plays.extend(series("g1", "AAA", "WALL", Some(-0.5), 1));
    plays.extend(series("g2", "BBB", "MID", Some(0.0), 4));
    plays.extend(series("g3", "CCC", "SIEVE", Some(0.5), 9));

    let defenses = estimate_defenses(&RegularSeasonPlays::new(plays), &EngineConfig::default());
    assert_eq!(defenses.method, StrengthMethod::Epa);
    let wall = defenses.difficulty("WALL");
    let mid = defenses.difficulty("MID");
    let sieve = defenses.difficulty("SIEVE");
    assert!(wall > mid && mid > sieve, "{wall} {mid} {sieve}");
    assert!(defenses.composite("WALL") > defenses.composite("SIEVE"));
    assert_eq!(defenses.get("WALL").map(|d| d.snaps), Some(6));
}

#[test]
fn unknown_team_is_league_average() {
    let defenses = estimate_defenses(
        &RegularSeasonPlays::new(series("g1", "KC", "BUF", Some(0.2), 5)),
        &EngineConfig::default(),
    );
    assert_eq!(defenses.composite("NOPE"), 0.0);
    assert_eq!(defenses.difficulty("NOPE"), 0.0);
    assert_eq!(defenses.win_pct("NOPE"), None);
}

#[test]
fn success_rate_stands_in_when_epa_is_missing() {
    let season = generate_season(&FakeSeasonConfig {
        with_epa: false,
        ..FakeSeasonConfig::default()
    });
    let defenses = estimate_defenses(&RegularSeasonPlays::new(season), &EngineConfig::default());
    assert_eq!(defenses.method, StrengthMethod::SuccessRate);
    assert!(
        defenses
            .teams
            .values()
            .all(|d| d.value_allowed.is_some_and(|v| (0.0..=1.0).contains(&v)))
    );
    assert!(defenses.teams.values().any(|d| d.difficulty_z != 0.0));
}

#[test]
fn success_follows_down_and_distance_without_feed_values() {
    let mut first = Play::snap("g", 1, "KC", "BUF", PlayType::Rush);
    first.down = Some(1);
    first.yards_to_go = Some(10);
    first.yards_gained = 4;
    assert_eq!(success_of(&first), Some(true));

    let mut second = first.clone();
    second.down = Some(2);
    assert_eq!(success_of(&second), Some(false));

    let mut third = first.clone();
    third.down = Some(3);
    third.yards_gained = 10;
    assert_eq!(success_of(&third), Some(true));

    let mut picked = third.clone();
    picked.interception = true;
    assert_eq!(success_of(&picked), Some(false));

    let unknown = Play::snap("g", 2, "KC", "BUF", PlayType::Pass);
    assert_eq!(success_of(&unknown), None);
}

#[test]
fn win_pct_comes_from_final_scores() {
    let season = generate_season(&FakeSeasonConfig::default());
    let defenses = estimate_defenses(&RegularSeasonPlays::new(season), &EngineConfig::default());
    for d in defenses.teams.values() {
        let pct = d.win_pct.expect("every fake team has scored games");
        assert!((0.0..=1.0).contains(&pct));
        assert!(d.games > 0);
    }
}

#[test]
fn win_record_feeds_the_composite() {
    let season = generate_season(&FakeSeasonConfig::default());
    let cfg = EngineConfig::default();
    let s = cfg.strength;
    let defenses = estimate_defenses(&RegularSeasonPlays::new(season), &cfg);
    assert!(defenses.teams.values().any(|d| d.record_z != 0.0));

    let total = s.efficiency_weight + s.schedule_weight + s.record_weight;
    for d in defenses.teams.values() {
        let expected = (s.efficiency_weight * d.difficulty_z
            + s.schedule_weight * d.schedule_z
            + s.record_weight * d.record_z)
            / total;
        assert!((d.composite - expected).abs() < 1e-12, "{}", d.team);
    }

    let mut by_record: Vec<(f64, f64)> = defenses
        .teams
        .values()
        .filter_map(|d| d.win_pct.map(|pct| (pct, d.record_z)))
        .collect();
    by_record.sort_by(|a, b| a.0.total_cmp(&b.0));
    assert!(by_record.windows(2).all(|w| w[0].1 <= w[1].1 + 1e-12));
}
