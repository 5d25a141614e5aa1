use gridiron_keys::aggregate::AggregationMode;
use gridiron_keys::availability::Readiness;
use gridiron_keys::config::{EngineConfig, StoreBacking};
use gridiron_keys::data_access::{MemoryPlaySource, team_games};
use gridiron_keys::error::EngineError;
use gridiron_keys::fake_season::{FakeSeasonConfig, generate_season};
use gridiron_keys::game_keys::Key;
use gridiron_keys::pipeline::{BackedSource, KeysEngine, MatchupRequest};
use gridiron_keys::play::{GameType, SeasonType};

fn engine() -> KeysEngine<MemoryPlaySource> {
    let plays = generate_season(&FakeSeasonConfig::default());
    KeysEngine::new(MemoryPlaySource::new(plays), EngineConfig::default()).expect("engine")
}

fn request(a: &str, b: &str, game_type: GameType, mode: AggregationMode) -> MatchupRequest {
    MatchupRequest {
        team_a: a.to_string(),
        team_b: b.to_string(),
        season: 2024,
        game_type,
        mode,
    }
}

#[test]
fn regular_season_matchup_end_to_end() {
    let engine = engine();
    let result = engine
        .predict(&request("KC", "BUF", GameType::Regular, AggregationMode::OppWeighted))
        .expect("prediction");

    assert!(result.win_probability_a > 0.0 && result.win_probability_a < 1.0);
    assert!((result.win_probability_a + result.win_probability_b - 1.0).abs() < 1e-12);
    assert_eq!(result.comparisons.len(), Key::ALL.len());
    assert_eq!(result.coverage[0], "KC: based on 14 of 14 games");
    assert_eq!(result.coverage[1], "BUF: based on 14 of 14 games");
    assert!(!result.adjustments.is_empty());
    let outlook = result.turnover_outlook.expect("turnover outlook");
    assert!(outlook.team_a_expected.is_some());
    assert!(outlook.team_b_expected.is_some());
}

#[test]
fn same_inputs_same_output() {
    let engine = engine();
    let req = request("SF", "PHI", GameType::Regular, AggregationMode::OppWeighted);
    let first = serde_json::to_string(&engine.predict(&req).expect("first")).expect("json");
    let second = serde_json::to_string(&engine.predict(&req).expect("second")).expect("json");
    assert_eq!(first, second);
}

#[test]
fn swapping_teams_mirrors_probability() {
    let engine = engine();
    let ab = engine
        .predict(&request("BAL", "DET", GameType::Regular, AggregationMode::Regular))
        .expect("a vs b");
    let ba = engine
        .predict(&request("DET", "BAL", GameType::Regular, AggregationMode::Regular))
        .expect("b vs a");
    assert!((ab.win_probability_a - ba.win_probability_b).abs() < 1e-12);
}

#[test]
fn postseason_request_uses_playoff_games_only() {
    let plays = generate_season(&FakeSeasonConfig::default());
    let Some(playoff_game) = plays.iter().find(|p| p.season_type == SeasonType::Postseason) else {
        panic!("fake season has a postseason");
    };
    let team = playoff_game.home_team.clone();
    let opponent = playoff_game.away_team.clone();
    let playoff_count = team_games(&plays, &team)
        .iter()
        .filter(|g| g.season_type == SeasonType::Postseason)
        .count();
    assert!(playoff_count >= 1);

    let engine = KeysEngine::new(MemoryPlaySource::new(plays), EngineConfig::default()).expect("engine");
    let result = engine
        .predict(&request(&team, &opponent, GameType::Postseason, AggregationMode::Regular))
        .expect("postseason prediction");
    assert_eq!(
        result.coverage[0],
        format!("{team}: based on {playoff_count} of {playoff_count} games")
    );
}

#[test]
fn team_without_games_is_insufficient_data() {
    let engine = engine();
    let err = engine.predict(&request("KC", "ZZZ", GameType::Regular, AggregationMode::Regular));
    assert!(matches!(err, Err(EngineError::InsufficientData(_))));
}

#[test]
fn missing_season_is_data_unavailable() {
    let engine = engine();
    let mut req = request("KC", "BUF", GameType::Regular, AggregationMode::Regular);
    req.season = 1999;
    assert!(matches!(engine.predict(&req), Err(EngineError::DataUnavailable(_))));
    assert_eq!(
        engine.readiness(1999).expect("report").readiness,
        Readiness::Unavailable
    );
}

#[test]
fn season_without_epa_still_predicts_but_is_degraded() {
    let plays = generate_season(&FakeSeasonConfig {
        with_epa: false,
        ..FakeSeasonConfig::default()
    });
    let engine = KeysEngine::new(MemoryPlaySource::new(plays), EngineConfig::default()).expect("engine");
    assert_eq!(engine.readiness(2024).expect("report").readiness, Readiness::Degraded);
    let result = engine
        .predict(&request("KC", "BUF", GameType::Regular, AggregationMode::OppWeighted))
        .expect("prediction");
    assert!(result.win_probability_a > 0.0 && result.win_probability_a < 1.0);
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let mut cfg = EngineConfig::default();
    cfg.predictor.margin_share = 0.9;
    let built = KeysEngine::new(MemoryPlaySource::default(), cfg);
    assert!(matches!(built, Err(EngineError::InvalidConfig(_))));
}

#[test]
fn qb_report_through_the_engine() {
    let engine = engine();
    let report = engine.qb_production("P.Mahomes", "KC", 2024).expect("qb report");
    assert!(report.plays > 0);
    assert!(report.combined.is_finite());
    assert!(matches!(
        engine.qb_production("Nobody Here", "KC", 2024),
        Err(EngineError::InsufficientData(_))
    ));
}

#[test]
fn ranks_cover_every_team() {
    let engine = engine();
    let ranks = engine
        .ranks(2024, GameType::Regular, AggregationMode::Regular)
        .expect("ranks");
    assert_eq!(ranks.len(), FakeSeasonConfig::default().teams.len());
    for team in &ranks {
        let Some(big) = &team.ranks.big_plays else {
            panic!("{} has no big-play rank", team.team);
        };
        assert!(big.rank >= 1 && big.rank <= ranks.len());
        assert!((0.0..=100.0).contains(&big.percentile));
    }
}

#[test]
fn sqlite_backing_serves_the_same_prediction() {
    let plays = generate_season(&FakeSeasonConfig::default());
    let memory = KeysEngine::new(
        BackedSource::open(&StoreBacking::Memory, plays.clone()).expect("memory"),
        EngineConfig::default(),
    )
    .expect("memory engine");

    let dir = std::env::temp_dir().join(format!("gridiron_keys_pipeline_{}", std::process::id()));
    let path = dir.join("plays.sqlite");
    let _ = std::fs::remove_file(&path);
    let sqlite = KeysEngine::new(
        BackedSource::open(&StoreBacking::Sqlite { path: path.clone() }, plays).expect("sqlite"),
        EngineConfig::default(),
    )
    .expect("sqlite engine");

    let req = request("KC", "CIN", GameType::Regular, AggregationMode::OppWeighted);
    let a = memory.predict(&req).expect("memory prediction");
    let b = sqlite.predict(&req).expect("sqlite prediction");
    // The store returns plays in id order, so sums may differ in the last bits.
    assert!((a.win_probability_a - b.win_probability_a).abs() < 1e-9);
    assert_eq!((a.keys_won_a, a.keys_won_b), (b.keys_won_a, b.keys_won_b));

    drop(sqlite);
    let _ = std::fs::remove_dir_all(&dir);
}
