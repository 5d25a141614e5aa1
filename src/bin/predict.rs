use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use gridiron_keys::aggregate::AggregationMode;
use gridiron_keys::config::{self, StoreBacking};
use gridiron_keys::fake_season::{FakeSeasonConfig, generate_season};
use gridiron_keys::logging;
use gridiron_keys::pipeline::{BackedSource, KeysEngine, MatchupRequest};
use gridiron_keys::play::GameType;
use gridiron_keys::score_model;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init_logging();

    let mut cfg = config::resolve_config(parse_path_arg("--config").as_deref())?;
    if let Some(path) = parse_path_arg("--score-model") {
        cfg.score_model = score_model::load_model(&path)?;
    }
    if has_flag("--strict") {
        cfg.predictor.strict_keys = true;
    }

    let team_a = parse_str_arg("--team-a").context("missing --team-a")?;
    let team_b = parse_str_arg("--team-b").context("missing --team-b")?;
    let demo = has_flag("--demo");
    let season = parse_str_arg("--season")
        .or_else(|| std::env::var("GRIDIRON_SEASON").ok())
        .and_then(|raw| raw.trim().parse::<u16>().ok())
        .unwrap_or(FakeSeasonConfig::default().season);
    let game_type = match parse_str_arg("--games") {
        Some(raw) => GameType::parse(&raw).ok_or_else(|| anyhow!("unknown --games value {raw}"))?,
        None => GameType::Postseason,
    };
    let mode = match parse_str_arg("--mode") {
        Some(raw) => AggregationMode::parse(&raw).ok_or_else(|| anyhow!("unknown --mode value {raw}"))?,
        None => AggregationMode::OppWeighted,
    };

    if let Some(db) = parse_path_arg("--db") {
        cfg.data.backing = StoreBacking::Sqlite { path: db };
    }
    let seed = if demo {
        generate_season(&FakeSeasonConfig {
            season,
            ..FakeSeasonConfig::default()
        })
    } else {
        if matches!(cfg.data.backing, StoreBacking::Memory) {
            return Err(anyhow!("no play store configured: pass --db <path> or --demo"));
        }
        Vec::new()
    };
    let source = BackedSource::open(&cfg.data.backing, seed)?;
    let engine = KeysEngine::new(source, cfg)?;

    let request = MatchupRequest {
        team_a,
        team_b,
        season,
        game_type,
        mode,
    };
    let result = engine
        .predict(&request)
        .with_context(|| format!("predict {} vs {}", request.team_a, request.team_b))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("serialize matchup result")?
    );
    Ok(())
}

fn parse_str_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}="))
            && !raw.trim().is_empty()
        {
            return Some(raw.trim().to_string());
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    parse_str_arg(name).map(PathBuf::from)
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}
