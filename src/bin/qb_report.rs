use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use gridiron_keys::config::{self, StoreBacking};
use gridiron_keys::fake_season::{FakeSeasonConfig, generate_season};
use gridiron_keys::logging;
use gridiron_keys::pipeline::{BackedSource, KeysEngine};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init_logging();

    let mut cfg = config::resolve_config(parse_path_arg("--config").as_deref())?;
    let qb = parse_str_arg("--qb").context("missing --qb")?;
    let team = parse_str_arg("--team").context("missing --team")?;
    let season = parse_str_arg("--season")
        .or_else(|| std::env::var("GRIDIRON_SEASON").ok())
        .and_then(|raw| raw.trim().parse::<u16>().ok())
        .unwrap_or(FakeSeasonConfig::default().season);

    if let Some(db) = parse_path_arg("--db") {
        cfg.data.backing = StoreBacking::Sqlite { path: db };
    }
    let seed = if has_flag("--demo") {
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
    let engine = KeysEngine::new(BackedSource::open(&cfg.data.backing, seed)?, cfg)?;

    let report = engine
        .qb_production(&qb, &team, season)
        .with_context(|| format!("score {qb} ({team}) {season}"))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serialize qb report")?
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
