use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use tracing::{info, warn};

use gridiron_keys::availability::assess_readiness;
use gridiron_keys::config;
use gridiron_keys::fake_season::{FakeSeasonConfig, generate_season};
use gridiron_keys::logging;
use gridiron_keys::play::{Play, PlayType, SeasonType};
use gridiron_keys::play_store;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init_logging();

    let db_path = parse_path_arg("--db").unwrap_or_else(config::default_db_path);
    let plays = if has_flag("--demo") {
        let seed = parse_str_arg("--seed")
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(2024);
        generate_season(&FakeSeasonConfig {
            seed,
            ..FakeSeasonConfig::default()
        })
    } else {
        let input = parse_path_arg("--input").context("missing --input <plays.json|plays.parquet>")?;
        read_plays(&input)?
    };
    if plays.is_empty() {
        return Err(anyhow!("no plays decoded"));
    }

    let mut conn = play_store::open_db(&db_path)?;
    let written = play_store::upsert_plays(&mut conn, &plays)?;

    println!("Play ingest complete");
    println!("DB: {}", db_path.display());
    println!("Plays upserted: {written}");
    let seasons: BTreeSet<u16> = plays.iter().map(|p| p.season).collect();
    for season in seasons {
        let report = assess_readiness(season, &plays);
        println!(
            "season {}: plays={} readiness={:?}",
            season, report.plays, report.readiness
        );
        for note in report.notes.iter().take(6) {
            println!("   - {note}");
        }
    }
    Ok(())
}

fn read_plays(path: &Path) -> Result<Vec<Play>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("parquet") => read_parquet(path),
        Some("json") => {
            let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
        }
        other => Err(anyhow!("unsupported input extension {other:?}")),
    }
}

// nflverse play-by-play column names.
fn read_parquet(path: &Path) -> Result<Vec<Play>> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(file).context("open parquet reader plays")?;
    let iter = reader.get_row_iter(None).context("iterate play rows")?;

    let mut out = Vec::new();
    let mut skipped = 0usize;
    for row in iter {
        let Ok(row) = row else {
            skipped += 1;
            continue;
        };
        let cols: HashMap<&str, &Field> = row
            .get_column_iter()
            .map(|(name, field)| (name.as_str(), field))
            .collect();
        match decode_row(&cols) {
            Some(play) => out.push(play),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(skipped, "rows without offense/defense or ids were skipped");
    }
    info!(plays = out.len(), "decoded parquet plays");
    Ok(out)
}

fn decode_row(cols: &HashMap<&str, &Field>) -> Option<Play> {
    let text = |name: &str| cols.get(name).and_then(|f| field_str(f));
    let num = |name: &str| cols.get(name).and_then(|f| field_f64(f));
    let flag = |name: &str| num(name).is_some_and(|v| v >= 0.5);

    let game_id = text("game_id")?;
    let offense = text("posteam")?;
    let defense = text("defteam")?;
    let raw_type = text("play_type").unwrap_or_default();
    let no_play = raw_type == "no_play";
    let play_type = if flag("sack") {
        PlayType::Sack
    } else {
        PlayType::parse(&raw_type)
    };

    Some(Play {
        game_id,
        play_id: num("play_id")? as u32,
        season: num("season")? as u16,
        season_type: text("season_type")
            .and_then(|s| SeasonType::parse(&s))
            .unwrap_or(SeasonType::Regular),
        week: num("week").map(|v| v as u8),
        home_team: text("home_team")?,
        away_team: text("away_team")?,
        offense,
        defense,
        drive: num("drive").map(|v| v as u32),
        drive_time_secs: text("drive_time_of_possession").and_then(|s| parse_clock(&s)),
        down: num("down").map(|v| v as u8),
        yards_to_go: num("ydstogo").map(|v| v as u8),
        yardline_100: num("yardline_100").map(|v| v as u8),
        play_type,
        yards_gained: num("yards_gained").map_or(0, |v| v as i16),
        first_down: num("first_down").map(|v| v >= 0.5),
        touchdown: flag("touchdown"),
        interception: flag("interception"),
        fumble_lost: flag("fumble_lost"),
        no_play,
        scramble: flag("qb_scramble"),
        epa: num("epa").filter(|v| v.is_finite()),
        success: num("success").map(|v| v >= 0.5),
        passer: text("passer_player_name"),
        rusher: text("rusher_player_name"),
        air_yards: num("air_yards").map(|v| v as i16),
        home_score: num("total_home_score").map(|v| v as u16),
        away_score: num("total_away_score").map(|v| v as u16),
    })
}

fn field_str(f: &Field) -> Option<String> {
    match f {
        Field::Str(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn field_f64(f: &Field) -> Option<f64> {
    match f {
        Field::Double(v) => Some(*v),
        Field::Float(v) => Some(f64::from(*v)),
        Field::Long(v) => Some(*v as f64),
        Field::Int(v) => Some(f64::from(*v)),
        Field::Short(v) => Some(f64::from(*v)),
        Field::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
        _ => None,
    }
}

// "M:SS" as used by nflverse for drive time of possession.
fn parse_clock(raw: &str) -> Option<u32> {
    let (m, s) = raw.trim().split_once(':')?;
    let m = m.trim().parse::<u32>().ok()?;
    let s = s.trim().parse::<u32>().ok()?;
    Some(m * 60 + s)
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
