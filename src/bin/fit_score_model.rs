use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use gridiron_keys::config;
use gridiron_keys::fake_season::{FakeSeasonConfig, generate_season};
use gridiron_keys::logging;
use gridiron_keys::play::{Play, SeasonType};
use gridiron_keys::play_store;
use gridiron_keys::score_model::{fit_ridge, save_model, training_samples};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init_logging();

    let cfg = config::resolve_config(parse_path_arg("--config").as_deref())?;
    let lambda = parse_f64_arg("--lambda").unwrap_or(cfg.score_model.ridge_lambda);
    let out_path = parse_path_arg("--out").unwrap_or_else(config::default_score_model_path);
    let postseason_only = !has_flag("--all-games");

    let plays: Vec<Play> = if has_flag("--demo") {
        (0..4u64)
            .flat_map(|seed| {
                generate_season(&FakeSeasonConfig {
                    seed,
                    season: 2020 + seed as u16,
                    ..FakeSeasonConfig::default()
                })
            })
            .collect()
    } else {
        let db_path = parse_path_arg("--db").unwrap_or_else(config::default_db_path);
        let conn = play_store::open_db(&db_path)?;
        let mut all = Vec::new();
        for season in play_store::stored_seasons(&conn).context("list stored seasons")? {
            all.extend(play_store::load_season_plays(&conn, season).context("load season plays")?);
        }
        all
    };
    let plays: Vec<Play> = plays
        .into_iter()
        .filter(|p| !postseason_only || p.season_type == SeasonType::Postseason)
        .collect();
    if plays.is_empty() {
        return Err(anyhow!("no plays available for fitting"));
    }

    let samples = training_samples(&plays, &cfg.keys);
    let model = fit_ridge(&samples, lambda).context("fit score model")?;
    save_model(&out_path, &model)?;

    println!("Score model fit complete");
    println!("Samples: {}", model.samples);
    println!("Residual sd: {:.2}", model.residual_sd);
    println!(
        "Margin coefs: TOP={:.2} TO={:.2} BIG={:.2} 3D={:.2} RZ={:.2} (intercept {:.2})",
        model.margin_coefs.top,
        model.margin_coefs.turnovers,
        model.margin_coefs.big_plays,
        model.margin_coefs.third_down,
        model.margin_coefs.red_zone,
        model.margin_intercept
    );
    println!("Saved: {}", out_path.display());
    Ok(())
}

fn parse_f64_arg(name: &str) -> Option<f64> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}="))
            && let Ok(v) = raw.trim().parse::<f64>()
        {
            return Some(v);
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && let Ok(v) = next.trim().parse::<f64>()
        {
            return Some(v);
        }
    }
    None
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix(&format!("{name}=")) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == name {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}
