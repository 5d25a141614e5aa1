use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::KeyConfig;
use crate::error::{EngineError, EngineResult};
use crate::game_keys::{Key, PerKey, extract_game_keys};
use crate::play::{Play, final_score};

const MIN_FIT_SAMPLES: usize = 5;

/// Linear map from the five key margins (team A minus team B) to a point
/// differential and a game total. Display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreModel {
    pub margin_intercept: f64,
    pub margin_coefs: PerKey<f64>,
    pub total_intercept: f64,
    pub total_coefs: PerKey<f64>,
    pub residual_sd: f64,
    pub samples: usize,
    pub ridge_lambda: f64,
    pub fitted_at: Option<DateTime<Utc>>,
}

impl Default for ScoreModel {
    fn default() -> Self {
        // Hand-set priors: a full TOP share point (+0.10) or one takeaway is worth about four points.
        Self {
            margin_intercept: 0.0,
            margin_coefs: PerKey {
                top: 40.0,
                turnovers: 4.0,
                big_plays: 1.5,
                third_down: 20.0,
                red_zone: 15.0,
            },
            total_intercept: 45.0,
            total_coefs: PerKey::default(),
            residual_sd: 10.0,
            samples: 0,
            ridge_lambda: 1.0,
            fitted_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreProjection {
    pub margin: f64,
    pub total: f64,
    pub team_a_points: f64,
    pub team_b_points: f64,
    pub residual_sd: f64,
    pub keys_used: usize,
}

impl ScoreModel {
    /// Missing margins contribute nothing.
    pub fn project(&self, margins: &PerKey<Option<f64>>) -> ScoreProjection {
        let mut margin = self.margin_intercept;
        let mut total = self.total_intercept;
        let mut keys_used = 0usize;
        for key in Key::ALL {
            let Some(m) = *margins.get(key) else {
                continue;
            };
            margin += self.margin_coefs.get(key) * m;
            total += self.total_coefs.get(key) * m;
            keys_used += 1;
        }
        let total = total.max(margin.abs());
        ScoreProjection {
            margin,
            total,
            team_a_points: (total + margin) / 2.0,
            team_b_points: (total - margin) / 2.0,
            residual_sd: self.residual_sd,
            keys_used,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSample {
    pub game_id: String,
    pub margins: [f64; 5],
    pub point_diff: f64,
    pub total: f64,
}

/// Home-minus-away key margins and final scores for every scored game in `plays`.
/// A key without a value on either side contributes a zero margin.
pub fn training_samples(plays: &[Play], cfg: &KeyConfig) -> Vec<ScoreSample> {
    let mut games: BTreeMap<&str, Vec<Play>> = BTreeMap::new();
    for p in plays {
        games.entry(p.game_id.as_str()).or_default().push(p.clone());
    }

    let mut out = Vec::new();
    for (game_id, game_plays) in games {
        let Some((home_pts, away_pts)) = final_score(&game_plays) else {
            debug!(game_id, "skipping game without final score");
            continue;
        };
        let home = &game_plays[0].home_team;
        let away = &game_plays[0].away_team;
        let hk = extract_game_keys(game_id, home, &game_plays, cfg);
        let ak = extract_game_keys(game_id, away, &game_plays, cfg);
        if !hk.usable || !ak.usable {
            continue;
        }
        let mut margins = [0.0; 5];
        for (idx, key) in Key::ALL.iter().enumerate() {
            if let (Some(h), Some(a)) = (hk.value(*key), ak.value(*key)) {
                margins[idx] = h - a;
            }
        }
        out.push(ScoreSample {
            game_id: game_id.to_string(),
            margins,
            point_diff: f64::from(home_pts) - f64::from(away_pts),
            total: f64::from(home_pts) + f64::from(away_pts),
        });
    }
    out
}

/// Ridge regression of point differential and total on the key margins.
/// Features are centered so the intercept is not shrunk.
pub fn fit_ridge(samples: &[ScoreSample], lambda: f64) -> EngineResult<ScoreModel> {
    if samples.len() < MIN_FIT_SAMPLES {
        return Err(EngineError::InsufficientData(format!(
            "score model needs at least {MIN_FIT_SAMPLES} games, got {}",
            samples.len()
        )));
    }
    if lambda < 0.0 {
        return Err(EngineError::InvalidConfig("ridge lambda must be >= 0".to_string()));
    }

    let n = samples.len() as f64;
    let mut x_mean = [0.0; 5];
    let mut diff_mean = 0.0;
    let mut total_mean = 0.0;
    for s in samples {
        for j in 0..5 {
            x_mean[j] += s.margins[j] / n;
        }
        diff_mean += s.point_diff / n;
        total_mean += s.total / n;
    }

    let mut xtx = [[0.0; 5]; 5];
    let mut xty_diff = [0.0; 5];
    let mut xty_total = [0.0; 5];
    for s in samples {
        let mut xc = [0.0; 5];
        for j in 0..5 {
            xc[j] = s.margins[j] - x_mean[j];
        }
        for i in 0..5 {
            for j in 0..5 {
                xtx[i][j] += xc[i] * xc[j];
            }
            xty_diff[i] += xc[i] * (s.point_diff - diff_mean);
            xty_total[i] += xc[i] * (s.total - total_mean);
        }
    }
    for (i, row) in xtx.iter_mut().enumerate() {
        row[i] += lambda;
    }

    let beta_diff = solve5(xtx, xty_diff)
        .ok_or_else(|| EngineError::InsufficientData("singular margin design matrix".to_string()))?;
    let beta_total = solve5(xtx, xty_total)
        .ok_or_else(|| EngineError::InsufficientData("singular total design matrix".to_string()))?;

    let margin_intercept = diff_mean - dot(&beta_diff, &x_mean);
    let total_intercept = total_mean - dot(&beta_total, &x_mean);

    let mut ssr = 0.0;
    for s in samples {
        let pred = margin_intercept + dot(&beta_diff, &s.margins);
        ssr += (s.point_diff - pred).powi(2);
    }
    let dof = (samples.len() - 1).max(1) as f64;

    let model = ScoreModel {
        margin_intercept,
        margin_coefs: per_key(beta_diff),
        total_intercept,
        total_coefs: per_key(beta_total),
        residual_sd: (ssr / dof).sqrt(),
        samples: samples.len(),
        ridge_lambda: lambda,
        fitted_at: Some(Utc::now()),
    };
    info!(samples = model.samples, residual_sd = model.residual_sd, "fitted score model");
    Ok(model)
}

pub fn load_model(path: &Path) -> Result<ScoreModel> {
    let raw = fs::read_to_string(path).with_context(|| format!("read score model {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse score model {}", path.display()))
}

pub fn save_model(path: &Path, model: &ScoreModel) -> Result<()> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(model).context("serialize score model")?;
    fs::write(&tmp, json).context("write score model")?;
    fs::rename(&tmp, path).context("swap score model")?;
    Ok(())
}

fn per_key(beta: [f64; 5]) -> PerKey<f64> {
    PerKey {
        top: beta[0],
        turnovers: beta[1],
        big_plays: beta[2],
        third_down: beta[3],
        red_zone: beta[4],
    }
}

fn dot(a: &[f64; 5], b: &[f64; 5]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

// Gaussian elimination with partial pivoting.
fn solve5(mut a: [[f64; 5]; 5], mut b: [f64; 5]) -> Option<[f64; 5]> {
    for col in 0..5 {
        let pivot = (col..5).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in (col + 1)..5 {
            let f = a[row][col] / a[col][col];
            for k in col..5 {
                a[row][k] -= f * a[col][k];
            }
            b[row] -= f * b[col];
        }
    }
    let mut x = [0.0; 5];
    for row in (0..5).rev() {
        let mut acc = b[row];
        for k in (row + 1)..5 {
            acc -= a[row][k] * x[k];
        }
        x[row] = acc / a[row][row];
    }
    Some(x)
}
