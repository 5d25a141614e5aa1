use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::game_keys::{Key, PerKey};
use crate::score_model::ScoreModel;

pub const CONFIG_PATH_ENV: &str = "GRIDIRON_CONFIG";
pub const DATA_DIR_ENV: &str = "GRIDIRON_DATA_DIR";

/// Every tunable the engine reads. Passed by reference into each call; nothing
/// below reads process state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub keys: KeyConfig,
    pub strength: StrengthConfig,
    pub aggregation: AggregationConfig,
    pub predictor: PredictorConfig,
    pub score_model: ScoreModel,
    pub qb: QbConfig,
    pub turnovers: TurnoverConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    pub big_play_pass_yards: i16,
    pub big_play_rush_yards: i16,
    pub red_zone_yardline: u8,
    pub third_down_number: u8,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            big_play_pass_yards: 15,
            big_play_rush_yards: 10,
            red_zone_yardline: 20,
            third_down_number: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StrengthConfig {
    pub efficiency_weight: f64,
    pub schedule_weight: f64,
    // z-scored regular-season win pct of the defense's own team.
    pub record_weight: f64,
}

impl Default for StrengthConfig {
    fn default() -> Self {
        Self {
            efficiency_weight: 0.7,
            schedule_weight: 0.3,
            record_weight: 0.15,
        }
    }
}

/// How opponent difficulty becomes a per-game weight. Every form reads the
/// opponent's composite only; win records enter through the composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum OpponentWeighting {
    /// `exp(rate * composite)`.
    Exponential { rate: f64 },
    /// `max(floor, base + scale * composite)`.
    Linear { base: f64, scale: f64, floor: f64 },
}

impl Default for OpponentWeighting {
    fn default() -> Self {
        OpponentWeighting::Exponential { rate: 0.35 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub weighting: OpponentWeighting,
    // Dampener kicks in when the opponent gave the ball away strictly more often than this.
    pub meltdown_turnover_threshold: u32,
    pub meltdown_factor: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            weighting: OpponentWeighting::default(),
            meltdown_turnover_threshold: 3,
            meltdown_factor: 0.80,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub tie_epsilon: PerKey<f64>,
    pub importance: PerKey<f64>,
    // Margin that counts as "about one unit of dominance" for each key.
    pub margin_scale: PerKey<f64>,
    pub count_slope: f64,
    pub margin_share: f64,
    pub strict_keys: bool,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            tie_epsilon: PerKey {
                top: 0.01,
                turnovers: 0.25,
                big_plays: 0.25,
                third_down: 0.02,
                red_zone: 0.02,
            },
            importance: PerKey {
                top: 1.0,
                turnovers: 1.35,
                big_plays: 1.0,
                third_down: 1.0,
                red_zone: 1.0,
            },
            margin_scale: PerKey {
                top: 0.10,
                turnovers: 1.0,
                big_plays: 2.0,
                third_down: 0.10,
                red_zone: 0.12,
            },
            count_slope: 0.55,
            margin_share: 0.40,
            strict_keys: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct QbComponentWeights {
    pub drive_sustainability: f64,
    pub high_leverage: f64,
    pub off_script: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct QbConfig {
    pub weights: QbComponentWeights,
    // Added per unit of mean opponent difficulty z.
    pub sensitivity: QbComponentWeights,
    pub deep_air_yards: i16,
    pub int_qb_fault_weight: f64,
    pub int_other_weight: f64,
    pub fumble_qb_fault_weight: f64,
    pub fumble_other_weight: f64,
}

impl Default for QbComponentWeights {
    fn default() -> Self {
        Self {
            drive_sustainability: 0.40,
            high_leverage: 0.40,
            off_script: 0.20,
        }
    }
}

impl Default for QbConfig {
    fn default() -> Self {
        Self {
            weights: QbComponentWeights::default(),
            sensitivity: QbComponentWeights {
                drive_sustainability: 0.025,
                high_leverage: 0.025,
                off_script: 0.05,
            },
            deep_air_yards: 8,
            int_qb_fault_weight: 1.0,
            int_other_weight: 0.35,
            fumble_qb_fault_weight: 0.75,
            fumble_other_weight: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnoverConfig {
    pub postseason_weight: f64,
    pub season_weight: f64,
    pub min_expected: f64,
    pub max_expected: f64,
}

impl Default for TurnoverConfig {
    fn default() -> Self {
        Self {
            postseason_weight: 0.55,
            season_weight: 0.45,
            min_expected: 0.4,
            max_expected: 2.2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreBacking {
    #[default]
    Memory,
    Sqlite {
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub backing: StoreBacking,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        let k = &self.keys;
        if k.big_play_pass_yards <= 0 || k.big_play_rush_yards <= 0 {
            return Err(invalid("big-play thresholds must be positive"));
        }
        if k.red_zone_yardline == 0 || k.red_zone_yardline > 50 {
            return Err(invalid("red-zone yard line must be within 1..=50"));
        }
        if !(1..=4).contains(&k.third_down_number) {
            return Err(invalid("third_down_number must be a down (1..=4)"));
        }

        let s = &self.strength;
        if s.efficiency_weight < 0.0 || s.schedule_weight < 0.0 || s.record_weight < 0.0 {
            return Err(invalid("strength blend weights must be non-negative"));
        }
        if s.efficiency_weight + s.schedule_weight + s.record_weight <= 0.0 {
            return Err(invalid("strength blend weights must not all be zero"));
        }

        let a = &self.aggregation;
        if !(a.meltdown_factor > 0.0 && a.meltdown_factor < 1.0) {
            return Err(invalid("meltdown_factor must be in (0, 1)"));
        }
        // A flat weight would stop tougher opponents from counting for more.
        match a.weighting {
            OpponentWeighting::Exponential { rate } if !(rate > 0.0 && rate.is_finite()) => {
                return Err(invalid("exponential weighting rate must be > 0"));
            }
            OpponentWeighting::Linear { scale, floor, .. }
                if !(scale > 0.0 && scale.is_finite()) || floor <= 0.0 =>
            {
                return Err(invalid("linear weighting needs scale > 0 and floor > 0"));
            }
            _ => {}
        }

        let p = &self.predictor;
        for key in Key::ALL {
            if *p.tie_epsilon.get(key) < 0.0 {
                return Err(invalid(format!("tie_epsilon for {} must be >= 0", key.label())));
            }
            if *p.importance.get(key) <= 0.0 {
                return Err(invalid(format!("importance for {} must be > 0", key.label())));
            }
            if *p.margin_scale.get(key) <= 0.0 {
                return Err(invalid(format!("margin_scale for {} must be > 0", key.label())));
            }
        }
        if p.count_slope <= 0.0 {
            return Err(invalid("count_slope must be > 0"));
        }
        // Above 0.5 the margin term could outweigh one whole key.
        if !(0.0..=0.5).contains(&p.margin_share) {
            return Err(invalid("margin_share must be within [0, 0.5]"));
        }

        let w = &self.qb.weights;
        if w.drive_sustainability < 0.0 || w.high_leverage < 0.0 || w.off_script < 0.0 {
            return Err(invalid("QB component weights must be non-negative"));
        }
        let sens = &self.qb.sensitivity;
        if sens.drive_sustainability <= 0.0 || sens.high_leverage <= 0.0 || sens.off_script <= 0.0 {
            return Err(invalid("QB difficulty sensitivities must be > 0"));
        }

        let t = &self.turnovers;
        if t.min_expected > t.max_expected {
            return Err(invalid("turnover clamp min exceeds max"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> EngineError {
    EngineError::InvalidConfig(msg.into())
}

pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let raw = fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let cfg: EngineConfig =
        serde_json::from_str(&raw).with_context(|| format!("parse config {}", path.display()))?;
    cfg.validate().context("validate config")?;
    Ok(cfg)
}

/// Explicit path first, then `GRIDIRON_CONFIG`, then built-in defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<EngineConfig> {
    let from_env = std::env::var(CONFIG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    match explicit.map(Path::to_path_buf).or(from_env) {
        Some(path) => load_config(&path),
        None => Ok(EngineConfig::default()),
    }
}

pub fn data_dir() -> PathBuf {
    std::env::var(DATA_DIR_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"))
}

pub fn default_db_path() -> PathBuf {
    data_dir().join("plays.sqlite")
}

pub fn default_score_model_path() -> PathBuf {
    data_dir().join("score_model.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        EngineConfig::default().validate().expect("defaults are valid");
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let cfg: EngineConfig = serde_json::from_str(
            r#"{"keys":{"big_play_pass_yards":20},"aggregation":{"weighting":{"form":"linear","base":1.0,"scale":0.25,"floor":0.2}}}"#,
        )
        .expect("parse");
        assert_eq!(cfg.keys.big_play_pass_yards, 20);
        assert_eq!(cfg.keys.big_play_rush_yards, 10);
        assert_eq!(
            cfg.aggregation.weighting,
            OpponentWeighting::Linear {
                base: 1.0,
                scale: 0.25,
                floor: 0.2
            }
        );
        assert!((cfg.aggregation.meltdown_factor - 0.80).abs() < 1e-12);
    }

    #[test]
    fn rejects_flat_exponential_weighting() {
        let mut cfg = EngineConfig::default();
        cfg.aggregation.weighting = OpponentWeighting::Exponential { rate: 0.0 };
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));
        cfg.aggregation.weighting = OpponentWeighting::Exponential { rate: 0.1 };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_flat_linear_weighting() {
        let mut cfg = EngineConfig::default();
        cfg.aggregation.weighting = OpponentWeighting::Linear {
            base: 1.0,
            scale: 0.0,
            floor: 0.1,
        };
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));
        cfg.aggregation.weighting = OpponentWeighting::Linear {
            base: 1.0,
            scale: 0.2,
            floor: 0.1,
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn unknown_weighting_form_is_rejected() {
        let parsed = serde_json::from_str::<EngineConfig>(
            r#"{"aggregation":{"weighting":{"form":"win_pct","base":0.75,"scale":0.5}}}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn rejects_margin_share_that_could_flip_a_key() {
        let mut cfg = EngineConfig::default();
        cfg.predictor.margin_share = 0.8;
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));
    }
}
