use serde::Serialize;

use crate::error::{EngineError, EngineResult};
use crate::play::Play;

// Below this share a field is treated as absent for the season.
const REQUIRED_MIN_COVERAGE: f64 = 0.5;
const FULL_COVERAGE: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    Degraded,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCoverage {
    pub field: &'static str,
    pub required: bool,
    pub present: usize,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadinessReport {
    pub season: u16,
    pub readiness: Readiness,
    pub plays: usize,
    pub coverage: Vec<FieldCoverage>,
    pub notes: Vec<String>,
}

type FieldProbe = (&'static str, bool, fn(&Play) -> bool);

// Down, distance and field position feed three keys directly; the rest have fallbacks.
const FIELDS: [FieldProbe; 7] = [
    ("down", true, |p: &Play| p.down.is_some()),
    ("yards_to_go", true, |p: &Play| p.yards_to_go.is_some()),
    ("yardline_100", true, |p: &Play| p.yardline_100.is_some()),
    ("drive", false, |p: &Play| p.drive.is_some()),
    ("drive_time_secs", false, |p: &Play| p.drive_time_secs.is_some()),
    ("epa", false, |p: &Play| p.epa.is_some()),
    ("success", false, |p: &Play| p.success.is_some()),
];

/// Column completeness of one season's scrimmage snaps.
pub fn assess_readiness(season: u16, plays: &[Play]) -> ReadinessReport {
    let snaps: Vec<&Play> = plays
        .iter()
        .filter(|p| p.season == season && p.is_snap())
        .collect();
    let n = snaps.len();
    if n == 0 {
        return ReadinessReport {
            season,
            readiness: Readiness::Unavailable,
            plays: 0,
            coverage: Vec::new(),
            notes: vec![format!("no scrimmage plays for {season}")],
        };
    }

    let mut coverage = Vec::with_capacity(FIELDS.len());
    let mut notes = Vec::new();
    let mut readiness = Readiness::Ready;
    for (field, required, probe) in FIELDS {
        let present = snaps.iter().filter(|p| probe(**p)).count();
        let ratio = present as f64 / n as f64;
        if required && ratio < REQUIRED_MIN_COVERAGE {
            readiness = Readiness::Unavailable;
            notes.push(format!("{field}: only {:.0}% of plays", ratio * 100.0));
        } else if ratio < FULL_COVERAGE && readiness == Readiness::Ready {
            readiness = Readiness::Degraded;
        }
        if !required && ratio < FULL_COVERAGE {
            notes.push(format!("{field}: {:.0}% coverage, fallback in use", ratio * 100.0));
        }
        coverage.push(FieldCoverage {
            field,
            required,
            present,
            ratio,
        });
    }

    // EPA and success are alternatives; having either at full coverage is enough.
    let value_ok = coverage
        .iter()
        .filter(|c| c.field == "epa" || c.field == "success")
        .any(|c| c.ratio >= FULL_COVERAGE);
    let others_ok = coverage
        .iter()
        .filter(|c| c.field != "epa" && c.field != "success")
        .all(|c| c.ratio >= FULL_COVERAGE);
    if readiness == Readiness::Degraded && value_ok && others_ok {
        readiness = Readiness::Ready;
        notes.retain(|n| !(n.starts_with("epa") || n.starts_with("success")));
    }

    ReadinessReport {
        season,
        readiness,
        plays: n,
        coverage,
        notes,
    }
}

/// Errors when the season cannot support key extraction at all.
pub fn require_usable(season: u16, plays: &[Play]) -> EngineResult<ReadinessReport> {
    let report = assess_readiness(season, plays);
    if report.readiness == Readiness::Unavailable {
        return Err(EngineError::DataUnavailable(format!(
            "season {season}: {}",
            report.notes.join("; ")
        )));
    }
    Ok(report)
}
