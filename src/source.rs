//! Observation sources for the ingestion drivers
//!
//! - JSON lines (`{"machine_id": .., "sensor_type": .., "value": ..}`)
//! - CSV replay: `machine_id,sensor_type,value[,timestamp]`
//! - Random-walk simulator producing one reading per sensor type per tick

use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::registry::ProfileRegistry;
use crate::types::Observation;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to open {0}: {1}")]
    Open(PathBuf, #[source] std::io::Error),

    #[error("No observations loaded from {0}")]
    Empty(PathBuf),
}

// ============================================================================
// JSON Lines
// ============================================================================

/// Parse one JSON-lines record. Blank lines yield `Ok(None)`.
pub fn parse_json_line(line: &str) -> Result<Option<Observation>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

// ============================================================================
// CSV Replay
// ============================================================================

/// Load every parseable row of a CSV file. Malformed rows are logged and
/// skipped; a header row starting with `machine_id` is ignored.
pub fn read_csv_observations(path: &Path) -> Result<Vec<Observation>, SourceError> {
    let file = File::open(path).map_err(|e| SourceError::Open(path.to_path_buf(), e))?;
    let reader = BufReader::new(file);
    let mut observations = Vec::new();

    for (idx, line_result) in reader.lines().enumerate() {
        let line_num = idx + 1;
        let line = match line_result {
            Ok(l) => l,
            Err(e) => {
                warn!(line = line_num, error = %e, "Error reading CSV line");
                continue;
            }
        };

        if line.trim().is_empty() || (line_num == 1 && line.starts_with("machine_id")) {
            continue;
        }

        match parse_csv_line(&line) {
            Ok(obs) => observations.push(obs),
            Err(e) => warn!(line = line_num, error = %e, "Error parsing CSV line"),
        }
    }

    if observations.is_empty() {
        return Err(SourceError::Empty(path.to_path_buf()));
    }
    info!(count = observations.len(), path = %path.display(), "Loaded observations from CSV");
    Ok(observations)
}

/// Parse `machine_id,sensor_type,value[,timestamp]`.
pub fn parse_csv_line(line: &str) -> Result<Observation, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 3 {
        return Err(format!("expected at least 3 fields, got {}", fields.len()));
    }
    if fields[0].is_empty() || fields[1].is_empty() {
        return Err("machine_id and sensor_type must not be empty".to_string());
    }

    let value: f64 = fields[2]
        .parse()
        .map_err(|e| format!("invalid value '{}': {}", fields[2], e))?;

    let mut obs = Observation::new(fields[0], fields[1], value);
    if let Some(ts) = fields.get(3).filter(|s| !s.is_empty()) {
        let parsed = DateTime::parse_from_rfc3339(ts).map_err(|e| format!("invalid timestamp '{ts}': {e}"))?;
        obs = obs.at(parsed.with_timezone(&Utc));
    }
    Ok(obs)
}

// ============================================================================
// Random-walk Simulator
// ============================================================================

/// Step size as a share of the normal band width.
const WALK_STEP_SHARE: f64 = 1.0 / 6.0;

/// Per-machine random walk over every registered sensor type.
///
/// Each type starts at its band midpoint and moves by a uniform step of up to
/// a sixth of the band per tick, bounded by the critical limits.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    machine_id: String,
    walkers: BTreeMap<String, Walker>,
}

#[derive(Debug, Clone, Copy)]
struct Walker {
    value: f64,
    step: f64,
    lo: f64,
    hi: f64,
}

impl RandomWalk {
    pub fn new(machine_id: impl Into<String>, registry: &ProfileRegistry) -> Self {
        let walkers = registry
            .profiles()
            .map(|p| {
                let t = &p.thresholds;
                let walker = Walker {
                    value: t.midpoint(),
                    step: t.normal_range() * WALK_STEP_SHARE,
                    lo: t.critical_low,
                    hi: t.critical_high,
                };
                (p.sensor_type.clone(), walker)
            })
            .collect();
        Self {
            machine_id: machine_id.into(),
            walkers,
        }
    }

    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    /// Advance every walker one step and return the new readings.
    pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<Observation> {
        let now = Utc::now();
        self.walkers
            .iter_mut()
            .map(|(sensor_type, w)| {
                let delta = rng.gen_range(-w.step..=w.step);
                w.value = (w.value + delta).clamp(w.lo, w.hi);
                Observation::new(self.machine_id.as_str(), sensor_type.as_str(), w.value).at(now)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;

    #[test]
    fn test_parse_json_line() {
        let obs = parse_json_line(r#"{"machine_id":"m1","sensor_type":"temperature","value":61.5}"#)
            .unwrap()
            .unwrap();
        assert_eq!(obs.machine_id, "m1");
        assert_eq!(obs.value, 61.5);
        assert!(parse_json_line("   ").unwrap().is_none());
        assert!(parse_json_line("{not json").is_err());
    }

    #[test]
    fn test_parse_csv_line() {
        let obs = parse_csv_line("machine-001, pressure, 101.5").unwrap();
        assert_eq!(obs.sensor_type, "pressure");
        assert!(obs.timestamp.is_none());

        let obs = parse_csv_line("m1,vibration,0.42,2024-05-01T12:00:00Z").unwrap();
        assert!(obs.timestamp.is_some());

        assert!(parse_csv_line("m1,vibration").is_err());
        assert!(parse_csv_line("m1,vibration,abc").is_err());
        assert!(parse_csv_line("m1,vibration,1.0,yesterday").is_err());
    }

    #[test]
    fn test_read_csv_skips_header_and_bad_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "machine_id,sensor_type,value,timestamp").unwrap();
        writeln!(file, "m1,temperature,50.0").unwrap();
        writeln!(file, "m1,temperature,oops").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "m2,pressure,99.0,2024-05-01T12:00:00Z").unwrap();

        let obs = read_csv_observations(file.path()).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[1].machine_id, "m2");
    }

    #[test]
    fn test_empty_csv_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(read_csv_observations(file.path()), Err(SourceError::Empty(_))));
    }

    #[test]
    fn test_random_walk_stays_within_critical_limits() {
        let registry = ProfileRegistry::builtin();
        let mut walk = RandomWalk::new("machine-001", &registry);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let readings = walk.tick(&mut rng);
            assert_eq!(readings.len(), 3);
            for obs in readings {
                let t = registry.get(&obs.sensor_type).unwrap().thresholds;
                assert!(obs.value >= t.critical_low && obs.value <= t.critical_high);
            }
        }
    }
}
