//! Machine Sensor Simulation
//!
//! Generates a phased sensor feed for testing the risk engine:
//! - Normal operation
//! - Overheat ramp (cooling failure)
//! - Pressure spike (blocked outlet)
//! - Vibration drift (bearing wear)
//! - Recovery
//!
//! # Usage
//! ```bash
//! ./simulation --samples 240 --seed 7 | ./sensor-risk --stdin
//! ./simulation --format csv > feed.csv && ./sensor-risk --csv feed.csv
//! ```

use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::io::{self, Write};
use std::time::{Duration, Instant};

use sensor_risk::config::defaults::MINUTES_PER_SAMPLE;
use sensor_risk::registry::ProfileRegistry;
use sensor_risk::types::Observation;

// ============================================================================
// Plant Constants
// ============================================================================

/// Baseline motor temperature (°C)
const BASE_TEMPERATURE: f64 = 52.0;
/// Baseline line pressure (bar)
const BASE_PRESSURE: f64 = 95.0;
/// Baseline vibration (mm/s)
const BASE_VIBRATION: f64 = 0.35;

/// Temperature reached at the end of the overheat ramp
const OVERHEAT_PEAK: f64 = 92.0;
/// Pressure plateau during the spike
const PRESSURE_SPIKE: f64 = 145.0;
/// Vibration reached at the end of the drift
const VIBRATION_PEAK: f64 = 1.1;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "sensor-simulation")]
#[command(about = "Phased machine sensor feed for sensor-risk testing")]
#[command(version)]
struct Args {
    /// Samples per sensor to generate
    #[arg(short = 'n', long, default_value = "200", value_parser = clap::value_parser!(u64).range(10..=100_000))]
    samples: u64,

    /// Machine identifier stamped on every reading
    #[arg(short, long, default_value = "machine-001")]
    machine: String,

    /// Output format: json or csv
    #[arg(short, long, default_value = "json")]
    format: String,

    /// Real-time delay between samples in milliseconds (0 = as fast as possible)
    #[arg(long, default_value = "0")]
    interval_ms: u64,

    /// Suppress mission log (only output sensor data)
    #[arg(short, long)]
    quiet: bool,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

// ============================================================================
// Simulation Phases
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    /// Steady operation inside every normal band (0-30%)
    Normal,
    /// Temperature climbs past the critical limit (30-50%)
    Overheat,
    /// Pressure jumps above the critical limit (50-65%)
    PressureSpike,
    /// Vibration creeps upward (65-85%)
    VibrationDrift,
    /// Everything returns to baseline (85-100%)
    Recovery,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Normal => "Normal Operation",
            Phase::Overheat => "Overheat Ramp (Cooling Failure)",
            Phase::PressureSpike => "Pressure Spike (Blocked Outlet)",
            Phase::VibrationDrift => "Vibration Drift (Bearing Wear)",
            Phase::Recovery => "Recovery (Return to Normal)",
        }
    }

    fn expectation(&self) -> &'static str {
        match self {
            Phase::Normal => "Expected: all sensors normal",
            Phase::Overheat => "Expected: temperature warning → high → critical",
            Phase::PressureSpike => "Expected: pressure critical, emergency stop",
            Phase::VibrationDrift => "Expected: vibration warning, predictive alerts",
            Phase::Recovery => "Expected: risks decaying back to normal",
        }
    }

    /// Phase and progress within that phase (0..1).
    fn from_progress(progress: f64) -> (Self, f64) {
        let bands = [
            (0.30, Phase::Normal),
            (0.50, Phase::Overheat),
            (0.65, Phase::PressureSpike),
            (0.85, Phase::VibrationDrift),
            (1.00, Phase::Recovery),
        ];
        let mut start = 0.0;
        for (end, phase) in bands {
            if progress < end {
                return (phase, (progress - start) / (end - start));
            }
            start = end;
        }
        (Phase::Recovery, 1.0)
    }
}

// ============================================================================
// Simulation State
// ============================================================================

struct SimulationState {
    rng: StdRng,
    sample: u64,
    total_samples: u64,
    current_phase: Phase,
    phase_progress: f64,

    temperature: f64,
    pressure: f64,
    vibration: f64,

    temperature_noise: Normal<f64>,
    pressure_noise: Normal<f64>,
    vibration_noise: Normal<f64>,

    readings_generated: u64,
    out_of_band_readings: u64,
}

impl SimulationState {
    fn new(total_samples: u64, seed: Option<u64>) -> Result<Self, rand_distr::NormalError> {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            rng,
            sample: 0,
            total_samples,
            current_phase: Phase::Normal,
            phase_progress: 0.0,
            temperature: BASE_TEMPERATURE,
            pressure: BASE_PRESSURE,
            vibration: BASE_VIBRATION,
            temperature_noise: Normal::new(0.0, 0.8)?,
            pressure_noise: Normal::new(0.0, 1.5)?,
            vibration_noise: Normal::new(0.0, 0.015)?,
            readings_generated: 0,
            out_of_band_readings: 0,
        })
    }

    fn progress(&self) -> f64 {
        self.sample as f64 / self.total_samples as f64
    }

    /// Returns true on a phase change.
    fn update_phase(&mut self) -> bool {
        let (phase, within) = Phase::from_progress(self.progress());
        self.phase_progress = within;
        if phase != self.current_phase || self.sample == 0 {
            self.current_phase = phase;
            return true;
        }
        false
    }

    fn update_values(&mut self) {
        let t = self.phase_progress;
        match self.current_phase {
            Phase::Normal => {
                self.temperature = BASE_TEMPERATURE;
                self.pressure = BASE_PRESSURE;
                self.vibration = BASE_VIBRATION;
            }
            Phase::Overheat => {
                self.temperature = BASE_TEMPERATURE + (OVERHEAT_PEAK - BASE_TEMPERATURE) * t;
            }
            Phase::PressureSpike => {
                // Temperature settles while the pressure plateau holds
                self.temperature += (BASE_TEMPERATURE - self.temperature) * 0.3;
                self.pressure = if t < 0.6 { PRESSURE_SPIKE } else { BASE_PRESSURE + 20.0 };
            }
            Phase::VibrationDrift => {
                self.pressure += (BASE_PRESSURE - self.pressure) * 0.3;
                self.vibration = BASE_VIBRATION + (VIBRATION_PEAK - BASE_VIBRATION) * t;
            }
            Phase::Recovery => {
                self.temperature += (BASE_TEMPERATURE - self.temperature) * 0.25;
                self.pressure += (BASE_PRESSURE - self.pressure) * 0.25;
                self.vibration += (BASE_VIBRATION - self.vibration) * 0.25;
            }
        }
    }

    fn generate_readings(&mut self, machine: &str) -> [Observation; 3] {
        self.update_values();

        let timestamp = Utc::now() + ChronoDuration::minutes((self.sample as f64 * MINUTES_PER_SAMPLE) as i64);
        let temperature = self.temperature + self.temperature_noise.sample(&mut self.rng);
        let pressure = self.pressure + self.pressure_noise.sample(&mut self.rng);
        let vibration = (self.vibration + self.vibration_noise.sample(&mut self.rng)).max(0.0);

        self.readings_generated += 3;
        self.sample += 1;

        [
            Observation::new(machine, "temperature", temperature).at(timestamp),
            Observation::new(machine, "pressure", pressure).at(timestamp),
            Observation::new(machine, "vibration", vibration).at(timestamp),
        ]
    }
}

// ============================================================================
// Logging Utilities
// ============================================================================

fn log_mission(sample: u64, message: &str, quiet: bool) {
    if !quiet {
        eprintln!("[{:>6}] {}", sample, message);
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut state = SimulationState::new(args.samples, args.seed)?;
    let registry = ProfileRegistry::builtin();
    let interval = Duration::from_millis(args.interval_ms);

    // Mission briefing
    log_mission(0, &"=".repeat(70), args.quiet);
    log_mission(0, "MACHINE SENSOR SIMULATION", args.quiet);
    log_mission(0, &"=".repeat(70), args.quiet);
    log_mission(0, &format!("  Machine: {}", args.machine), args.quiet);
    log_mission(0, &format!("  Samples: {} per sensor", args.samples), args.quiet);
    log_mission(0, &format!("  Cadence: {} min per sample", MINUTES_PER_SAMPLE), args.quiet);
    if let Some(seed) = args.seed {
        log_mission(0, &format!("  Random seed: {}", seed), args.quiet);
    }
    log_mission(0, "", args.quiet);
    log_mission(0, "SCENARIO PHASES:", args.quiet);
    log_mission(0, "  0-30%:   Normal operation", args.quiet);
    log_mission(0, "  30-50%:  Overheat ramp", args.quiet);
    log_mission(0, "  50-65%:  Pressure spike", args.quiet);
    log_mission(0, "  65-85%:  Vibration drift", args.quiet);
    log_mission(0, "  85-100%: Recovery", args.quiet);
    log_mission(0, &"=".repeat(70), args.quiet);

    if args.format == "csv" {
        println!("machine_id,sensor_type,value,timestamp");
    }

    let start_time = Instant::now();
    let stdout = io::stdout();
    let mut stdout_lock = stdout.lock();

    while state.sample < state.total_samples {
        let loop_start = Instant::now();

        if state.update_phase() {
            log_mission(state.sample, &format!(">>> PHASE: {}", state.current_phase.name()), args.quiet);
            log_mission(state.sample, &format!("    {}", state.current_phase.expectation()), args.quiet);
        }

        for obs in state.generate_readings(&args.machine) {
            if registry
                .get(&obs.sensor_type)
                .is_some_and(|p| !p.thresholds.is_within_normal(obs.value))
            {
                state.out_of_band_readings += 1;
            }
            match args.format.as_str() {
                "csv" => {
                    let ts = obs.timestamp.map(|t| t.to_rfc3339()).unwrap_or_default();
                    writeln!(stdout_lock, "{},{},{:.4},{}", obs.machine_id, obs.sensor_type, obs.value, ts)?;
                }
                _ => {
                    let json = serde_json::to_string(&obs)?;
                    writeln!(stdout_lock, "{}", json)?;
                }
            }
        }
        stdout_lock.flush()?;

        if !interval.is_zero() {
            let elapsed = loop_start.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
    }

    stdout_lock.flush()?;
    drop(stdout_lock);

    log_mission(state.sample, &"=".repeat(70), args.quiet);
    log_mission(state.sample, "SIMULATION COMPLETE", args.quiet);
    log_mission(state.sample, &format!("Total readings: {}", state.readings_generated), args.quiet);
    log_mission(state.sample, &format!("Out-of-band readings: {}", state.out_of_band_readings), args.quiet);
    log_mission(
        state.sample,
        &format!("Real time: {:.1}s", start_time.elapsed().as_secs_f64()),
        args.quiet,
    );
    log_mission(state.sample, &"=".repeat(70), args.quiet);

    Ok(())
}
