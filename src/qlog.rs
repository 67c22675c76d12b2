//! Structured per-stage quality logs.
//!
//! Each stage emits exactly one row per participant, written as its own CSV
//! file under the log directory. Files are keyed by participant ID, so
//! concurrent workers never contend on the same path. Rows are pure derived
//! data: write-once, never mutated.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Filter parameters and interpolation count (one row per participant).
#[derive(Debug, Clone, Serialize)]
pub struct FilterLog {
    pub id: String,
    pub raw_highpass: f32,
    pub raw_lowpass: f32,
    pub ica_highpass: f32,
    pub ica_lowpass: f32,
    pub filter_method: &'static str,
    pub filter_phase: &'static str,
    pub fir_window: &'static str,
    pub fir_design: &'static str,
    pub num_bad_channels_interpolated: usize,
}

/// Decomposition application summary.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactLog {
    pub id: String,
    pub num_components_zeroed: usize,
}

/// Recoded trial counts realized at the epoching stage.
#[derive(Debug, Clone, Serialize)]
pub struct EpochLog {
    pub id: String,
    pub num_correct_go_trials: usize,
    pub num_correct_nogo_trials: usize,
    pub num_incorrect_nogo_trials: usize,
}

/// Post-rejection quality metrics and the gate decision inputs.
#[derive(Debug, Clone, Serialize)]
pub struct QualityLog {
    pub id: String,
    pub num_correct_go_trials_after_rejection: usize,
    pub perc_correct_go_trials_after_rejection: f64,
    pub num_correct_nogo_trials_after_rejection: usize,
    pub perc_correct_nogo_trials_after_rejection: f64,
    pub num_incorrect_nogo_trials_after_rejection: usize,
    pub perc_incorrect_nogo_trials_after_rejection: f64,
    pub perc_bad_and_rejected_channels: f64,
    pub perc_bad_and_interpolated_channels: f64,
    pub min_nogo_correct_threshold: usize,
    /// `true` when the cleaned epochs were persisted (gate satisfied).
    pub persisted: bool,
}

/// Wall-clock duration for the whole participant pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct TimerLog {
    pub id: String,
    pub preprocessing_time_in_minutes: f64,
}

/// Write one serializable row as `<id>_<stage>_log.csv` under `log_dir`.
pub fn write_log_row<T: Serialize>(log_dir: &Path, id: &str, stage: &str, row: &T) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating {}", log_dir.display()))?;
    let path = log_dir.join(format!("{id}_{stage}_log.csv"));
    let mut w = csv::Writer::from_path(&path)
        .with_context(|| format!("creating {}", path.display()))?;
    w.serialize(row)?;
    w.flush()?;
    Ok(())
}

/// Percentage helper reporting 0 when the denominator is zero (an absent
/// condition counts as zero, never as an error).
pub fn percent(numer: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.0
    } else {
        numer as f64 / denom as f64 * 100.0
    }
}
