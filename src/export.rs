//! Final export: averaged ERP and trial-level tables.
//!
//! Consumes the quality-gated epochs (when the gate produced them) and
//! writes, for the condition of interest, the per-channel per-timepoint
//! trial average plus the full trial-by-trial table — each in both the
//! numeric tensor container and flat CSV for downstream statistics.
//!
//! Exports are deterministic: identical input epochs produce byte-identical
//! output files.

use crate::epoch::EpochSet;
use crate::error::Result;
use crate::events::Condition;
use crate::io::StWriter;
use crate::store::{stage, StageStore};
use anyhow::{anyhow, Context};
use ndarray::Array2;
use std::path::Path;

/// The averaged waveform for one condition.
#[derive(Debug, Clone)]
pub struct Evoked {
    /// `[C, T]` mean across trials.
    pub data: Array2<f32>,
    pub sfreq: f32,
    pub tmin: f32,
    pub ch_names: Vec<String>,
    pub n_trials: usize,
}

/// Per-channel per-timepoint arithmetic mean over all epochs of `cond`.
/// Returns `None` when the condition has no epochs in `set`.
pub fn average_condition(set: &EpochSet, cond: Condition) -> Option<Evoked> {
    let indices = set.condition_indices(cond);
    if indices.is_empty() {
        return None;
    }
    let (_, n_c, n_t) = set.epochs.dim();
    let mut mean = Array2::<f64>::zeros((n_c, n_t));
    for &e in &indices {
        for c in 0..n_c {
            for t in 0..n_t {
                mean[[c, t]] += set.epochs[[e, c, t]] as f64;
            }
        }
    }
    let n = indices.len() as f64;
    Some(Evoked {
        data: mean.mapv(|v| (v / n) as f32),
        sfreq: set.sfreq,
        tmin: set.tmin,
        ch_names: set.ch_names.clone(),
        n_trials: indices.len(),
    })
}

/// Export the condition of interest for one participant.
///
/// No-op returning `false` when the quality gate persisted no cleaned
/// epochs (the participant was excluded, which is not an error). Returns
/// `true` when files were written.
pub fn export_participant(
    store: &StageStore,
    id: &str,
    cond: Condition,
    averaged_dir: &Path,
    trials_dir: &Path,
) -> Result<bool> {
    if !store.exists(id, stage::CLEANED_EPOCHED) {
        return Ok(false);
    }
    let set = store.load_epochs(id, stage::CLEANED_EPOCHED)?;
    let Some(evoked) = average_condition(&set, cond) else {
        // Gate passed but the condition of interest is absent: nothing to
        // export, still not an error.
        return Ok(false);
    };

    // Averaged waveform, tensor container.
    let mut w = StWriter::new();
    w.add_f32_arr2("data", &evoked.data);
    w.add_f32("sfreq", &[evoked.sfreq], &[1]);
    w.add_f32("tmin", &[evoked.tmin], &[1]);
    w.add_i32("n_trials", &[evoked.n_trials as i32], &[1]);
    w.add_string_list("ch_names", &evoked.ch_names);
    w.write(&store.path(id, stage::EVOKED))?;

    // Averaged waveform, CSV (rows = time points in ms).
    std::fs::create_dir_all(averaged_dir)
        .map_err(|e| anyhow!("creating {}: {e}", averaged_dir.display()))?;
    let avg_path = averaged_dir.join(format!("{id}_{}.csv", cond.label()));
    write_evoked_csv(&avg_path, &evoked)?;

    // Trial-level table, CSV.
    std::fs::create_dir_all(trials_dir)
        .map_err(|e| anyhow!("creating {}: {e}", trials_dir.display()))?;
    let trials_path = trials_dir.join(format!("{id}_{}_raw.csv", cond.label()));
    let trials = set.subset(&set.condition_indices(cond));
    write_trials_csv(&trials_path, &trials)?;

    Ok(true)
}

fn write_evoked_csv(path: &Path, evoked: &Evoked) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))
        .map_err(crate::error::PipelineError::Store)?;
    let mut header = vec!["time".to_string()];
    header.extend(evoked.ch_names.iter().cloned());
    w.write_record(&header).map_err(to_store)?;

    let (n_c, n_t) = evoked.data.dim();
    for t in 0..n_t {
        let time_ms = (evoked.tmin + t as f32 / evoked.sfreq) * 1000.0;
        let mut row = vec![format!("{time_ms}")];
        for c in 0..n_c {
            row.push(format!("{}", evoked.data[[c, t]]));
        }
        w.write_record(&row).map_err(to_store)?;
    }
    w.flush().map_err(|e| to_store(csv::Error::from(e)))?;
    Ok(())
}

fn write_trials_csv(path: &Path, set: &EpochSet) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))
        .map_err(crate::error::PipelineError::Store)?;
    let mut header = vec!["epoch".to_string(), "time".to_string()];
    header.extend(set.ch_names.iter().cloned());
    w.write_record(&header).map_err(to_store)?;

    let (n_e, n_c, n_t) = set.epochs.dim();
    for e in 0..n_e {
        for t in 0..n_t {
            let time_ms = (set.tmin + t as f32 / set.sfreq) * 1000.0;
            let mut row = vec![format!("{e}"), format!("{time_ms}")];
            for c in 0..n_c {
                row.push(format!("{}", set.epochs[[e, c, t]]));
            }
            w.write_record(&row).map_err(to_store)?;
        }
    }
    w.flush().map_err(|e| to_store(csv::Error::from(e)))?;
    Ok(())
}

fn to_store(e: csv::Error) -> crate::error::PipelineError {
    crate::error::PipelineError::Store(anyhow!(e))
}
