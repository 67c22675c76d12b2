//! Per-participant pipeline orchestration and batch fan-out.
//!
//! One participant walks the stage sequence
//! `Cropped → Filtered → ArtifactRemoved → Epoched → QualityGated →
//! Exported | Excluded`, with every stage reading its input from and
//! writing its output to the stage store. `Excluded` is a terminal
//! *non-error* outcome (too little clean data); any [`PipelineError`]
//! yields the terminal `Failed` outcome instead, without disturbing other
//! participants. The batch driver fans participants out over a rayon pool;
//! each task owns its data end to end and writes only to
//! participant-prefixed paths, so no synchronization is needed.

use crate::artifact::{ArtifactRemover, IcaDecomposition};
use crate::config::PipelineConfig;
use crate::epoch::extract_epochs;
use crate::error::{PipelineError, Result};
use crate::events::{recode, Condition};
use crate::export::export_participant;
use crate::filter::{apply_fir_zero_phase, design_bandpass};
use crate::interpolate::interpolate_bads;
use crate::montage::Montage;
use crate::qlog::{
    percent, write_log_row, ArtifactLog, EpochLog, FilterLog, QualityLog, TimerLog,
};
use crate::quality::EpochCleaner;
use crate::recording::Recording;
use crate::reference::average_reference_picks_inplace;
use crate::resample::resample_epochs;
use crate::store::{participant_id, read_bad_channels, stage, StageStore};
use ndarray::Array2;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Terminal state of one participant's run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Full pipeline ran and export files were written.
    Exported,
    /// Quality gate left fewer correct-NoGo trials than the threshold;
    /// nothing exported. A data-exclusion outcome, not a failure.
    Excluded,
    /// A stage raised a fatal error for this participant.
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct ParticipantSummary {
    pub id: String,
    pub outcome: Outcome,
    pub duration: Duration,
}

pub struct Pipeline {
    cfg: PipelineConfig,
    store: StageStore,
    montage: Montage,
}

impl Pipeline {
    /// Load the shared montage and set up the stage store.
    pub fn new(cfg: PipelineConfig) -> anyhow::Result<Self> {
        let montage = Montage::from_sfp(&cfg.montage_path())?;
        Ok(Self::with_montage(cfg, montage))
    }

    /// Used by tests that construct the montage in memory.
    pub fn with_montage(cfg: PipelineConfig, montage: Montage) -> Self {
        let store = StageStore::new(cfg.tmp_dir());
        Self { cfg, store, montage }
    }

    pub fn store(&self) -> &StageStore {
        &self.store
    }

    /// Indices of the non-stimulus channels.
    fn eeg_picks(&self, rec: &Recording) -> Vec<usize> {
        (0..rec.n_channels())
            .filter(|&c| rec.ch_names[c] != self.cfg.stim_channel)
            .collect()
    }

    // ── Stages ───────────────────────────────────────────────────────────

    /// Drop the silent reference electrode and crop trailing silence.
    fn crop(&self, id: &str, input: &Path) -> Result<()> {
        let mut rec = StageStore::read_recording(input)?;
        if rec.ch_names.iter().any(|n| n == &self.cfg.reference_channel) {
            rec.drop_channel(&self.cfg.reference_channel)?;
        }
        rec.crop_after_last_event(&self.cfg.stim_channel, self.cfg.crop_margin)?;
        self.store.save_recording(id, stage::CROPPED, &rec)?;
        info!(id, samples = rec.n_samples(), "cropped");
        Ok(())
    }

    /// Two band-pass copies, bad-channel repair, common average reference.
    fn filter(&self, id: &str) -> Result<()> {
        let mut rec = self.store.load_recording(id, stage::CROPPED)?;
        let bads = read_bad_channels(&self.cfg.bad_channels_dir(), id)?;
        let n_interpolated = bads.len();
        let mut rec_ica = rec.clone();

        let picks = self.eeg_picks(&rec);
        let h_wide = design_bandpass(self.cfg.band.0, self.cfg.band.1, rec.sfreq);
        let h_narrow = design_bandpass(self.cfg.ica_band.0, self.cfg.ica_band.1, rec.sfreq);
        filter_picks(&mut rec.data, &h_wide, &picks)?;
        filter_picks(&mut rec_ica.data, &h_narrow, &picks)?;

        rec.bads = bads.clone();
        rec_ica.bads = bads;
        interpolate_bads(&mut rec, &self.montage)?;
        interpolate_bads(&mut rec_ica, &self.montage)?;

        average_reference_picks_inplace(&mut rec.data, &picks);
        average_reference_picks_inplace(&mut rec_ica.data, &picks);

        self.store.save_recording(id, stage::FILTERED, &rec)?;
        self.store.save_recording(id, stage::FILTERED_ICA, &rec_ica)?;

        write_log_row(
            &self.cfg.log_dir(),
            id,
            "filter",
            &FilterLog {
                id: id.to_string(),
                raw_highpass: self.cfg.band.0,
                raw_lowpass: self.cfg.band.1,
                ica_highpass: self.cfg.ica_band.0,
                ica_lowpass: self.cfg.ica_band.1,
                filter_method: "fir",
                filter_phase: "zero",
                fir_window: "hamming",
                fir_design: "firwin",
                num_bad_channels_interpolated: n_interpolated,
            },
        )?;
        info!(id, interpolated = n_interpolated, "filtered");
        Ok(())
    }

    /// Apply the precomputed decomposition to the analysis-band recording.
    /// The decomposition-quality copy is persisted for the external fitting
    /// step but never feeds the downstream stages.
    fn remove_artifacts(&self, id: &str) -> Result<()> {
        let mut rec = self.store.load_recording(id, stage::FILTERED)?;
        let ica_path = self.cfg.ica_dir().join(format!("{id}_ica.safetensors"));
        let ica = IcaDecomposition::load(&ica_path)?;
        self.apply_remover(&mut rec, &ica)?;
        self.store.save_recording(id, stage::CLEANED, &rec)?;

        write_log_row(
            &self.cfg.log_dir(),
            id,
            "ica",
            &ArtifactLog { id: id.to_string(), num_components_zeroed: ica.n_excluded() },
        )?;
        info!(id, excluded = ica.n_excluded(), "artifact components removed");
        Ok(())
    }

    /// Run a remover over the EEG channels only; the stimulus channel is
    /// carried through untouched so later stages can still read events.
    fn apply_remover(&self, rec: &mut Recording, remover: &dyn ArtifactRemover) -> Result<()> {
        let picks = self.eeg_picks(rec);
        let mut eeg_data = Array2::<f32>::zeros((picks.len(), rec.n_samples()));
        for (row, &c) in picks.iter().enumerate() {
            eeg_data.row_mut(row).assign(&rec.data.row(c));
        }
        let names: Vec<String> = picks.iter().map(|&c| rec.ch_names[c].clone()).collect();
        let mut eeg = Recording::new(eeg_data, rec.sfreq, names)?;
        remover.apply(&mut eeg)?;
        for (row, &c) in picks.iter().enumerate() {
            rec.data.row_mut(c).assign(&eeg.data.row(row));
        }
        Ok(())
    }

    /// Recode events, slice epochs, resample to the analysis rate.
    fn epoch(&self, id: &str) -> Result<()> {
        let rec = self.store.load_recording(id, stage::CLEANED)?;
        let events = rec.find_events(&self.cfg.stim_channel)?;
        let recoded = recode(&events)?;

        let mut set = extract_epochs(
            &rec,
            &recoded,
            self.cfg.epoch_window,
            self.cfg.baseline,
            self.cfg.flat_threshold,
            &self.cfg.stim_channel,
        )?;
        set.epochs = resample_epochs(&set.epochs, set.sfreq, self.cfg.epoch_sfreq)?;
        set.sfreq = self.cfg.epoch_sfreq;
        self.store.save_epochs(id, stage::EPOCHED, &set)?;

        write_log_row(
            &self.cfg.log_dir(),
            id,
            "epoch",
            &EpochLog {
                id: id.to_string(),
                num_correct_go_trials: set.count(Condition::GoCorrect),
                num_correct_nogo_trials: set.count(Condition::NogoCorrect),
                num_incorrect_nogo_trials: set.count(Condition::NogoIncorrect),
            },
        )?;
        info!(id, epochs = set.n_epochs(), "epoched");
        Ok(())
    }

    /// Statistical rejection/repair plus the minimum-trial gate. Returns
    /// whether the cleaned epochs were persisted.
    fn quality_gate(&self, id: &str, cleaner: &dyn EpochCleaner) -> Result<bool> {
        let set = self.store.load_epochs(id, stage::EPOCHED)?;
        let (cleaned, annotations) = cleaner.fit_transform(&set)?;

        let before = |c: Condition| set.count(c);
        let after = |c: Condition| cleaned.count(c);
        let persisted = after(Condition::NogoCorrect) >= self.cfg.min_nogo_correct;
        if persisted {
            self.store.save_epochs(id, stage::CLEANED_EPOCHED, &cleaned)?;
        }

        write_log_row(
            &self.cfg.log_dir(),
            id,
            "autoreject",
            &QualityLog {
                id: id.to_string(),
                num_correct_go_trials_after_rejection: after(Condition::GoCorrect),
                perc_correct_go_trials_after_rejection: percent(
                    after(Condition::GoCorrect),
                    before(Condition::GoCorrect),
                ),
                num_correct_nogo_trials_after_rejection: after(Condition::NogoCorrect),
                perc_correct_nogo_trials_after_rejection: percent(
                    after(Condition::NogoCorrect),
                    before(Condition::NogoCorrect),
                ),
                num_incorrect_nogo_trials_after_rejection: after(Condition::NogoIncorrect),
                perc_incorrect_nogo_trials_after_rejection: percent(
                    after(Condition::NogoIncorrect),
                    before(Condition::NogoIncorrect),
                ),
                perc_bad_and_rejected_channels: annotations.percent_bad(),
                perc_bad_and_interpolated_channels: annotations.percent_interpolated(),
                min_nogo_correct_threshold: self.cfg.min_nogo_correct,
                persisted,
            },
        )?;
        info!(
            id,
            kept = cleaned.n_epochs(),
            of = set.n_epochs(),
            persisted,
            "quality gate"
        );
        Ok(persisted)
    }

    // ── Per-participant driver ───────────────────────────────────────────

    /// Run every stage for one input file. Never panics or propagates:
    /// the returned summary is the only channel back to the batch.
    pub fn run_participant(&self, input: &Path, cleaner: &dyn EpochCleaner) -> ParticipantSummary {
        let id = participant_id(input);
        let started = Instant::now();
        let outcome = match self.run_stages(&id, input, cleaner) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(id = %id, error = %e, "participant failed");
                Outcome::Failed { reason: e.to_string() }
            }
        };
        let duration = started.elapsed();

        // The timer row is emitted whatever the outcome.
        let _ = write_log_row(
            &self.cfg.log_dir(),
            &id,
            "timer",
            &TimerLog {
                id: id.clone(),
                preprocessing_time_in_minutes: duration.as_secs_f64() / 60.0,
            },
        );
        info!(id = %id, ?outcome, secs = duration.as_secs_f64(), "participant done");
        ParticipantSummary { id, outcome, duration }
    }

    fn run_stages(
        &self,
        id: &str,
        input: &Path,
        cleaner: &dyn EpochCleaner,
    ) -> Result<Outcome> {
        self.crop(id, input)?;
        self.filter(id)?;
        self.remove_artifacts(id)?;
        self.epoch(id)?;
        if !self.quality_gate(id, cleaner)? {
            return Ok(Outcome::Excluded);
        }
        export_participant(
            &self.store,
            id,
            Condition::NogoCorrect,
            &self.cfg.averaged_dir(),
            &self.cfg.trials_dir(),
        )?;
        Ok(Outcome::Exported)
    }

    // ── Batch driver ─────────────────────────────────────────────────────

    /// Process every file in the input data directory over a worker pool.
    /// One participant per task, no shared mutable state; a failure in one
    /// task is captured in its summary and never aborts the rest.
    pub fn run_batch<C>(&self, cleaner: &C) -> anyhow::Result<Vec<ParticipantSummary>>
    where
        C: EpochCleaner + Sync,
    {
        let dir = self.cfg.input_data_dir();
        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)
            .map_err(|e| anyhow::anyhow!("listing {}: {e}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        info!(n = files.len(), jobs = self.cfg.jobs, "starting batch");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.cfg.jobs)
            .build()?;
        let summaries = pool.install(|| {
            files
                .par_iter()
                .map(|f| self.run_participant(f, cleaner))
                .collect()
        });
        Ok(summaries)
    }
}

/// Zero-phase filter the rows in `picks`, leaving other rows (the stimulus
/// channel) untouched.
fn filter_picks(data: &mut Array2<f32>, h: &[f32], picks: &[usize]) -> Result<()> {
    if picks.len() == data.nrows() {
        apply_fir_zero_phase(data, h).map_err(PipelineError::Store)?;
        return Ok(());
    }
    for &c in picks {
        let row: Vec<f32> = data.row(c).to_vec();
        let filtered = crate::filter::filter_1d(&row, h).map_err(PipelineError::Store)?;
        data.row_mut(c).assign(&ndarray::ArrayView1::from(&filtered));
    }
    Ok(())
}
