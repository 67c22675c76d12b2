//! Per-participant, per-stage artifact persistence.
//!
//! Every stage reads its input from and writes its output to the store,
//! keyed by (participant ID, stage name). Files live under one directory
//! per stage and carry the participant ID as a filename prefix, so
//! concurrent participant tasks never touch the same path.

use crate::epoch::EpochSet;
use crate::error::{PipelineError, Result};
use crate::events::Condition;
use crate::io::{StReader, StWriter};
use crate::recording::Recording;
use anyhow::anyhow;
use std::path::{Path, PathBuf};

/// Stage names used as directory names under the store root.
pub mod stage {
    pub const CROPPED: &str = "cropped";
    pub const FILTERED: &str = "filtered";
    pub const FILTERED_ICA: &str = "filtered_ica";
    pub const CLEANED: &str = "cleaned";
    pub const EPOCHED: &str = "epoched";
    pub const CLEANED_EPOCHED: &str = "cleaned_epoched";
    pub const EVOKED: &str = "evoked";
}

/// Participant identifier: filename substring before the first underscore.
pub fn participant_id(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.split('_').next().unwrap_or(&name).to_string()
}

#[derive(Debug, Clone)]
pub struct StageStore {
    root: PathBuf,
}

impl StageStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn path(&self, id: &str, stage: &str) -> PathBuf {
        self.root.join(stage).join(format!("{id}_{stage}.safetensors"))
    }

    pub fn exists(&self, id: &str, stage: &str) -> bool {
        self.path(id, stage).exists()
    }

    pub fn save_recording(&self, id: &str, stage: &str, rec: &Recording) -> Result<()> {
        let mut w = StWriter::new();
        w.add_f32_arr2("data", &rec.data);
        w.add_f32("sfreq", &[rec.sfreq], &[1]);
        w.add_string_list("ch_names", &rec.ch_names);
        w.add_string_list("bads", &rec.bads);
        w.write(&self.path(id, stage))?;
        Ok(())
    }

    pub fn load_recording(&self, id: &str, stage: &str) -> Result<Recording> {
        Self::read_recording(&self.path(id, stage))
    }

    /// Read a recording container from an arbitrary path (raw input files
    /// are keyed by their full original filename, not by stage).
    pub fn read_recording(path: &Path) -> Result<Recording> {
        if !path.exists() {
            return Err(PipelineError::MissingInput(path.to_path_buf()));
        }
        let r = StReader::open(path)?;
        let data = r.f32_arr2("data")?;
        let sfreq = r.f32_scalar("sfreq")?;
        let ch_names = r.string_list("ch_names")?;
        let mut rec = Recording::new(data, sfreq, ch_names)?;
        if r.contains("bads") {
            rec.bads = r.string_list("bads")?;
        }
        Ok(rec)
    }

    pub fn save_epochs(&self, id: &str, stage: &str, set: &EpochSet) -> Result<()> {
        let mut w = StWriter::new();
        w.add_f32_arr3("epochs", &set.epochs);
        let codes: Vec<i32> = set.conditions.iter().map(|c| c.code()).collect();
        w.add_i32("conditions", &codes, &[codes.len()]);
        w.add_f32("sfreq", &[set.sfreq], &[1]);
        w.add_f32("tmin", &[set.tmin], &[1]);
        w.add_string_list("ch_names", &set.ch_names);
        w.write(&self.path(id, stage))?;
        Ok(())
    }

    pub fn load_epochs(&self, id: &str, stage: &str) -> Result<EpochSet> {
        let path = self.path(id, stage);
        if !path.exists() {
            return Err(PipelineError::MissingInput(path));
        }
        let r = StReader::open(&path)?;
        let epochs = r.f32_arr3("epochs")?;
        let conditions = r
            .i32_vec("conditions")?
            .iter()
            .map(|&code| {
                Condition::from_code(code)
                    .ok_or_else(|| PipelineError::Store(anyhow!("unknown condition code {code}")))
            })
            .collect::<Result<Vec<_>>>()?;
        if conditions.len() != epochs.dim().0 {
            return Err(PipelineError::Shape(format!(
                "{} condition labels for {} epochs",
                conditions.len(),
                epochs.dim().0
            )));
        }
        Ok(EpochSet {
            epochs,
            conditions,
            sfreq: r.f32_scalar("sfreq")?,
            tmin: r.f32_scalar("tmin")?,
            ch_names: r.string_list("ch_names")?,
        })
    }
}

/// Read the per-participant bad-channel list: one channel name per line,
/// possibly empty. A missing file is fatal for this participant.
pub fn read_bad_channels(dir: &Path, id: &str) -> Result<Vec<String>> {
    let path = dir.join(format!("{id}_bad_channels"));
    if !path.exists() {
        return Err(PipelineError::MissingInput(path));
    }
    let text = std::fs::read_to_string(&path)
        .map_err(|e| PipelineError::Store(anyhow!("reading {}: {e}", path.display())))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    #[test]
    fn participant_id_is_prefix_before_underscore() {
        assert_eq!(participant_id(Path::new("/in/sub01_task_raw.safetensors")), "sub01");
        assert_eq!(participant_id(Path::new("nounderscore.bin")), "nounderscore.bin");
    }

    #[test]
    fn recording_roundtrip_preserves_bads() {
        let dir = tempfile::tempdir().unwrap();
        let store = StageStore::new(dir.path().to_path_buf());
        let mut rec = Recording::new(
            Array2::from_elem((2, 8), 1.5_f32),
            250.0,
            vec!["E1".into(), "E2".into()],
        )
        .unwrap();
        rec.bads = vec!["E2".into()];
        store.save_recording("sub01", stage::CROPPED, &rec).unwrap();

        assert!(store.exists("sub01", stage::CROPPED));
        let back = store.load_recording("sub01", stage::CROPPED).unwrap();
        assert_eq!(back.data, rec.data);
        assert_eq!(back.sfreq, 250.0);
        assert_eq!(back.bads, vec!["E2".to_string()]);
    }

    #[test]
    fn epochs_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = StageStore::new(dir.path().to_path_buf());
        let set = EpochSet {
            epochs: Array3::from_elem((2, 3, 4), 0.5_f32),
            conditions: vec![Condition::GoCorrect, Condition::NogoCorrect],
            sfreq: 500.0,
            tmin: -0.2,
            ch_names: vec!["E1".into(), "E2".into(), "E3".into()],
        };
        store.save_epochs("sub02", stage::EPOCHED, &set).unwrap();
        let back = store.load_epochs("sub02", stage::EPOCHED).unwrap();
        assert_eq!(back.epochs, set.epochs);
        assert_eq!(back.conditions, set.conditions);
        assert_eq!(back.tmin, -0.2);
    }

    #[test]
    fn missing_artifact_is_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let store = StageStore::new(dir.path().to_path_buf());
        assert!(matches!(
            store.load_epochs("ghost", stage::EPOCHED),
            Err(PipelineError::MissingInput(_))
        ));
    }

    #[test]
    fn bad_channel_list_parsing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sub01_bad_channels"), "E7\nE23\n\n").unwrap();
        let bads = read_bad_channels(dir.path(), "sub01").unwrap();
        assert_eq!(bads, vec!["E7".to_string(), "E23".to_string()]);
        assert!(matches!(
            read_bad_channels(dir.path(), "sub02"),
            Err(PipelineError::MissingInput(_))
        ));
    }
}
