//! Event-locked epoch extraction.
//!
//! Slices the artifact-cleaned continuous recording into fixed windows
//! around every recoded event with a defined condition label, applies
//! baseline correction over the pre-stimulus window, and rejects epochs
//! containing a flat (disconnected) channel. Retained epochs are resampled
//! to the fixed analysis rate by the caller via
//! [`crate::resample::resample_epochs`].

use crate::error::{PipelineError, Result};
use crate::events::{Condition, RecodedEventStream};
use crate::recording::Recording;
use ndarray::{s, Array3};

/// A participant's epochs: `[E, C, T]` stack with one condition label per
/// epoch. Per-condition queries on an absent condition return zero epochs,
/// never an error.
#[derive(Debug, Clone)]
pub struct EpochSet {
    pub epochs: Array3<f32>,
    pub conditions: Vec<Condition>,
    pub sfreq: f32,
    /// Window start relative to event onset, seconds (negative).
    pub tmin: f32,
    pub ch_names: Vec<String>,
}

impl EpochSet {
    pub fn n_epochs(&self) -> usize {
        self.conditions.len()
    }

    pub fn n_channels(&self) -> usize {
        self.epochs.dim().1
    }

    pub fn n_times(&self) -> usize {
        self.epochs.dim().2
    }

    pub fn count(&self, cond: Condition) -> usize {
        self.conditions.iter().filter(|&&c| c == cond).count()
    }

    /// Indices of epochs belonging to `cond` (possibly empty).
    pub fn condition_indices(&self, cond: Condition) -> Vec<usize> {
        self.conditions
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == cond)
            .map(|(i, _)| i)
            .collect()
    }

    /// New set containing only the epochs at `indices`, in order.
    pub fn subset(&self, indices: &[usize]) -> EpochSet {
        let (_, n_c, n_t) = self.epochs.dim();
        let mut epochs = Array3::<f32>::zeros((indices.len(), n_c, n_t));
        let mut conditions = Vec::with_capacity(indices.len());
        for (row, &i) in indices.iter().enumerate() {
            epochs.slice_mut(s![row, .., ..]).assign(&self.epochs.slice(s![i, .., ..]));
            conditions.push(self.conditions[i]);
        }
        EpochSet {
            epochs,
            conditions,
            sfreq: self.sfreq,
            tmin: self.tmin,
            ch_names: self.ch_names.clone(),
        }
    }
}

/// Extract epochs around every defined-condition event.
///
/// `window` and `baseline` are in seconds relative to event onset. The
/// stimulus channel is excluded from the epoch channel set. Epochs whose
/// window falls outside the recording are skipped; epochs where any
/// channel's peak-to-peak amplitude is below `flat_threshold` are rejected
/// (dead-channel artifact).
pub fn extract_epochs(
    rec: &Recording,
    events: &RecodedEventStream,
    window: (f32, f32),
    baseline: (f32, f32),
    flat_threshold: f32,
    stim_channel: &str,
) -> Result<EpochSet> {
    let (tmin, tmax) = window;
    if tmax <= tmin {
        return Err(PipelineError::Shape(format!(
            "epoch window ({tmin}, {tmax}) is empty"
        )));
    }
    let sfreq = rec.sfreq;
    let first = (tmin * sfreq).round() as isize;
    let last = (tmax * sfreq).round() as isize;
    let n_win = (last - first + 1) as usize;

    // Baseline sample range within the window, inclusive.
    let b_start = (((baseline.0 * sfreq).round() as isize) - first).max(0) as usize;
    let b_end = ((((baseline.1 * sfreq).round() as isize) - first) as usize).min(n_win - 1);

    let picks: Vec<usize> = (0..rec.n_channels())
        .filter(|&c| rec.ch_names[c] != stim_channel)
        .collect();
    let ch_names: Vec<String> = picks.iter().map(|&c| rec.ch_names[c].clone()).collect();

    let mut kept: Vec<(Condition, Vec<f32>)> = Vec::new();
    let n_t = rec.n_samples() as isize;

    for (cond, event) in events.condition_events() {
        let start = event.sample as isize + first;
        let stop = event.sample as isize + last;
        if start < 0 || stop >= n_t {
            continue;
        }

        let mut buf = vec![0.0_f32; picks.len() * n_win];
        let mut flat = false;
        for (row, &c) in picks.iter().enumerate() {
            let seg = rec.data.slice(s![c, start as usize..=stop as usize]);
            let bmean: f32 =
                seg.slice(s![b_start..=b_end]).mean().unwrap_or(0.0);
            let dst = &mut buf[row * n_win..(row + 1) * n_win];
            let (mut lo, mut hi) = (f32::INFINITY, f32::NEG_INFINITY);
            for (d, &v) in dst.iter_mut().zip(seg.iter()) {
                let corrected = v - bmean;
                *d = corrected;
                lo = lo.min(corrected);
                hi = hi.max(corrected);
            }
            if hi - lo < flat_threshold {
                flat = true;
                break;
            }
        }
        if !flat {
            kept.push((cond, buf));
        }
    }

    let n_e = kept.len();
    let mut epochs = Array3::<f32>::zeros((n_e, picks.len(), n_win));
    let mut conditions = Vec::with_capacity(n_e);
    for (e, (cond, buf)) in kept.into_iter().enumerate() {
        for row in 0..picks.len() {
            epochs
                .slice_mut(s![e, row, ..])
                .assign(&ndarray::ArrayView1::from(&buf[row * n_win..(row + 1) * n_win]));
        }
        conditions.push(cond);
    }

    Ok(EpochSet { epochs, conditions, sfreq, tmin, ch_names })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{recode, Event, EventStream};
    use ndarray::Array2;

    /// 3 EEG channels + stim, 100 Hz, sine carriers well above the flat
    /// threshold, with a go/response/nogo code layout.
    fn fixture() -> (Recording, RecodedEventStream) {
        let n_t = 2000;
        let mut data = Array2::<f32>::zeros((4, n_t));
        for c in 0..3 {
            for t in 0..n_t {
                data[[c, t]] = 20e-6 * ((t as f32 / 7.0) + c as f32).sin();
            }
        }
        // responses=1 (x5), go=2 (x4), nogo=3 (x2)
        let samples_codes = [
            (100, 2), (110, 1), (300, 2), (310, 1), (500, 3), (600, 2),
            (610, 1), (800, 3), (900, 1), (1100, 2), (1110, 1),
        ];
        for &(s, code) in &samples_codes {
            data[[3, s]] = code as f32;
        }
        let rec = Recording::new(
            data,
            100.0,
            vec!["E1".into(), "E2".into(), "E3".into(), "STI 014".into()],
        )
        .unwrap();
        let events = EventStream::new(
            samples_codes
                .iter()
                .map(|&(sample, code)| Event { sample, code })
                .collect(),
        );
        let recoded = recode(&events).unwrap();
        (rec, recoded)
    }

    #[test]
    fn epochs_extracted_per_condition_without_stim_channel() {
        let (rec, recoded) = fixture();
        let set = extract_epochs(&rec, &recoded, (-0.2, 0.8), (-0.2, 0.0), 5e-6, "STI 014")
            .unwrap();
        // go-correct at 100, 300, 600, 1100; nogo-correct at 500;
        // nogo-incorrect at 900 (response right after the nogo at 800).
        assert_eq!(set.count(Condition::GoCorrect), 4);
        assert_eq!(set.count(Condition::NogoCorrect), 1);
        assert_eq!(set.count(Condition::NogoIncorrect), 1);
        assert_eq!(set.n_channels(), 3);
        // [-0.2, 0.8] s at 100 Hz → 101 samples.
        assert_eq!(set.n_times(), 101);
    }

    #[test]
    fn baseline_window_mean_is_zero() {
        let (rec, recoded) = fixture();
        let set = extract_epochs(&rec, &recoded, (-0.2, 0.8), (-0.2, 0.0), 5e-6, "STI 014")
            .unwrap();
        // Baseline occupies the first 21 samples of each epoch.
        for e in 0..set.n_epochs() {
            for c in 0..set.n_channels() {
                let m = set.epochs.slice(s![e, c, ..21]).mean().unwrap();
                approx::assert_abs_diff_eq!(m, 0.0, epsilon = 1e-9_f32);
            }
        }
    }

    #[test]
    fn flat_channel_rejects_epoch() {
        let (mut rec, recoded) = fixture();
        // Silence one EEG channel entirely: every epoch is now flat there.
        rec.data.row_mut(1).fill(0.0);
        let set = extract_epochs(&rec, &recoded, (-0.2, 0.8), (-0.2, 0.0), 5e-6, "STI 014")
            .unwrap();
        assert_eq!(set.n_epochs(), 0);
    }

    #[test]
    fn out_of_bounds_window_skipped() {
        let (rec, recoded) = fixture();
        // A 12 s window only fits events ending before sample 2000, i.e.
        // onsets ≤ 799: the labeled events at 100/300/500/600. The labeled
        // events at 900 and 1100 are skipped, not errors.
        let set = extract_epochs(&rec, &recoded, (-0.2, 12.0), (-0.2, 0.0), 5e-6, "STI 014")
            .unwrap();
        assert_eq!(set.n_epochs(), 4);
    }

    #[test]
    fn absent_condition_queries_return_empty() {
        let (rec, recoded) = fixture();
        let set = extract_epochs(&rec, &recoded, (-0.2, 0.8), (-0.2, 0.0), 5e-6, "STI 014")
            .unwrap();
        let only_go = set.subset(&set.condition_indices(Condition::GoCorrect));
        assert_eq!(only_go.count(Condition::NogoIncorrect), 0);
        assert!(only_go.condition_indices(Condition::NogoIncorrect).is_empty());
    }
}
