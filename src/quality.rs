//! Statistical epoch rejection and repair.
//!
//! The quality gate runs an automated per-epoch, per-channel annotation
//! pass: each cell ends up Good, Bad, or Interpolated. Epochs with a small
//! number of bad cells are repaired by spatial interpolation; epochs with
//! more are dropped. The procedure sits behind the [`EpochCleaner`] trait so
//! the pipeline can be exercised with a deterministic stub.

use crate::epoch::EpochSet;
use crate::error::{PipelineError, Result};
use crate::montage::Montage;
use ndarray::{s, Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Per-cell annotation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Good,
    Bad,
    Interpolated,
}

/// Write-once annotation grid over the ORIGINAL epoch set, plus the indices
/// of the epochs that survived.
#[derive(Debug, Clone)]
pub struct QualityAnnotations {
    /// `[E_before, C]` cell states.
    pub labels: Vec<Vec<CellState>>,
    /// Indices (into the original set) of retained epochs.
    pub kept: Vec<usize>,
}

impl QualityAnnotations {
    fn percent(&self, state: CellState) -> f64 {
        let total: usize = self.labels.iter().map(|r| r.len()).sum();
        if total == 0 {
            return 0.0;
        }
        let n = self
            .labels
            .iter()
            .flat_map(|r| r.iter())
            .filter(|&&c| c == state)
            .count();
        n as f64 / total as f64 * 100.0
    }

    /// Percent of all (epoch, channel) cells marked bad and rejected.
    pub fn percent_bad(&self) -> f64 {
        self.percent(CellState::Bad)
    }

    /// Percent of all (epoch, channel) cells repaired by interpolation.
    pub fn percent_interpolated(&self) -> f64 {
        self.percent(CellState::Interpolated)
    }
}

/// Seam over the cross-validated rejection/repair procedure.
pub trait EpochCleaner {
    fn fit_transform(&self, epochs: &EpochSet) -> Result<(EpochSet, QualityAnnotations)>;
}

/// Stub cleaner that keeps every epoch untouched. Used to exercise the
/// pipeline independently of the statistical procedure.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCleaner;

impl EpochCleaner for NoopCleaner {
    fn fit_transform(&self, epochs: &EpochSet) -> Result<(EpochSet, QualityAnnotations)> {
        let ann = QualityAnnotations {
            labels: vec![vec![CellState::Good; epochs.n_channels()]; epochs.n_epochs()],
            kept: (0..epochs.n_epochs()).collect(),
        };
        Ok((epochs.clone(), ann))
    }
}

/// Cross-validated peak-to-peak cleaner.
///
/// Per channel, a rejection threshold is picked from candidate quantiles of
/// the observed peak-to-peak distribution by K-fold cross-validation: for
/// each candidate, the mean over the training epochs kept under that
/// threshold is scored against the per-timepoint median of the validation
/// epochs (a robust target), and the candidate with the lowest error wins.
/// Cells above their channel threshold are Bad; an epoch with at most
/// `n_interpolate` bad cells has those channels rebuilt from spatial
/// neighbors (Interpolated) and is retained, otherwise it is dropped.
///
/// Deterministic given `seed`.
#[derive(Debug, Clone)]
pub struct PtpCleaner {
    montage: Montage,
    pub cv: usize,
    pub n_interpolate: usize,
    pub seed: u64,
}

impl PtpCleaner {
    pub fn new(montage: Montage, cv: usize, n_interpolate: usize, seed: u64) -> Self {
        Self { montage, cv, n_interpolate, seed }
    }

    /// Candidate thresholds: quantiles of the sorted ptp values.
    const QUANTILES: [f64; 6] = [0.5, 0.6, 0.7, 0.8, 0.9, 1.0];

    fn channel_threshold(&self, ptps: &[f32], signals: &Array2<f32>, folds: &[Vec<usize>]) -> f32 {
        let mut sorted = ptps.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let candidates: Vec<f32> = Self::QUANTILES
            .iter()
            .map(|&q| {
                let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
                sorted[idx]
            })
            .collect();

        let n_t = signals.ncols();
        let mut best = (f64::INFINITY, *sorted.last().unwrap_or(&f32::INFINITY));
        for &cand in &candidates {
            let mut err_total = 0.0_f64;
            for fold in folds {
                let train: Vec<usize> = (0..ptps.len()).filter(|i| !fold.contains(i)).collect();
                let kept: Vec<usize> =
                    train.iter().copied().filter(|&i| ptps[i] <= cand).collect();
                if kept.is_empty() || fold.is_empty() {
                    err_total += f64::INFINITY;
                    continue;
                }
                // Train mean under the candidate threshold.
                let mut mean = Array1::<f64>::zeros(n_t);
                for &i in &kept {
                    for (m, &v) in mean.iter_mut().zip(signals.row(i).iter()) {
                        *m += v as f64;
                    }
                }
                mean.mapv_inplace(|v| v / kept.len() as f64);
                // Validation target: per-timepoint median over the fold.
                let mut col = Vec::with_capacity(fold.len());
                let mut err = 0.0_f64;
                for t in 0..n_t {
                    col.clear();
                    col.extend(fold.iter().map(|&i| signals[[i, t]] as f64));
                    col.sort_by(|a, b| a.total_cmp(b));
                    let median = col[col.len() / 2];
                    let d = mean[t] - median;
                    err += d * d;
                }
                err_total += (err / n_t as f64).sqrt();
            }
            if err_total < best.0 {
                best = (err_total, cand);
            }
        }
        best.1
    }
}

impl EpochCleaner for PtpCleaner {
    fn fit_transform(&self, epochs: &EpochSet) -> Result<(EpochSet, QualityAnnotations)> {
        let (n_e, n_c, n_t) = epochs.epochs.dim();
        if n_e == 0 {
            return Ok((
                epochs.clone(),
                QualityAnnotations { labels: vec![], kept: vec![] },
            ));
        }

        // Deterministic fold assignment.
        let mut order: Vec<usize> = (0..n_e).collect();
        let mut rng = rand::rngs::StdRng::seed_from_u64(self.seed);
        order.shuffle(&mut rng);
        let n_folds = self.cv.clamp(2, n_e);
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_folds];
        for (i, &e) in order.iter().enumerate() {
            folds[i % n_folds].push(e);
        }

        // Per-channel thresholds.
        let mut thresholds = vec![0.0_f32; n_c];
        for c in 0..n_c {
            let mut ptps = vec![0.0_f32; n_e];
            let mut signals = Array2::<f32>::zeros((n_e, n_t));
            for e in 0..n_e {
                let seg = epochs.epochs.slice(s![e, c, ..]);
                let (mut lo, mut hi) = (f32::INFINITY, f32::NEG_INFINITY);
                for &v in seg.iter() {
                    lo = lo.min(v);
                    hi = hi.max(v);
                }
                ptps[e] = hi - lo;
                signals.row_mut(e).assign(&seg);
            }
            thresholds[c] = self.channel_threshold(&ptps, &signals, &folds);
        }

        // Annotate cells and decide per-epoch fate.
        let mut labels = vec![vec![CellState::Good; n_c]; n_e];
        let mut kept_idx = Vec::new();
        let mut repaired = epochs.epochs.clone();
        for e in 0..n_e {
            let mut bad_chs = Vec::new();
            for c in 0..n_c {
                let seg = epochs.epochs.slice(s![e, c, ..]);
                let (mut lo, mut hi) = (f32::INFINITY, f32::NEG_INFINITY);
                for &v in seg.iter() {
                    lo = lo.min(v);
                    hi = hi.max(v);
                }
                if hi - lo > thresholds[c] {
                    labels[e][c] = CellState::Bad;
                    bad_chs.push(c);
                }
            }
            if bad_chs.is_empty() {
                kept_idx.push(e);
                continue;
            }
            if bad_chs.len() > self.n_interpolate {
                continue; // epoch dropped; cells stay Bad
            }
            // Repair: rebuild each bad channel from positioned good ones.
            let good: Vec<String> = (0..n_c)
                .filter(|c| !bad_chs.contains(c))
                .filter(|&c| self.montage.position(&epochs.ch_names[c]).is_some())
                .map(|c| epochs.ch_names[c].clone())
                .collect();
            if good.is_empty() {
                return Err(PipelineError::Shape(
                    "no positioned good channels left to repair an epoch".into(),
                ));
            }
            let good_rows: Vec<usize> = good
                .iter()
                .map(|n| epochs.ch_names.iter().position(|x| x == n).unwrap_or(0))
                .collect();
            let mut repair_failed = false;
            for (i, &c) in bad_chs.iter().enumerate() {
                let Some(w) =
                    self.montage.interpolation_weights(&epochs.ch_names[c], &good)
                else {
                    // No position for this channel: the whole epoch is
                    // dropped, so channels already rebuilt in it revert
                    // to Bad.
                    for &b in &bad_chs[..i] {
                        labels[e][b] = CellState::Bad;
                    }
                    repair_failed = true;
                    break;
                };
                let mut estimate = Array1::<f32>::zeros(n_t);
                for (wi, &src) in w.iter().zip(good_rows.iter()) {
                    if *wi > 0.0 {
                        estimate.scaled_add(*wi, &epochs.epochs.slice(s![e, src, ..]));
                    }
                }
                repaired.slice_mut(s![e, c, ..]).assign(&estimate);
                labels[e][c] = CellState::Interpolated;
            }
            if !repair_failed {
                kept_idx.push(e);
            }
        }

        let mut cleaned = epochs.clone();
        cleaned.epochs = repaired;
        let cleaned = cleaned.subset(&kept_idx);
        Ok((cleaned, QualityAnnotations { labels, kept: kept_idx }))
    }
}
