//! Component-based artifact removal.
//!
//! The decomposition itself (ICA fitting and component labeling) is an
//! external, precomputed input; this module only *applies* one. The trait
//! seam keeps the pipeline testable with a deterministic stub.

use crate::error::{PipelineError, Result};
use crate::io::StReader;
use crate::recording::Recording;
use ndarray::Array2;
use std::path::Path;

/// Narrow seam over "reconstruct the signal without artifact components".
pub trait ArtifactRemover {
    /// Rewrite `rec.data` with the flagged components zeroed.
    fn apply(&self, rec: &mut Recording) -> Result<()>;

    /// Number of components that will be zeroed.
    fn n_excluded(&self) -> usize;
}

/// Precomputed ICA decomposition with a flagged exclusion set.
///
/// Stored as a tensor container holding `mixing [C, K]`, `unmixing [K, C]`
/// and `exclude [n] i32` (component indices to zero).
#[derive(Debug, Clone)]
pub struct IcaDecomposition {
    pub mixing: Array2<f32>,
    pub unmixing: Array2<f32>,
    pub exclude: Vec<usize>,
}

impl IcaDecomposition {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::MissingInput(path.to_path_buf()));
        }
        let r = StReader::open(path)?;
        let mixing = r.f32_arr2("mixing")?;
        let unmixing = r.f32_arr2("unmixing")?;
        let exclude: Vec<usize> = r.i32_vec("exclude")?.iter().map(|&v| v as usize).collect();

        if mixing.ncols() != unmixing.nrows() || mixing.nrows() != unmixing.ncols() {
            return Err(PipelineError::Shape(format!(
                "mixing {:?} does not invert unmixing {:?}",
                mixing.dim(),
                unmixing.dim()
            )));
        }
        if let Some(&bad) = exclude.iter().find(|&&k| k >= mixing.ncols()) {
            return Err(PipelineError::Shape(format!(
                "excluded component {bad} out of range (K = {})",
                mixing.ncols()
            )));
        }
        Ok(Self { mixing, unmixing, exclude })
    }
}

impl ArtifactRemover for IcaDecomposition {
    /// Subtract the flagged components' contribution:
    /// `data -= mixing[:, excl] · (unmixing[excl, :] · data)`.
    fn apply(&self, rec: &mut Recording) -> Result<()> {
        if rec.n_channels() != self.mixing.nrows() {
            return Err(PipelineError::Shape(format!(
                "decomposition fitted on {} channels, recording has {}",
                self.mixing.nrows(),
                rec.n_channels()
            )));
        }
        if self.exclude.is_empty() {
            return Ok(());
        }

        let k = self.exclude.len();
        let n_c = rec.n_channels();
        let mut unmix_excl = Array2::<f32>::zeros((k, n_c));
        let mut mix_excl = Array2::<f32>::zeros((n_c, k));
        for (row, &comp) in self.exclude.iter().enumerate() {
            unmix_excl.row_mut(row).assign(&self.unmixing.row(comp));
            mix_excl.column_mut(row).assign(&self.mixing.column(comp));
        }

        let sources = unmix_excl.dot(&rec.data); // [k, T]
        let artifact = mix_excl.dot(&sources); // [C, T]
        rec.data -= &artifact;
        Ok(())
    }

    fn n_excluded(&self) -> usize {
        self.exclude.len()
    }
}
