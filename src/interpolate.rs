//! Bad-channel repair by spatial interpolation.
//!
//! Each channel marked bad is replaced by an inverse-distance weighted
//! average of all good channels, using electrode positions from the shared
//! montage. Which channels are bad is an external, per-participant input;
//! this module only repairs them.

use crate::error::{PipelineError, Result};
use crate::montage::Montage;
use crate::recording::Recording;
use ndarray::Array1;

/// Interpolate every channel in `rec.bads` from the good channels, then
/// clear the bad set (the repaired channels are usable downstream).
///
/// No-op when the bad set is empty. Fails when a bad channel has no montage
/// position or no positioned good neighbors to draw from.
pub fn interpolate_bads(rec: &mut Recording, montage: &Montage) -> Result<()> {
    if rec.bads.is_empty() {
        return Ok(());
    }

    let good: Vec<String> = rec
        .ch_names
        .iter()
        .filter(|n| !rec.bads.contains(n) && montage.position(n).is_some())
        .cloned()
        .collect();
    if good.is_empty() {
        return Err(PipelineError::Shape(
            "no positioned good channels available for interpolation".into(),
        ));
    }
    let good_idx: Vec<usize> = good
        .iter()
        .map(|n| rec.channel_index(n))
        .collect::<Result<_>>()?;

    let bads = rec.bads.clone();
    for bad in &bads {
        let target = rec.channel_index(bad)?;
        let weights: Array1<f32> = montage
            .interpolation_weights(bad, &good)
            .ok_or_else(|| PipelineError::UnknownChannel(bad.clone()))?;

        let n_t = rec.n_samples();
        let mut estimate = Array1::<f32>::zeros(n_t);
        for (w, &src) in weights.iter().zip(good_idx.iter()) {
            if *w > 0.0 {
                estimate.scaled_add(*w, &rec.data.row(src));
            }
        }
        rec.data.row_mut(target).assign(&estimate);
    }

    rec.bads.clear();
    Ok(())
}
