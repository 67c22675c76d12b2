//! Common average reference.
//!
//! Subtracts the mean across channels at each time point, matching
//! `raw.set_eeg_reference('average', projection=False)`:
//! `data[c, t] -= mean(data[:, t])`. Applied after bad-channel repair so
//! interpolated channels contribute to the reference.

use ndarray::{Array2, Axis};

pub fn average_reference_inplace(data: &mut Array2<f32>) {
    let means = data.mean_axis(Axis(0)).unwrap_or_default(); // shape [T]
    for mut row in data.rows_mut() {
        row -= &means;
    }
}

/// Average reference restricted to the rows in `picks` (the EEG channels);
/// other rows, e.g. the stimulus channel, are left untouched and do not
/// contribute to the reference.
pub fn average_reference_picks_inplace(data: &mut Array2<f32>, picks: &[usize]) {
    if picks.is_empty() {
        return;
    }
    let n_t = data.ncols();
    let mut means = ndarray::Array1::<f32>::zeros(n_t);
    for &c in picks {
        means += &data.row(c);
    }
    means.mapv_inplace(|v| v / picks.len() as f32);
    for &c in picks {
        let mut row = data.row_mut(c);
        row -= &means;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn channel_sum_is_zero_after_reference() {
        let mut data = Array2::from_shape_fn((8, 512), |(c, t)| {
            ((c * 7 + t * 3) as f32).sin()
        });
        average_reference_inplace(&mut data);
        let col_sums = data.sum_axis(Axis(0));
        for &s in col_sums.iter() {
            approx::assert_abs_diff_eq!(s, 0.0, epsilon = 1e-4_f32);
        }
    }

    #[test]
    fn picked_reference_leaves_other_rows_untouched() {
        let mut data = Array2::from_shape_fn((3, 6), |(c, _)| c as f32 + 1.0);
        average_reference_picks_inplace(&mut data, &[0, 1]);
        // mean of rows 0 and 1 is 1.5; row 2 (stim) must stay 3.0.
        for t in 0..6 {
            approx::assert_abs_diff_eq!(data[[0, t]], -0.5_f32, epsilon = 1e-6);
            approx::assert_abs_diff_eq!(data[[1, t]], 0.5_f32, epsilon = 1e-6);
            approx::assert_abs_diff_eq!(data[[2, t]], 3.0_f32, epsilon = 1e-6);
        }
    }

    #[test]
    fn reference_preserves_channel_differences() {
        let mut data =
            Array2::from_shape_fn((2, 10), |(c, _)| if c == 0 { 2.0_f32 } else { 4.0 });
        average_reference_inplace(&mut data);
        for t in 0..10 {
            approx::assert_abs_diff_eq!(data[[0, t]] - data[[1, t]], -2.0_f32, epsilon = 1e-6);
        }
    }
}
