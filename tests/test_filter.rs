//! Band-pass filtering and resampling properties on synthetic signals.

mod common;

use gonogo_erp::filter::{apply_fir_zero_phase, design_bandpass, filter_1d};
use gonogo_erp::resample::resample_epochs;
use gonogo_erp::Recording;
use ndarray::{Array2, Array3};
use std::f32::consts::PI;

#[test]
fn band_pass_keeps_in_band_and_rejects_out_of_band() {
    // DC + 10 Hz (in band) + 50 Hz (out of band) at 250 Hz.
    let sfreq = 250.0_f32;
    let n = 8192;
    let x: Vec<f32> = (0..n)
        .map(|t| {
            let t = t as f32 / sfreq;
            2.0 + (2.0 * PI * 10.0 * t).sin() + (2.0 * PI * 50.0 * t).sin()
        })
        .collect();

    let h = design_bandpass(1.0, 30.0, sfreq);
    assert_eq!(h.len() % 2, 1, "kernel must be odd for zero phase");
    let y = filter_1d(&x, &h).unwrap();

    // Compare against the pure 10 Hz component away from the edges.
    let margin = h.len();
    let mut max_err = 0.0_f32;
    for t in margin..n - margin {
        let want = (2.0 * PI * 10.0 * t as f32 / sfreq).sin();
        max_err = max_err.max((y[t] - want).abs());
    }
    assert!(max_err < 0.05, "in-band distortion too large: {max_err}");
}

#[test]
fn crop_and_filter_preserve_shape_and_never_grow_duration() {
    let sfreq = 250.0_f32;
    let n_t = 6000;
    let mut data = Array2::from_shape_fn((4, n_t), |(c, t)| {
        50e-6 * (2.0 * PI * (8 + c) as f32 * t as f32 / sfreq).sin()
    });
    // Stimulus channel with one event at 8 s; 16 s of trailing silence.
    for t in 0..n_t {
        data[[3, t]] = 0.0;
    }
    data[[3, 2000]] = 2.0;

    let mut rec = Recording::new(
        data,
        sfreq,
        vec!["E1".into(), "E2".into(), "E129".into(), "STI 014".into()],
    )
    .unwrap();
    let input_duration = rec.duration();

    rec.drop_channel("E129").unwrap();
    rec.crop_after_last_event("STI 014", 1.0).unwrap();
    let h = design_bandpass(1.0, 30.0, sfreq);
    apply_fir_zero_phase(&mut rec.data, &h).unwrap();

    assert_eq!(rec.n_channels(), 3); // one reference channel gone, no more
    assert!(rec.duration() <= input_duration);
    assert!((rec.duration() - 9.0).abs() < 0.1); // event at 8 s + 1 s margin
}

#[test]
fn epoch_resampling_doubles_the_time_axis() {
    let epochs = Array3::from_shape_fn((3, 2, 251), |(_, c, t)| {
        (2.0 * PI * (5 + c) as f32 * t as f32 / 250.0).sin()
    });
    let out = resample_epochs(&epochs, 250.0, 500.0).unwrap();
    assert_eq!(out.dim(), (3, 2, 502));

    // Even output samples line up with the original grid.
    let mut max_err = 0.0_f32;
    for t in 40..211 {
        max_err = max_err.max((out[[0, 0, 2 * t]] - epochs[[0, 0, t]]).abs());
    }
    assert!(max_err < 0.05, "resampled grid drifted: {max_err}");
}

#[test]
fn same_rate_resampling_is_identity() {
    let epochs = Array3::from_elem((2, 2, 100), 1.25_f32);
    let out = resample_epochs(&epochs, 500.0, 500.0).unwrap();
    assert_eq!(out, epochs);
}
