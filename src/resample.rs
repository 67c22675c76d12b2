//! FFT-based resampler (MNE `resample(..., method='fft')` semantics).
//!
//! Used to bring retained epochs down to the fixed analysis rate
//! (500 Hz by default). Per 1-D signal:
//!   1. reflect-limited padding to the next power of two,
//!   2. rfft → half-spectrum,
//!   3. Nyquist-bin compensation (double when shortening, halve when
//!      lengthening) and a `new_len / old_len` scale,
//!   4. irfft at the target length (spectrum truncation or zero-fill),
//!   5. strip the resampled padding.
use anyhow::Result;
use ndarray::{s, Array2, Array3};
use rustfft::{num_complex::Complex, FftPlanner};

/// Padding split matching MNE's auto npad: pad the total length to the next
/// power of two, split evenly.
pub fn auto_npad(n: usize) -> (usize, usize) {
    let min_add = (n / 8).min(100) * 2;
    let sum = n + min_add;
    let next_pow2 = 1usize << ((sum as f64).log2().ceil() as u32);
    let total = next_pow2 - n;
    (total / 2, total - total / 2)
}

/// Resample an epoch stack `[E, C, T]` to `dst_sfreq`, channel by channel.
pub fn resample_epochs(
    epochs: &Array3<f32>,
    src_sfreq: f32,
    dst_sfreq: f32,
) -> Result<Array3<f32>> {
    if (src_sfreq - dst_sfreq).abs() < 1e-6 {
        return Ok(epochs.clone());
    }
    let (n_e, n_c, n_t) = epochs.dim();
    let ratio = dst_sfreq as f64 / src_sfreq as f64;
    let final_len = (ratio * n_t as f64).round() as usize;
    let (npad_l, npad_r) = auto_npad(n_t);

    let mut out = Array3::<f32>::zeros((n_e, n_c, final_len));
    for e in 0..n_e {
        for c in 0..n_c {
            let sig: Vec<f32> = epochs.slice(s![e, c, ..]).to_vec();
            let resampled = resample_1d(&sig, ratio, npad_l, npad_r)?;
            out.slice_mut(s![e, c, ..])
                .assign(&ndarray::ArrayView1::from(&resampled));
        }
    }
    Ok(out)
}

/// Resample one 1-D signal with explicit (possibly asymmetric) padding.
pub fn resample_1d(x: &[f32], ratio: f64, npad_l: usize, npad_r: usize) -> Result<Vec<f32>> {
    let n_in = x.len();
    if n_in == 0 {
        return Ok(vec![]);
    }
    let final_len = (ratio * n_in as f64).round() as usize;

    // Reflect-limited padding; requested padding beyond n−1 is clamped.
    let pad_l = npad_l.min(n_in - 1);
    let pad_r = npad_r.min(n_in - 1);
    let old_len = n_in + pad_l + pad_r;

    let mut x_ext = Vec::with_capacity(old_len);
    for i in (1..=pad_l).rev() {
        x_ext.push(2.0 * x[0] - x[i]);
    }
    x_ext.extend_from_slice(x);
    let last = x[n_in - 1];
    for i in 1..=pad_r {
        let idx = (n_in - 1).saturating_sub(i);
        x_ext.push(2.0 * last - x[idx]);
    }

    let new_len_padded = (ratio * old_len as f64).round() as usize;
    let shorter = new_len_padded < old_len;
    let use_len = if shorter { new_len_padded } else { old_len };

    // rfft simulated with a full FFT, first half kept.
    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let fft = planner.plan_fft_forward(old_len);
    let mut buf: Vec<Complex<f64>> = x_ext
        .iter()
        .map(|&v| Complex { re: v as f64, im: 0.0 })
        .collect();
    fft.process(&mut buf);

    let rfft_len = old_len / 2 + 1;
    let mut x_fft: Vec<Complex<f64>> = buf[..rfft_len].to_vec();

    // Nyquist-bin compensation.
    if use_len % 2 == 0 {
        let nyq = use_len / 2;
        if nyq < x_fft.len() {
            x_fft[nyq] *= if shorter { 2.0 } else { 0.5 };
        }
    }

    let scale = new_len_padded as f64 / old_len as f64;
    for v in &mut x_fft {
        *v *= scale;
    }

    // irfft at the padded target length: truncates high frequencies when
    // shortening, zero-fills when lengthening.
    let new_rfft_len = new_len_padded / 2 + 1;
    let mut irfft_in = vec![Complex::<f64>::default(); new_len_padded];
    let n_copy = x_fft.len().min(new_rfft_len);
    irfft_in[..n_copy].copy_from_slice(&x_fft[..n_copy]);
    for i in 1..new_rfft_len {
        let idx = new_len_padded - i;
        if idx < new_len_padded && idx >= new_rfft_len {
            irfft_in[idx] = irfft_in[i].conj();
        }
    }

    let ifft = planner.plan_fft_inverse(new_len_padded);
    ifft.process(&mut irfft_in);
    let inv_scale = 1.0 / new_len_padded as f64;

    let to_remove_l = (ratio * pad_l as f64).round() as usize;
    let to_remove_r = new_len_padded.saturating_sub(final_len + to_remove_l);
    let strip_end = new_len_padded.saturating_sub(to_remove_r);

    let mut result: Vec<f32> = irfft_in[to_remove_l.min(strip_end)..strip_end]
        .iter()
        .map(|c| (c.re * inv_scale) as f32)
        .collect();
    result.resize(final_len, 0.0);
    Ok(result)
}
