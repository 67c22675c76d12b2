//! Windowed-sinc band-pass FIR design.
//!
//! Follows the MNE/scipy `firwin` conventions used for zero-phase FIR
//! filtering of continuous EEG:
//!   • transition bandwidth at each edge f: min(max(0.25·f, 2.0), f)
//!   • filter length N = ceil(3.3 / min(tb_lo, tb_hi) · sfreq), rounded odd
//!   • band-pass kernel = lowpass(upper cutoff) − lowpass(lower cutoff),
//!     each a Hamming-windowed sinc with unit DC gain.
use std::f64::consts::PI;

/// Transition bandwidth for a band edge at `freq` Hz.
///
/// Rule: `min(max(0.25 * freq, 2.0), freq)`.
pub fn auto_trans_bandwidth(freq: f32) -> f32 {
    (0.25 * freq).max(2.0).min(freq)
}

/// Number of FIR taps for a given transition bandwidth, rounded up to odd
/// (required for a linear-phase kernel with an integer group delay).
///
/// Formula: `ceil(3.3 / trans_bw * sfreq)`.
pub fn auto_filter_length(trans_bw: f32, sfreq: f32) -> usize {
    let n_raw = (3.3 / trans_bw * sfreq).ceil() as usize;
    if n_raw % 2 == 0 { n_raw + 1 } else { n_raw }
}

/// Design a zero-phase band-pass FIR kernel for edges `(l_freq, h_freq)` Hz.
///
/// The kernel length is driven by the narrower of the two transition bands;
/// each cutoff sits at the midpoint of its transition band, mirroring
/// `mne.filter.create_filter(l_freq, h_freq, fir_window='hamming',
/// fir_design='firwin', phase='zero')`.
pub fn design_bandpass(l_freq: f32, h_freq: f32, sfreq: f32) -> Vec<f32> {
    assert!(l_freq > 0.0 && h_freq > l_freq, "band edges must satisfy 0 < l < h");

    let tb_l = auto_trans_bandwidth(l_freq);
    let tb_h = auto_trans_bandwidth(h_freq);
    let n = auto_filter_length(tb_l.min(tb_h), sfreq);

    // Cutoffs at the midpoints of the transition bands. tb_l <= l_freq,
    // so the lower cutoff stays strictly positive.
    let cutoff_l = l_freq - tb_l / 2.0;
    let cutoff_h = h_freq + tb_h / 2.0;

    let lp_hi = firwin(n, cutoff_h, sfreq);
    let lp_lo = firwin(n, cutoff_l, sfreq);

    lp_hi
        .iter()
        .zip(lp_lo.iter())
        .map(|(&hi, &lo)| (hi - lo) as f32)
        .collect()
}

/// Hamming-windowed sinc lowpass with unit DC gain. `cutoff_hz` is the
/// −6 dB point; `n` must be odd.
pub fn firwin(n: usize, cutoff_hz: f32, sfreq: f32) -> Vec<f64> {
    assert!(n % 2 == 1, "firwin requires odd N for a linear-phase filter");
    let alpha = (n - 1) as f64 / 2.0;
    let nyq = sfreq as f64 / 2.0;
    let fc = cutoff_hz as f64 / nyq; // normalised [0, 1]

    let win = hamming(n);

    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            // sin(π·fc·x) / (π·x), with the x→0 limit fc.
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * win[i]
        })
        .collect();

    // Unit DC gain.
    let s: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= s);
    h
}

/// Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Magnitude of the kernel's frequency response at `freq` Hz.
    fn gain_at(h: &[f32], freq: f32, sfreq: f32) -> f64 {
        let w = 2.0 * PI * freq as f64 / sfreq as f64;
        let (mut re, mut im) = (0.0_f64, 0.0_f64);
        for (k, &v) in h.iter().enumerate() {
            re += v as f64 * (w * k as f64).cos();
            im -= v as f64 * (w * k as f64).sin();
        }
        (re * re + im * im).sqrt()
    }

    #[test]
    fn bandpass_length_is_odd() {
        for (l, h) in [(0.1_f32, 30.0_f32), (1.0, 30.0), (0.5, 40.0)] {
            let k = design_bandpass(l, h, 250.0);
            assert!(k.len() % 2 == 1, "even length for band ({l}, {h})");
        }
    }

    #[test]
    fn bandpass_is_symmetric() {
        let k = design_bandpass(1.0, 30.0, 250.0);
        let n = k.len();
        for i in 0..n / 2 {
            approx::assert_abs_diff_eq!(k[i], k[n - 1 - i], epsilon = 1e-7_f32);
        }
    }

    #[test]
    fn bandpass_blocks_dc() {
        let k = design_bandpass(1.0, 30.0, 250.0);
        let s: f32 = k.iter().sum();
        assert!(s.abs() < 1e-5, "DC gain = {s}");
    }

    #[test]
    fn bandpass_passes_midband_and_rejects_stopband() {
        let sfreq = 250.0;
        let k = design_bandpass(1.0, 30.0, sfreq);
        let pass = gain_at(&k, 10.0, sfreq);
        let stop = gain_at(&k, 60.0, sfreq);
        approx::assert_abs_diff_eq!(pass, 1.0, epsilon = 1e-2);
        assert!(stop < 1e-3, "stopband gain = {stop}");
    }

    #[test]
    fn narrow_edge_drives_filter_length() {
        // 0.1 Hz lower edge → tb 0.1 Hz → very long kernel.
        let wide = design_bandpass(0.1, 30.0, 250.0);
        let narrow = design_bandpass(1.0, 30.0, 250.0);
        assert!(wide.len() > narrow.len());
        assert_eq!(narrow.len(), auto_filter_length(1.0, 250.0));
    }
}
