//! Shared fixtures: a synthetic study directory with raw recordings,
//! bad-channel lists, identity decompositions and a montage.
#![allow(dead_code)]

use gonogo_erp::io::StWriter;
use ndarray::Array2;
use std::f32::consts::PI;
use std::path::Path;

pub const SFREQ: f32 = 250.0;
pub const N_EEG: usize = 8;
pub const RESPONSE: i32 = 1;
pub const GO: i32 = 2;
pub const NOGO: i32 = 3;

pub fn eeg_names() -> Vec<String> {
    (1..=N_EEG).map(|i| format!("E{i}")).collect()
}

/// Event table for one synthetic session, as `(sample, code)` pairs.
///
/// Trials are 2 s apart starting at 4 s; each response follows its stimulus
/// by 0.4 s. Layout: `n_go - 1` answered Go trials, then `n_nogo_correct`
/// withheld NoGo trials, then `n_nogo_incorrect` answered NoGo trials, then
/// one final answered Go trial (so the last event is always a response).
/// Callers must keep `n_go >= 1` and `n_go >= n_nogo_correct +
/// n_nogo_incorrect` so the frequency ranking maps Go and NoGo correctly.
pub fn session_events(
    n_go: usize,
    n_nogo_correct: usize,
    n_nogo_incorrect: usize,
) -> Vec<(usize, i32)> {
    assert!(n_go >= 1);
    assert!(n_go >= n_nogo_correct + n_nogo_incorrect);

    let stim = |k: usize| 1000 + 500 * k;
    let mut events = Vec::new();
    let mut k = 0;
    for _ in 0..n_go - 1 {
        events.push((stim(k), GO));
        events.push((stim(k) + 100, RESPONSE));
        k += 1;
    }
    for _ in 0..n_nogo_correct {
        events.push((stim(k), NOGO));
        k += 1;
    }
    for _ in 0..n_nogo_incorrect {
        events.push((stim(k), NOGO));
        events.push((stim(k) + 100, RESPONSE));
        k += 1;
    }
    events.push((stim(k), GO));
    events.push((stim(k) + 100, RESPONSE));
    events
}

/// Raw recording container: eight 50 µV EEG sinusoids at distinct integer
/// frequencies (phase-locked to the 2 s trial grid), a silent reference
/// electrode and the stimulus channel carrying single-sample event pulses.
/// The recording runs 3.6 s past the final event so cropping has work to do.
pub fn write_raw(path: &Path, events: &[(usize, i32)]) {
    write_raw_with_drift(path, events, 0.0);
}

/// Variant of [`write_raw`] adding a 0.5 Hz sinusoid of amplitude `drift`
/// to E1 only: slow enough to ride through the 0.1-30 Hz analysis band
/// while the 1-30 Hz decomposition-quality band suppresses it. Confined to
/// one channel so the common average reference cannot cancel it.
pub fn write_raw_with_drift(path: &Path, events: &[(usize, i32)], drift: f32) {
    let last = events.iter().map(|&(s, _)| s).max().unwrap_or(0);
    let n_t = last + 900;

    let mut names = eeg_names();
    names.push("E129".into());
    names.push("STI 014".into());
    let stim_row = names.len() - 1;

    let mut data = Array2::<f32>::zeros((names.len(), n_t));
    for c in 0..N_EEG {
        let freq = (8 + c) as f32;
        for t in 0..n_t {
            data[[c, t]] = 50e-6 * (2.0 * PI * freq * t as f32 / SFREQ).sin();
        }
    }
    for t in 0..n_t {
        data[[0, t]] += drift * (2.0 * PI * 0.5 * t as f32 / SFREQ).sin();
    }
    for &(sample, code) in events {
        data[[stim_row, sample]] = code as f32;
    }

    let mut w = StWriter::new();
    w.add_f32_arr2("data", &data);
    w.add_f32("sfreq", &[SFREQ], &[1]);
    w.add_string_list("ch_names", &names);
    w.write(path).unwrap();
}

/// Deliberately irregular layout: E4 sits right next to E5, so an
/// interpolated E5 stays dominated by one neighbor instead of averaging out
/// to (near) zero under the common average reference.
pub fn write_montage(root: &Path) {
    let dir = root.join("input").join("montage");
    std::fs::create_dir_all(&dir).unwrap();
    let text = "\
FidNz 0.0 0.11 0.0
E1 0.000 0.000 0.100
E2 0.030 0.010 0.100
E3 0.060 -0.010 0.090
E4 0.085 0.005 0.090
E5 0.090 0.000 0.090
E6 0.120 0.040 0.080
E7 0.150 -0.030 0.070
E8 0.180 0.020 0.060
";
    std::fs::write(dir.join("GSN-HydroCel-129.sfp"), text).unwrap();
}

/// Identity decomposition with an empty exclusion set: applying it must be
/// a no-op on the signal.
pub fn write_identity_ica(path: &Path, n_ch: usize) {
    let eye = Array2::<f32>::eye(n_ch);
    let mut w = StWriter::new();
    w.add_f32_arr2("mixing", &eye);
    w.add_f32_arr2("unmixing", &eye);
    w.add_i32("exclude", &[], &[0]);
    w.write(path).unwrap();
}

/// Lay down every per-participant input under `root/input/`.
pub fn add_participant(root: &Path, id: &str, events: &[(usize, i32)], bads: &[&str]) {
    let data_dir = root.join("input").join("data");
    let bads_dir = root.join("input").join("bad_channels");
    let ica_dir = root.join("input").join("ica_solutions");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::create_dir_all(&bads_dir).unwrap();
    std::fs::create_dir_all(&ica_dir).unwrap();

    write_raw(&data_dir.join(format!("{id}_raw.safetensors")), events);
    let mut list = bads.join("\n");
    list.push('\n');
    std::fs::write(bads_dir.join(format!("{id}_bad_channels")), list).unwrap();
    write_identity_ica(&ica_dir.join(format!("{id}_ica.safetensors")), N_EEG);
}
