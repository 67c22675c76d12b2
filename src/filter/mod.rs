//! Zero-phase band-pass FIR filtering.
//!
//! - [`design`]: Hamming-windowed sinc band-pass design (MNE `firwin`
//!   conventions, automatic transition bands and length).
//! - [`apply`]: overlap-add zero-phase convolution.

pub mod apply;
pub mod design;

pub use apply::{apply_fir_zero_phase, filter_1d};
pub use design::{auto_filter_length, auto_trans_bandwidth, design_bandpass, firwin, hamming};
