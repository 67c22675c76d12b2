//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every tunable parameter for the full
//! preprocessing run. It is constructed once at startup and passed by
//! reference into every stage; there is no ambient global state.

use std::path::PathBuf;

/// Configuration for one batch run of the preprocessing pipeline.
///
/// All fields are `pub` so a config can be built with struct-update syntax:
///
/// ```
/// use gonogo_erp::PipelineConfig;
///
/// let cfg = PipelineConfig {
///     min_nogo_correct: 6,        // stricter quality gate
///     ..PipelineConfig::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root directory holding `input/` and receiving `tmp/` + `output/`.
    pub root: PathBuf,

    /// Name of the dedicated stimulus channel carrying event codes.
    ///
    /// Default: `"STI 014"`.
    pub stim_channel: String,

    /// Silent reference electrode dropped before any processing.
    ///
    /// Default: `"E129"`.
    pub reference_channel: String,

    /// Seconds of data retained after the final event when cropping.
    pub crop_margin: f32,

    /// Primary analysis band-pass edges in Hz (wide band).
    ///
    /// Default: 0.1–30 Hz.
    pub band: (f32, f32),

    /// Band-pass edges for the decomposition-quality copy (narrow band).
    ///
    /// Default: 1–30 Hz.
    pub ica_band: (f32, f32),

    /// Epoch window relative to event onset, in seconds.
    ///
    /// Default: `(-0.2, 0.8)`.
    pub epoch_window: (f32, f32),

    /// Baseline window for per-channel mean subtraction, in seconds.
    ///
    /// Default: `(-0.2, 0.0)`.
    pub baseline: (f32, f32),

    /// Peak-to-peak amplitude (volts) below which a channel counts as flat
    /// and the epoch is rejected outright.
    ///
    /// Default: `5e-6` (5 µV).
    pub flat_threshold: f32,

    /// Sampling rate epochs are resampled to, in Hz.
    ///
    /// Default: `500.0`.
    pub epoch_sfreq: f32,

    /// Minimum number of correct-NoGo trials that must survive the quality
    /// gate for the cleaned epochs to be persisted at all. Below this the
    /// participant's outcome is `Excluded` (not an error).
    ///
    /// Default: `4`.
    pub min_nogo_correct: usize,

    /// Cross-validation folds used by the statistical epoch cleaner.
    pub cleaner_cv: usize,

    /// Seed making the epoch cleaner deterministic across runs.
    pub cleaner_seed: u64,

    /// Maximum number of bad channels repaired (interpolated) per epoch
    /// before the whole epoch is dropped instead.
    pub n_interpolate: usize,

    /// Worker pool size for the participant fan-out. `0` means one worker
    /// per available core.
    pub jobs: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            stim_channel: "STI 014".into(),
            reference_channel: "E129".into(),
            crop_margin: 1.0,
            band: (0.1, 30.0),
            ica_band: (1.0, 30.0),
            epoch_window: (-0.2, 0.8),
            baseline: (-0.2, 0.0),
            flat_threshold: 5e-6,
            epoch_sfreq: 500.0,
            min_nogo_correct: 4,
            cleaner_cv: 10,
            cleaner_seed: 2020,
            n_interpolate: 4,
            jobs: 0,
        }
    }
}

impl PipelineConfig {
    /// Raw per-participant recordings.
    pub fn input_data_dir(&self) -> PathBuf {
        self.root.join("input").join("data")
    }

    /// Per-participant bad-channel lists (`<id>_bad_channels`).
    pub fn bad_channels_dir(&self) -> PathBuf {
        self.root.join("input").join("bad_channels")
    }

    /// Precomputed per-participant ICA decompositions (`<id>_ica`).
    pub fn ica_dir(&self) -> PathBuf {
        self.root.join("input").join("ica_solutions")
    }

    /// Shared electrode layout, one `name x y z` line per channel.
    pub fn montage_path(&self) -> PathBuf {
        self.root
            .join("input")
            .join("montage")
            .join("GSN-HydroCel-129.sfp")
    }

    /// Root for intermediate stage artifacts.
    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    /// Per-stage one-row CSV logs.
    pub fn log_dir(&self) -> PathBuf {
        self.root.join("output").join("logs")
    }

    /// Averaged-waveform CSV exports.
    pub fn averaged_dir(&self) -> PathBuf {
        self.root.join("output").join("data")
    }

    /// Trial-level CSV exports.
    pub fn trials_dir(&self) -> PathBuf {
        self.root.join("output").join("raw_data")
    }
}
