//! # gonogo-erp — Go/No-Go ERP preprocessing in pure Rust
//!
//! `gonogo-erp` turns raw high-density EEG recordings from a Go/No-Go task
//! into condition-averaged event-related potentials, one participant at a
//! time. The DSP steps follow [MNE-Python](https://mne.tools) conventions
//! (FIR design, overlap-add filtering, FFT resampling) in pure Rust +
//! [RustFFT](https://crates.io/crates/rustfft).
//!
//! ## Pipeline overview
//!
//! ```text
//! <id>_raw.safetensors
//!   │
//!   ├─ crop            drop reference electrode, cut trailing silence
//!   ├─ filter          0.1–30 Hz + 1–30 Hz band-pass copies,
//!   │                  bad-channel interpolation, average reference
//!   ├─ ica             apply precomputed decomposition, zero components
//!   ├─ epoch           recode events → gocorr/nogocorr/nogoincorr,
//!   │                  [-0.2, 0.8] s windows, baseline, resample 500 Hz
//!   ├─ quality gate    cross-validated ptp rejection + repair,
//!   │                  ≥ 4 correct-NoGo trials or participant excluded
//!   └─ export          nogocorr average + trial-level CSV tables
//! ```
//!
//! Every stage persists its output through the [`store::StageStore`], so a
//! run can be inspected (or resumed) stage by stage. Participants are
//! independent; the batch driver fans them out over a worker pool and one
//! participant's failure never touches another.
//!
//! ## Quick start
//!
//! ```no_run
//! use gonogo_erp::{Pipeline, PipelineConfig, PtpCleaner};
//!
//! let cfg = PipelineConfig {
//!     root: "study/".into(),
//!     ..PipelineConfig::default()
//! };
//! let cleaner = PtpCleaner::new(
//!     gonogo_erp::Montage::from_sfp(&cfg.montage_path()).unwrap(),
//!     cfg.cleaner_cv,
//!     cfg.n_interpolate,
//!     cfg.cleaner_seed,
//! );
//! let pipeline = Pipeline::new(cfg).unwrap();
//! for summary in pipeline.run_batch(&cleaner).unwrap() {
//!     println!("{}: {:?}", summary.id, summary.outcome);
//! }
//! ```

pub mod artifact;
pub mod config;
pub mod epoch;
pub mod error;
pub mod events;
pub mod export;
pub mod filter;
pub mod interpolate;
pub mod io;
pub mod montage;
pub mod pipeline;
pub mod qlog;
pub mod quality;
pub mod recording;
pub mod reference;
pub mod resample;
pub mod store;

pub use artifact::{ArtifactRemover, IcaDecomposition};
pub use config::PipelineConfig;
pub use epoch::EpochSet;
pub use error::{PipelineError, Result};
pub use events::Condition;
pub use montage::Montage;
pub use pipeline::{Outcome, ParticipantSummary, Pipeline};
pub use quality::{EpochCleaner, NoopCleaner, PtpCleaner};
pub use recording::Recording;
