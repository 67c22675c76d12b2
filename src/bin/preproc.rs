use anyhow::Result;
use clap::Parser;
use gonogo_erp::{Montage, Outcome, Pipeline, PipelineConfig, PtpCleaner};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "preproc", about = "Go/No-Go ERP preprocessing pipeline")]
struct Args {
    /// Study root holding input/ (data, bad_channels, ica_solutions,
    /// montage); tmp/ and output/ are created beneath it
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Worker pool size (0 = one worker per core)
    #[arg(long, default_value_t = 0)]
    jobs: usize,

    /// Minimum surviving correct-NoGo trials to keep a participant
    #[arg(long, default_value_t = 4)]
    min_nogo_correct: usize,

    /// Flat-channel rejection threshold in volts peak-to-peak
    #[arg(long, default_value_t = 5e-6)]
    flat_threshold: f32,

    /// Cross-validation folds for the epoch cleaner
    #[arg(long, default_value_t = 10)]
    cv: usize,

    /// Epoch cleaner seed
    #[arg(long, default_value_t = 2020)]
    seed: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = PipelineConfig {
        root: args.root,
        jobs: args.jobs,
        min_nogo_correct: args.min_nogo_correct,
        flat_threshold: args.flat_threshold,
        cleaner_cv: args.cv,
        cleaner_seed: args.seed,
        ..PipelineConfig::default()
    };

    let cleaner = PtpCleaner::new(
        Montage::from_sfp(&cfg.montage_path())?,
        cfg.cleaner_cv,
        cfg.n_interpolate,
        cfg.cleaner_seed,
    );
    let pipeline = Pipeline::new(cfg)?;
    let summaries = pipeline.run_batch(&cleaner)?;

    let mut exported = 0;
    let mut excluded = 0;
    let mut failed = 0;
    for s in &summaries {
        match &s.outcome {
            Outcome::Exported => {
                exported += 1;
                println!("{}: exported ({:.1} s)", s.id, s.duration.as_secs_f64());
            }
            Outcome::Excluded => {
                excluded += 1;
                println!("{}: excluded (too few clean correct-NoGo trials)", s.id);
            }
            Outcome::Failed { reason } => {
                failed += 1;
                println!("{}: FAILED: {reason}", s.id);
            }
        }
    }
    println!(
        "{} participants: {exported} exported, {excluded} excluded, {failed} failed",
        summaries.len()
    );
    Ok(())
}
