// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap and delegates every piece of work to Layer 2.
//
// Two commands are supported:
//   1. `train`   — trains a classifier and saves its artifacts
//   2. `predict` — loads a saved model and classifies images
//
// During `train` the first Ctrl-C raises the StopSignal, so the
// run ends after the current batch and its artifacts are still
// saved. A second Ctrl-C exits immediately.

pub mod commands;

use std::{future::Future, io, thread};

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, PredictArgs, TrainArgs};

use crate::application::{predict_use_case::PredictUseCase, train_use_case::TrainUseCase};
use crate::domain::control::StopSignal;

#[cfg(not(feature = "wgpu"))]
type InferBackend = burn::backend::NdArray;
#[cfg(feature = "wgpu")]
type InferBackend = burn::backend::Wgpu;

type TrainBackend = burn::backend::Autodiff<InferBackend>;

#[derive(Parser, Debug)]
#[command(
    name = "folder-cnn",
    version,
    about = "Train a convolutional image classifier on a directory-per-class tree, then classify images."
)]
pub struct Cli {
    /// The subcommand to run (train or predict)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    let config = args.into_config()?;
    tracing::info!(
        "Starting training on '{}' (validation '{}')",
        config.train_dir.display(),
        config.valid_dir.display()
    );

    let stop = StopSignal::new();
    spawn_stop_watcher(stop.clone(), tokio::signal::ctrl_c).context("Cannot install the Ctrl-C handler")?;

    let device = Default::default();
    let outcome = TrainUseCase::new(config).execute::<TrainBackend>(&device, &stop)?;

    match outcome.run.last() {
        Some(last) => println!(
            "Training complete after {} epochs: val_loss={:.4} val_acc={:.1}%",
            outcome.run.len(),
            last.valid_loss,
            last.valid_accuracy * 100.0
        ),
        None => println!("Training stopped before the first epoch finished."),
    }
    if outcome.run.diverged_batches > 0 {
        println!("{} batches had a non-finite loss and were skipped.", outcome.run.diverged_batches);
    }
    println!("Model:        {}", outcome.artifacts.model.display());
    println!("Weights:      {}", outcome.artifacts.weights.display());
    println!("Architecture: {}", outcome.artifacts.architecture.display());
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    let use_case = PredictUseCase::<InferBackend>::new(&args.model, Default::default())?;

    for p in use_case.predict(&args.images)? {
        println!("{} → {} ({:.4})", p.path.display(), p.class_name, p.probability);
    }
    Ok(())
}

// ─── Ctrl-C ───────────────────────────────────────────────────────────────────
/// Run `interrupt` on a background thread: its first completion raises `stop`,
/// its second exits the process.
fn spawn_stop_watcher<F, Fut>(stop: StopSignal, mut interrupt: F) -> io::Result<thread::JoinHandle<()>>
where
    F:   FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = io::Result<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

    thread::Builder::new().name("stop-watcher".into()).spawn(move || {
        runtime.block_on(async move {
            if let Err(e) = interrupt().await {
                tracing::warn!("Ctrl-C handling unavailable: {e}");
                return;
            }
            tracing::warn!("Stop requested; finishing the current batch. Press Ctrl-C again to abort.");
            stop.stop();

            if interrupt().await.is_ok() {
                std::process::exit(130);
            }
        })
    })
}
