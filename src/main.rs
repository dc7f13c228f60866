//! evmsign - Parallel IMA/EVM Batch Signer
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use evmsign::config::{CliArgs, SignConfig};
use evmsign::coordinator::SignCoordinator;
use evmsign::progress::{print_header, print_summary, ProgressReporter};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let start = Instant::now();

    // Parse CLI arguments
    let args = CliArgs::parse();

    setup_logging(args.verbose)?;

    let config = SignConfig::from_args(args).context("Invalid configuration")?;

    let roots = config.load_roots().context("Failed to load root directories")?;

    if config.show_progress {
        print_header(
            &config.key_path.display().to_string(),
            &config.roots_file.display().to_string(),
            roots.len(),
            config.concurrency,
        );
    }

    let show_progress = config.show_progress;
    let coordinator = SignCoordinator::new(config);

    // Setup signal handler for graceful shutdown
    let shutdown_flag = coordinator.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, waiting for running signers...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let progress = show_progress.then(|| Arc::new(ProgressReporter::new()));
    let done = Arc::new(AtomicBool::new(false));

    let ticker = match &progress {
        Some(reporter) => {
            let reporter = Arc::clone(reporter);
            let monitor = coordinator.monitor();
            let done = Arc::clone(&done);
            let handle = thread::Builder::new()
                .name("progress".into())
                .spawn(move || {
                    while !done.load(Ordering::Relaxed) {
                        reporter.update(&monitor.snapshot(start.elapsed()));
                        thread::sleep(Duration::from_millis(100));
                    }
                })
                .context("Failed to start progress display")?;
            Some(handle)
        }
        None => None,
    };

    let outcome = coordinator.run(&roots);

    done.store(true, Ordering::Relaxed);
    if let Some(handle) = ticker {
        let _ = handle.join();
    }

    if let Some(ref p) = progress {
        match &outcome {
            Ok(_) => p.finish("Signing completed"),
            Err(_) => p.finish("Signing aborted"),
        }
    }

    let result = outcome.context("Signing run failed")?;

    if show_progress {
        print_summary(&result);
    }

    info!(
        files = result.files_signed,
        "Done! It took {:.2?}",
        start.elapsed()
    );

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("evmsign=debug,warn")
    } else {
        EnvFilter::new("evmsign=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
