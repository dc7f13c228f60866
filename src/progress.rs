//! Progress reporting for a signing run
//!
//! Provides a live spinner using indicatif plus the start header and the
//! final summary.

use crate::coordinator::{Phase, RunResult, SignProgress};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter that displays run status
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        let template = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}");
        if let Ok(spinner) = template {
            bar.set_style(spinner.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &SignProgress) {
        let msg = match progress.phase {
            Phase::Starting => "Starting...".to_string(),
            Phase::Discovering => format!(
                "Discovering | Roots: {}/{} | Files: {}",
                progress.roots_done,
                progress.roots_total,
                format_number(progress.discovered),
            ),
            Phase::Signing | Phase::Finished => signing_message(progress),
        };

        self.bar.set_message(msg);
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn signing_message(progress: &SignProgress) -> String {
    let mut msg = format!(
        "Signing | Signed: {}/{} | Rate: {:.1}/s | Signers: {}/{}",
        format_number(progress.signed),
        format_number(progress.discovered),
        progress.signed_per_second(),
        progress.in_flight,
        progress.concurrency,
    );
    if progress.failed > 0 {
        msg.push_str(&format!(" | Failed: {}", format_number(progress.failed)));
    }
    msg
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Print a summary of a successful run
pub fn print_summary(result: &RunResult) {
    let secs = result.duration.as_secs_f64();

    println!();
    println!("{}", style("Signing Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Roots:").bold(), result.roots);
    for summary in &result.root_summaries {
        println!(
            "    {} {} files in {:.1}s",
            style(summary.root.display()).dim(),
            format_number(summary.files),
            summary.elapsed.as_secs_f64(),
        );
    }
    println!(
        "  {} {}",
        style("Files found:").bold(),
        format_number(result.files_discovered)
    );
    println!(
        "  {} {}",
        style("Files signed:").bold(),
        format_number(result.files_signed)
    );
    println!("  {} {}", style("Peak signers:").bold(), result.peak_signers);
    println!(
        "  {} {:.1}s (discovery {:.1}s, signing {:.1}s)",
        style("Duration:").bold(),
        secs,
        result.discovery_duration.as_secs_f64(),
        result.signing_duration.as_secs_f64(),
    );
    println!();
}

/// Print a header at the start of the run
pub fn print_header(key: &str, roots_file: &str, roots: usize, signers: usize) {
    println!();
    println!(
        "{} {}",
        style("evmsign").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Key:").bold(), key);
    println!("  {} {} ({} roots)", style("Roots:").bold(), roots_file, roots);
    println!("  {} {}", style("Signers:").bold(), signers);
    println!();
}
