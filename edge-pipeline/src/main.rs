use std::process::ExitCode;

use clap::Parser;
use edge_pipeline::verify::run_verifier;
use tracing_subscriber::EnvFilter;

/// Scan an event log for append-only violations: duplicate event IDs,
/// non-monotonic per-station timestamps, or corrupt records.
#[derive(Parser, Debug)]
#[command(name = "vision-verify", version, about)]
struct Args {
    /// Path to the JSON-lines event log to verify.
    #[arg(long)]
    path: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "edge_pipeline=info".into()))
        .init();

    let args = Args::parse();

    let report = match run_verifier(&args.path) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error reading {}: {e}", args.path);
            return ExitCode::FAILURE;
        }
    };

    if report.violations.is_empty() {
        println!("No violations detected");
    } else {
        for violation in &report.violations {
            println!("{violation}");
        }
    }

    if report.exit_code() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
