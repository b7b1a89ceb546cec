//! cohortlens CLI - Command-line interface for cohortlens
//!
//! Commands:
//! - stats: Compute the per-entity metric table (CSV)
//! - dendrogram: Cluster entities and emit the labeled tree (JSON)
//! - validate: Scan a log and report how many events are usable

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cohortlens::pipeline::analyze_log;
use cohortlens::report::{dendrogram_json, metrics_csv};
use cohortlens::{AnalyticsError, Perspective, COHORTLENS_VERSION, PRODUCER_NAME};

/// cohortlens - behavioral metrics and clustering for learning-event logs
#[derive(Parser)]
#[command(name = "cohortlens")]
#[command(version = COHORTLENS_VERSION)]
#[command(about = "Derive behavioral metrics and cluster students or problems", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the per-entity metric table (CSV)
    Stats {
        /// Input event log, NDJSON (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Which side of each event is the entity
        #[arg(long, value_enum, default_value = "students")]
        perspective: PerspectiveArg,
    },

    /// Cluster entities and emit the labeled dendrogram tree (JSON)
    Dendrogram {
        /// Input event log, NDJSON (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Which side of each event is the entity
        #[arg(long, value_enum, default_value = "students")]
        perspective: PerspectiveArg,

        /// Print run diagnostics (cophenetic coefficient, counts) to stderr
        #[arg(long)]
        diagnostics: bool,
    },

    /// Scan a log and report how many events are usable
    Validate {
        /// Input event log, NDJSON (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PerspectiveArg {
    /// One entity per student; problems are targets
    Students,
    /// One entity per problem; students are targets
    Problems,
}

impl From<PerspectiveArg> for Perspective {
    fn from(arg: PerspectiveArg) -> Self {
        match arg {
            PerspectiveArg::Students => Perspective::Students,
            PerspectiveArg::Problems => Perspective::Problems,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{PRODUCER_NAME}: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), AnalyticsError> {
    match cli.command {
        Commands::Stats {
            input,
            output,
            perspective,
        } => {
            let log = read_input(&input)?;
            let report = analyze_log(&log, perspective.into())?;
            write_output(&output, &metrics_csv(&report.registry)?)
        }

        Commands::Dendrogram {
            input,
            output,
            perspective,
            diagnostics,
        } => {
            let log = read_input(&input)?;
            let report = analyze_log(&log, perspective.into())?;

            if diagnostics {
                eprintln!(
                    "{}",
                    serde_json::to_string_pretty(&report.diagnostics)?
                );
            }

            write_output(&output, &dendrogram_json(&report.dendrogram)?)
        }

        Commands::Validate { input, json } => {
            let log = read_input(&input)?;
            let (events, dropped) = cohortlens::event::parse_log(&log)?;

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "usable_events": events.len(),
                        "dropped_events": dropped,
                    })
                );
            } else {
                println!("Usable events:  {}", events.len());
                println!("Dropped events: {}", dropped);
            }
            Ok(())
        }
    }
}

fn read_input(path: &Path) -> Result<String, AnalyticsError> {
    if path.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            eprintln!("{PRODUCER_NAME}: reading event log from terminal input (pipe a file or pass --input)");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn write_output(path: &Path, data: &str) -> Result<(), AnalyticsError> {
    if path.to_string_lossy() == "-" {
        print!("{data}");
        if !data.ends_with('\n') {
            println!();
        }
        Ok(())
    } else {
        Ok(fs::write(path, data)?)
    }
}
