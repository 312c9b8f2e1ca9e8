use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand, ValueEnum};
use consensus_compare_bench::benches;
use consensus_compare_bench::compare::{compare_exports, load_results_dir};
use consensus_compare_bench::criterion_report;
use consensus_compare_bench::error::{ControllerError, ReportError};
use consensus_compare_bench::harness::{BenchConfig, Profile};
use consensus_compare_bench::node::{NodeConfig, PortAllocator, ProcessController};
use consensus_compare_bench::normalize::{self, NameTable};
use consensus_compare_bench::report::{build_report, read_json, render_text, write_json};
use consensus_compare_bench::schema::{ComparisonReport, ReferenceReport, SystemLabels};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    Quick,
    Full,
}

impl From<ProfileArg> for Profile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::Quick => Profile::Quick,
            ProfileArg::Full => Profile::Full,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Benchmark a reference node (daemon + control client) and write its report.
    Run {
        /// Path to the node daemon executable.
        #[arg(long, value_name = "FILE")]
        daemon: PathBuf,

        /// Path to the control-channel client executable.
        #[arg(long, value_name = "FILE")]
        cli: PathBuf,

        /// Data directory handed to the daemon. Its `regtest/` child is wiped.
        #[arg(long, value_name = "DIR")]
        data_dir: PathBuf,

        /// Where to write the JSON report.
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Seed for the control port choice; omit to draw from OS entropy.
        #[arg(long)]
        port_seed: Option<u64>,

        #[arg(long, default_value_t = PortAllocator::DEFAULT_BASE)]
        base_port: u16,

        #[arg(long, default_value_t = PortAllocator::DEFAULT_SPAN)]
        port_span: u16,

        #[arg(long, default_value = "Reference")]
        system: String,

        /// Skip host metadata collection.
        #[arg(long, default_value_t = false)]
        no_metadata: bool,
    },

    /// Convert a statistics report into a canonical export.
    Export {
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        #[arg(long, default_value = "Alternative")]
        system: String,

        /// Skip host metadata collection.
        #[arg(long, default_value_t = false)]
        no_metadata: bool,
    },

    /// Join two results directories into a comparison report.
    Compare {
        /// Results directory of system A (canonical exports or raw statistics reports).
        #[arg(long, value_name = "DIR")]
        alternative: PathBuf,

        /// Results directory of system B (reference reports).
        #[arg(long, value_name = "DIR")]
        reference: PathBuf,

        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Also write the text rendering to this file.
        #[arg(long, value_name = "FILE")]
        text: Option<PathBuf>,

        #[arg(long, default_value = "Alternative")]
        label_a: String,

        #[arg(long, default_value = "Reference")]
        label_b: String,
    },

    /// Print the text rendering of a comparison report.
    View {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[command(name = "consensus-compare-bench")]
#[command(about = "Reference-vs-alternative consensus benchmark runner and comparer (JSON output)")]
struct Args {
    #[arg(long, value_enum, default_value_t = ProfileArg::Quick, global = true)]
    profile: ProfileArg,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn execute(args: Args) -> Result<ExitCode, CliError> {
    let cfg = BenchConfig {
        profile: args.profile.into(),
    };

    match args.cmd {
        Command::Run {
            daemon,
            cli,
            data_dir,
            output,
            port_seed,
            base_port,
            port_span,
            system,
            no_metadata,
        } => {
            let ports = match port_seed {
                Some(seed) => PortAllocator::seeded(base_port, port_span, seed),
                None => PortAllocator::from_entropy(base_port, port_span),
            };
            let mut controller =
                ProcessController::new(NodeConfig::new(daemon, cli, data_dir), ports);

            info!(profile = cfg.profile.as_str(), "starting reference benchmarks");
            let outcome = benches::run_suite(&mut controller, &cfg);

            let metadata = (!no_metadata).then(|| normalize::collect_metadata(None));
            let results = match outcome {
                Ok(results) => results,
                Err(err) => {
                    let report =
                        ReferenceReport::failed(&system, err.to_string(), metadata, unix_now());
                    write_json(&output, &report)?;
                    return Err(err.into());
                }
            };
            let report = normalize::reference_report(&system, results, metadata, unix_now());
            write_json(&output, &report)?;
            info!(
                output = %output.display(),
                measured = report.measured_count(),
                total = report.benchmarks.len(),
                "wrote reference report"
            );

            if report.measured_count() == 0 {
                error!("every workload failed; no measurements recorded");
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Export {
            input,
            output,
            system,
            no_metadata,
        } => {
            if !input.is_file() {
                return Err(ReportError::MissingFile(input).into());
            }
            let stats = criterion_report::parse_report(&input);
            if stats.is_empty() {
                return Err(ReportError::NoBenchmarks(input).into());
            }

            let metadata = (!no_metadata).then(|| normalize::collect_metadata(Some(&input)));
            let export = normalize::export_stats(
                &system,
                &NameTable::alternative(),
                stats.into_values(),
                metadata,
            );
            write_json(&output, &export)?;
            info!(
                output = %output.display(),
                benchmarks = export.benchmarks.len(),
                "wrote canonical export"
            );
        }
        Command::Compare {
            alternative,
            reference,
            output,
            text,
            label_a,
            label_b,
        } => {
            let a = load_results_dir(&alternative, &label_a)?;
            let b = load_results_dir(&reference, &label_b)?;
            let records = compare_exports(&a, &b);
            let report = build_report(
                SystemLabels {
                    a: label_a,
                    b: label_b,
                },
                a,
                b,
                &records,
            );
            write_json(&output, &report)?;
            info!(
                output = %output.display(),
                operations = report.comparison.len(),
                "wrote comparison report"
            );

            if let Some(path) = text {
                fs::write(&path, render_text(&report)).map_err(|e| ReportError::io(&path, e))?;
                info!(output = %path.display(), "wrote text report");
            }
        }
        Command::View { path } => {
            let report: ComparisonReport = read_json(&path)?;
            print!("{}", render_text(&report));
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    match execute(args) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "command failed");
            ExitCode::FAILURE
        }
    }
}
