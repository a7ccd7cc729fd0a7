use clap::{ArgAction, Args, Parser, Subcommand};
use dotenv::dotenv;
use mrmc::config::{
    normalize_exts, parse_list, Requirement, DEFAULT_CAPTURE_EXTS, DEFAULT_MIN_MIPS,
    DEFAULT_MODULE_EXTS,
};
use mrmc::job::{self, JobRequest, ReduceStage, TransferSelection};
use mrmc::provenance::PrependOutcome;
use mrmc::reducer::{self, ReduceOptions, TagOutcome};
use mrmc::{timing, McError, RunLayout};
use std::process::{Command, ExitCode};
use tracing::error;

#[derive(Parser)]
#[command(name = "mrmc")]
#[command(about = "Map a Monte-Carlo run onto a batch cluster and reduce its output", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the job descriptor (and the two-stage descriptor when reducing)
    Map(MapArgs),
    /// Fold per-process partial files into mean / stderr / count results
    Reduce(ReduceArgs),
    /// Report total and mean remote run time from the scheduler event log
    Timing {
        /// Run header
        header: String,
    },
}

#[derive(Args)]
struct MapArgs {
    /// Worker script to run on each process
    script: String,
    /// Name of the output and job files
    #[arg(long)]
    header: String,
    /// Number of worker processes
    #[arg(long, allow_negative_numbers = true)]
    njobs: i64,
    /// Supporting module name(s) whose files are shipped with the job
    #[arg(long)]
    module: Option<String>,
    /// File extensions for module files
    #[arg(long, default_value = DEFAULT_MODULE_EXTS)]
    exts: String,
    /// Explicit list of files to ship, replacing the module match
    #[arg(long, conflicts_with = "module")]
    transfer: Option<String>,
    /// Interpreter used to launch the script (default: run the script directly)
    #[arg(long)]
    interpreter: Option<String>,
    /// Only run on machines with Mips above --min-mips
    #[arg(long)]
    fast: bool,
    #[arg(long, default_value_t = DEFAULT_MIN_MIPS)]
    min_mips: u64,
    /// Placement predicate, e.g. "Memory >= 4096"
    #[arg(long, conflicts_with = "fast")]
    requirements: Option<String>,
    /// Reduce the output once all processes finish (default)
    #[arg(long, overrides_with = "no_reduce")]
    reduce: bool,
    #[arg(long = "no-reduce", overrides_with = "reduce")]
    no_reduce: bool,
    /// Clean up intermediate files after reducing (default)
    #[arg(long, overrides_with = "no_clean")]
    clean: bool,
    #[arg(long = "no-clean", overrides_with = "clean")]
    no_clean: bool,
    /// Prepend the submission line to the run log after reducing
    #[arg(long)]
    prepend: bool,
    /// Reducer command for the post stage (default: this executable)
    #[arg(long)]
    reducer: Option<String>,
    /// Submit the descriptor instead of printing the submit command
    #[arg(long)]
    launch: bool,
    /// Arguments passed through to every worker, e.g. --seed=12345 --ntrial=10.
    /// Everything from the first unrecognized argument on is forwarded.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    rest: Vec<String>,
}

#[derive(Args)]
struct ReduceArgs {
    /// Name of the output and job files
    #[arg(long)]
    header: String,
    /// Number of worker processes; omit for a single unindexed run
    #[arg(long)]
    njobs: Option<usize>,
    /// Tags to reduce instead of those declared in the run log
    #[arg(long)]
    tags: Option<String>,
    /// Replace existing result files
    #[arg(long)]
    overwrite: bool,
    /// Delete partial files and scheduler captures after reducing
    #[arg(long, overrides_with = "no_clean")]
    clean: bool,
    #[arg(long = "no-clean", overrides_with = "clean")]
    no_clean: bool,
    /// Prepend the job submission line to the run log
    #[arg(long)]
    prepend: bool,
    /// Capture file extensions removed by --clean
    #[arg(long, default_value = DEFAULT_CAPTURE_EXTS)]
    capture_exts: String,
    /// Also save the run report as JSON
    #[arg(long)]
    report_json: Option<std::path::PathBuf>,
}

impl MapArgs {
    // overrides_with leaves at most one flag of each pair set; both default on.
    fn reduce_enabled(&self) -> bool {
        self.reduce || !self.no_reduce
    }

    fn clean_enabled(&self) -> bool {
        self.clean || !self.no_clean
    }
}

fn run_map(args: MapArgs, verbose: u8) -> Result<ExitCode, McError> {
    let layout = RunLayout::from_env(&args.header)?;

    let transfer = match &args.transfer {
        Some(list) => TransferSelection::Explicit(parse_list(list)?),
        None => TransferSelection::Matching {
            modules: args.module.as_deref().map(parse_list).transpose()?.unwrap_or_default(),
            extensions: normalize_exts(&parse_list(&args.exts)?),
        },
    };

    let requirement = match (&args.requirements, args.fast) {
        (Some(raw), _) => Some(Requirement::parse(raw)?),
        (None, true) => Some(Requirement::min_mips(args.min_mips)?),
        (None, false) => None,
    };

    let mut forward_args = args.rest.clone();
    if verbose > 0 {
        forward_args.push(format!("-{}", "v".repeat(verbose as usize)));
    }

    let reduce = if args.reduce_enabled() {
        let reducer = match &args.reducer {
            Some(r) => r.clone(),
            None => std::env::current_exe()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "mrmc".to_string()),
        };
        Some(ReduceStage {
            reducer,
            clean: args.clean_enabled(),
            prepend: args.prepend,
        })
    } else {
        None
    };

    let request = JobRequest {
        script: args.script.clone(),
        interpreter: args.interpreter.clone(),
        njobs: args.njobs,
        transfer,
        requirement,
        forward_args,
        command_line: std::env::args().collect::<Vec<_>>().join(" "),
        reduce,
    };

    let descriptors = job::build(&layout, &request)?;
    for path in descriptors.write()? {
        println!("[map] Created: {}", path.display());
    }

    let launch = descriptors.launch_command();
    if args.launch {
        let status = Command::new("sh")
            .arg("-c")
            .arg(&launch)
            .current_dir(&layout.work_dir)
            .status()?;
        if !status.success() {
            error!(command = %launch, ?status, "submission failed");
            return Ok(ExitCode::FAILURE);
        }
    } else {
        println!("{}", launch);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_reduce(args: ReduceArgs) -> Result<ExitCode, McError> {
    let layout = RunLayout::from_env(&args.header)?;
    let options = ReduceOptions {
        njobs: args.njobs,
        tags: args.tags.as_deref().map(parse_list).transpose()?,
        overwrite: args.overwrite,
        prepend: args.prepend,
        clean: args.clean && !args.no_clean,
        capture_exts: parse_list(&args.capture_exts)?,
    };

    let report = reducer::reduce(&layout, &options)?;

    for tag in &report.tags {
        match &tag.outcome {
            TagOutcome::Written { path, label_failures, .. } => {
                println!("[reduce] {} > {}", tag.tag, path.display());
                for failure in label_failures {
                    println!("[reduce] {}: {}", tag.tag, failure);
                }
            }
            TagOutcome::Skipped(notice) => println!("[reduce] {}: {}", tag.tag, notice),
            TagOutcome::Failed(e) => {
                println!("[reduce] {} FAILED: {}", tag.tag, e);
                for cause in e.nested() {
                    println!("[reduce] {}: {}", tag.tag, cause);
                }
            }
        }
        if let Some(cleanup) = &tag.cleanup {
            println!("[reduce] {}: removed {} partial file(s)", tag.tag, cleanup.removed.len());
            if !cleanup.is_clean() {
                for failure in &cleanup.failures {
                    println!("[reduce] {}: cleanup failed: {}", tag.tag, failure);
                }
            }
        }
    }
    match &report.prepend {
        Some(Ok(PrependOutcome::Prepended(line))) => println!("[reduce] Prepended to log: {}", line),
        Some(Ok(PrependOutcome::AlreadyPresent(_))) => println!("[reduce] Log already carries the submission line"),
        Some(Err(e)) => println!("[reduce] Prepend skipped: {}", e),
        None => {}
    }
    if let Some(captures) = &report.captures {
        println!("[reduce] Removed {} capture file(s)", captures.removed.len());
        if !captures.is_clean() {
            for failure in &captures.failures {
                println!("[reduce] capture cleanup failed: {}", failure);
            }
        }
    }
    for notice in &report.notices {
        println!("[reduce] {}", notice);
    }

    if let Some(path) = &args.report_json {
        let json = serde_json::to_vec_pretty(&report.summary())
            .map_err(|e| McError::Other(format!("report serialize: {}", e)))?;
        std::fs::write(path, json).map_err(|e| McError::file_access(path, e))?;
    }

    if report.is_total_failure() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_timing(header: &str) -> Result<ExitCode, McError> {
    let layout = RunLayout::from_env(header)?;
    let summary = timing::analyze(&layout.dag_nodes_log_path())?;
    for skipped in &summary.skipped {
        println!("[timing] skipped: {}", skipped);
    }
    println!("{}", summary.report_line());
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();
    mrmc::init_tracing("mrmc", cli.verbose);

    let result = match cli.command {
        Commands::Map(args) => run_map(args, cli.verbose),
        Commands::Reduce(args) => run_reduce(args),
        Commands::Timing { header } => run_timing(&header),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("[mrmc] {}", e);
            ExitCode::FAILURE
        }
    }
}
