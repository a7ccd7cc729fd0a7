use clap::{ArgAction, Parser};
use dotenv::dotenv;
use mrmc::darts::{parse_count, Target};
use mrmc::worker::{start_series, writes_log};
use mrmc::{McError, RunLayout};
use std::process::ExitCode;
use tracing::{debug, info};

const TAGS: [&str; 2] = ["pi", "gr"];

/// Throw darts at a target to estimate pi and measure the radial distribution
#[derive(Parser)]
#[command(name = "throw_darts")]
struct Cli {
    /// Name of the output files
    #[arg(long)]
    header: String,
    /// RNG seed
    #[arg(long, default_value_t = 12345)]
    seed: u64,
    /// Process index assigned by the scheduler
    #[arg(long)]
    process: Option<usize>,
    /// Number of trials
    #[arg(long, default_value_t = 10)]
    ntrial: usize,
    /// Throws per trial, e.g. 1000 or 10^6
    #[arg(long, default_value = "1000", value_parser = parse_count)]
    nthrow: u64,
    /// Number of bins in the radial distribution
    #[arg(long, default_value_t = 20)]
    nbins: usize,
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn run(cli: &Cli) -> Result<(), McError> {
    let layout = RunLayout::from_env(&cli.header)?;
    let tags: Vec<String> = TAGS.iter().map(|t| t.to_string()).collect();
    let command_line = format!(
        "throw_darts --header={} --seed={} --ntrial={} --nthrow={} --nbins={}",
        cli.header, cli.seed, cli.ntrial, cli.nthrow, cli.nbins
    );

    let mut writers = start_series(&layout, cli.process, &command_line, &tags)?;
    let mut target = Target::new(cli.seed, cli.process.unwrap_or(0) as u64, cli.nbins);

    for trial in 0..cli.ntrial {
        target.reset();
        target.throw(cli.nthrow);
        let pi = target.pi_estimate();
        writers[0].record("pi", pi)?;
        for (label, g) in target.gr_records() {
            writers[1].record(&label, g)?;
        }
        debug!(trial, pi, "trial done");
    }

    let mut generated = Vec::new();
    for writer in writers {
        generated.push(writer.finish()?.display().to_string());
    }
    if writes_log(cli.process) {
        generated.insert(0, layout.log_path().display().to_string());
    }

    info!(command = %command_line, "run complete");
    if cli.verbose > 0 {
        println!("[throw_darts] Full command: {}", command_line);
        println!("[throw_darts] To reduce the data use: mrmc reduce --header={}", cli.header);
        println!("[throw_darts] Generated: {}", generated.join(", "));
    }
    Ok(())
}

fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();
    mrmc::init_tracing("throw_darts", cli.verbose);
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[throw_darts] {}", e);
            ExitCode::FAILURE
        }
    }
}
