use std::path::{Path, PathBuf};

use clap::{Args, Command, FromArgMatches as _};
use log::info;

use crate::error::SimError;
use crate::log::{parse_log_level, set_log_level};
use crate::parameters::Parameters;
use crate::random::SimRng;
use crate::report::ResultsWriter;
use crate::simulation::Simulation;
use crate::summary::{BatchSummary, AVERAGE_FILENAME};

/// Command line arguments of the batch runner. Every option overrides the corresponding value of
/// the parameter file (or of the built-in defaults when no file is given).
#[derive(Args, Debug, Default)]
pub struct BaseArgs {
    /// Base random seed; run `i` of the batch is seeded with `seed + i`
    #[arg(short, long)]
    pub random_seed: Option<u64>,

    /// Optional path to a JSON parameter file
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// Optional directory holding the batch directories
    #[arg(short, long, default_value = "")]
    pub output_dir: String,

    /// Number of runs in the batch
    #[arg(short = 'n', long)]
    pub num_runs: Option<usize>,

    /// Number of days simulated per run
    #[arg(short = 'd', long)]
    pub num_days: Option<usize>,

    /// Log level (off, error, warn, info, debug, trace); logging is off by default
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Do not write the per-day averages of the batch
    #[arg(long)]
    pub no_summary: bool,
}

/// What a finished batch left on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub batch_dir: PathBuf,
    pub runs_written: usize,
    pub summary: Option<PathBuf>,
}

fn create_sirqis_cli() -> Command {
    let cli = Command::new("sirqis").about(
        "Simulates an epidemic with testing, contact tracing, quarantine and isolation",
    );
    BaseArgs::augment_args(cli)
}

/// Parses the process arguments and runs a batch.
///
/// # Errors
///
/// Returns an error if argument parsing or the batch fails.
pub fn run_with_args() -> Result<BatchOutcome, Box<dyn std::error::Error>> {
    let matches = create_sirqis_cli().get_matches();
    let args = BaseArgs::from_arg_matches(&matches)?;
    Ok(run_batch(&args)?)
}

/// Resolves the parameters for `args`: the parameter file (or the defaults) with the command
/// line overrides applied, then validated.
///
/// # Errors
///
/// Returns an error if the parameter file cannot be loaded or the result is invalid.
pub fn resolve_parameters(args: &BaseArgs) -> Result<Parameters, SimError> {
    let mut parameters = if args.config.is_empty() {
        Parameters::default()
    } else {
        info!("loading parameters from {}", args.config);
        Parameters::from_json_file(Path::new(&args.config))?
    };
    if let Some(seed) = args.random_seed {
        parameters.simulation.seed = seed;
    }
    if let Some(num_runs) = args.num_runs {
        parameters.simulation.num_runs = num_runs;
    }
    if let Some(num_days) = args.num_days {
        parameters.simulation.num_days = num_days;
    }
    if !args.output_dir.is_empty() {
        parameters.results.main_results_dir.clone_from(&args.output_dir);
    }
    parameters.validate()?;
    Ok(parameters)
}

/// Runs `num_runs` independent simulations of `num_days` days each, writing every run, the
/// parameter snapshot and (unless disabled) the per-day averages into a new batch directory.
///
/// # Errors
///
/// Returns the first error raised while configuring, simulating or writing.
pub fn run_batch(args: &BaseArgs) -> Result<BatchOutcome, SimError> {
    if let Some(level) = &args.log_level {
        set_log_level(parse_log_level(level)?);
    }
    let parameters = resolve_parameters(args)?;
    let simulation = &parameters.simulation;

    let mut writer = ResultsWriter::new(&parameters.results)?;
    writer.write_parameters(&parameters)?;

    for run_index in 0..simulation.num_runs {
        let seed = SimRng::for_run(simulation.seed, run_index).base_seed();
        let mut run = Simulation::new(parameters.clone(), seed)?;
        run.run(simulation.num_days)?;
        writer.write_run(&run.results())?;
        info!(
            "run {} of {} finished (seed={seed})",
            run_index + 1,
            simulation.num_runs
        );
    }

    let summary = if args.no_summary {
        None
    } else {
        let path = writer.batch_dir().join(AVERAGE_FILENAME);
        BatchSummary::from_batch_dir(writer.batch_dir(), &parameters.results.run_filename)?
            .write_csv(&path)?;
        Some(path)
    };

    Ok(BatchOutcome {
        batch_dir: writer.batch_dir().to_path_buf(),
        runs_written: writer.runs_written(),
        summary,
    })
}
