//! cardiotune command line interface
//!
//! Describe a dataset, run a hyperparameter search, train a single fixed
//! configuration through the same protocol, and print saved reports.

use cardiotune::api::{timeout_from_secs, Experiment, ExperimentConfig};
use cardiotune::core::{ExperimentError, Result};
use cardiotune::data::EncodedDataset;
use cardiotune::report::{DatasetSummary, ExperimentReport};
use cardiotune::search::{
    FixedSampler, LayerConfig, OptimizerKind, PrunerConfig, SearchSpace, TrialConfig,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "cardiotune")]
#[command(about = "Hyperparameter search and evaluation for heart-disease classifiers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarise a dataset and its encoded features
    Describe(DescribeArgs),
    /// Search network configurations and evaluate the best one
    Search(SearchArgs),
    /// Train and evaluate a single fixed configuration
    Train(TrainArgs),
    /// Print the default search space as JSON
    Space,
    /// Print a saved experiment report
    Report(ReportArgs),
}

#[derive(Args)]
struct DataArgs {
    /// Input CSV file with a header row
    #[arg(long)]
    data: PathBuf,

    /// Label column name
    #[arg(long)]
    label: Option<String>,
}

#[derive(Args)]
struct DescribeArgs {
    #[command(flatten)]
    input: DataArgs,
}

#[derive(Args)]
struct SearchArgs {
    #[command(flatten)]
    input: DataArgs,

    /// Experiment configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of trials
    #[arg(long)]
    trials: Option<usize>,

    /// Stop starting new trials after this many seconds
    #[arg(long)]
    timeout: Option<f64>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Pruning policy
    #[arg(long)]
    pruner: Option<CliPruner>,

    /// Write the report as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct TrainArgs {
    #[command(flatten)]
    input: DataArgs,

    /// Hidden layer widths, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    units: Vec<usize>,

    /// Dropout per hidden layer, comma separated; a single value applies to all
    #[arg(long, value_delimiter = ',', default_value = "0.2")]
    dropout: Vec<f64>,

    #[arg(long, default_value = "0.001")]
    learning_rate: f64,

    #[arg(long, default_value = "10")]
    batch_size: usize,

    #[arg(long, default_value = "30")]
    epochs: usize,

    #[arg(long, default_value = "adam")]
    optimizer: CliOptimizer,

    /// Random seed
    #[arg(long, default_value = "101")]
    seed: u64,

    /// Write the report as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct ReportArgs {
    /// Report file written by `search` or `train`
    file: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliOptimizer {
    Sgd,
    Adam,
}

impl From<CliOptimizer> for OptimizerKind {
    fn from(cli: CliOptimizer) -> Self {
        match cli {
            CliOptimizer::Sgd => OptimizerKind::Sgd,
            CliOptimizer::Adam => OptimizerKind::Adam,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliPruner {
    /// Median stopping rule
    Median,
    /// Never prune
    None,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Describe(args) => describe_command(args),
        Commands::Search(args) => search_command(args),
        Commands::Train(args) => train_command(args),
        Commands::Space => space_command(),
        Commands::Report(args) => report_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn load_dataset(input: &DataArgs, default_label: &str) -> Result<EncodedDataset> {
    let label = input.label.as_deref().unwrap_or(default_label);
    info!("Loading {:?} (label column {label})", input.data);
    EncodedDataset::from_csv(&input.data, label)
}

fn describe_command(args: DescribeArgs) -> Result<()> {
    let dataset = load_dataset(&args.input, &ExperimentConfig::default().label_column)?;
    let summary = DatasetSummary::from_dataset(&dataset);
    summary.write_to(&mut std::io::stdout().lock())?;
    Ok(())
}

fn search_command(args: SearchArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ExperimentConfig::from_json_file(path)?,
        None => ExperimentConfig::default(),
    };
    if let Some(label) = &args.input.label {
        config.label_column = label.clone();
    }
    if let Some(trials) = args.trials {
        config.n_trials = trials;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(pruner) = args.pruner {
        config.pruner = match pruner {
            CliPruner::Median => PrunerConfig::default(),
            CliPruner::None => PrunerConfig::None,
        };
    }
    let mut experiment = Experiment::from_config(config);
    if let Some(secs) = args.timeout {
        experiment = experiment.with_timeout(Some(timeout_from_secs(secs)?));
    }

    let dataset = load_dataset(&args.input, &experiment.config().label_column)?;
    info!(
        "Searching {} trials with seed {}",
        experiment.config().n_trials,
        experiment.config().seed
    );
    let report = experiment.run(&dataset)?;
    finish(&report, args.output)
}

fn train_command(args: TrainArgs) -> Result<()> {
    let dropout = match args.dropout.as_slice() {
        [p] => vec![*p; args.units.len()],
        many if many.len() == args.units.len() => many.to_vec(),
        many => {
            return Err(ExperimentError::InvalidParameter(format!(
                "{} dropout values given for {} layers",
                many.len(),
                args.units.len()
            )))
        }
    };
    let layers = args
        .units
        .iter()
        .zip(&dropout)
        .map(|(&units, &p)| LayerConfig::new(units, p))
        .collect();
    let trial = TrialConfig::new(
        layers,
        args.learning_rate,
        args.batch_size,
        args.epochs,
        args.optimizer.into(),
    )?;
    info!("Training fixed configuration {trial}");

    let mut experiment = Experiment::new()
        .with_seed(args.seed)
        .with_n_trials(1)
        .with_pruner(PrunerConfig::None);
    if let Some(label) = &args.input.label {
        experiment = experiment.with_label_column(label.as_str());
    }
    let dataset = load_dataset(&args.input, &experiment.config().label_column)?;
    let mut sampler = FixedSampler::new(vec![trial]);
    let report = experiment.run_with_sampler(&dataset, &mut sampler)?;
    finish(&report, args.output)
}

fn space_command() -> Result<()> {
    let json = serde_json::to_string_pretty(&SearchSpace::default())
        .map_err(|e| ExperimentError::SerializationError(e.to_string()))?;
    println!("{json}");
    Ok(())
}

fn report_command(args: ReportArgs) -> Result<()> {
    let report = ExperimentReport::load_from_file(&args.file)?;
    report.print_summary()
}

fn finish(report: &ExperimentReport, output: Option<PathBuf>) -> Result<()> {
    report.print_summary()?;
    if let Some(path) = output {
        report.save_to_file(&path)?;
        info!("Report saved to {path:?}");
    }
    Ok(())
}
