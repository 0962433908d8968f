use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use exam_score::config::PipelineConfig;
use exam_score::experiment::parse_log;
use exam_score::hpo::SamplerKind;
use exam_score::model::EstimatorPreset;
use exam_score::runner::{run_experiment, run_tuning, ExperimentRequest};

#[derive(Parser)]
#[command(author, version, about = "Exam score regression: experiments, tuning and serving", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cross-validate an estimator, snapshot fold 0 and log the result
    Experiment {
        /// Estimator preset (e.g. ridge, random_forest, tuned_gradient_boosting)
        #[arg(short, long)]
        estimator: EstimatorPreset,
        /// Experiment number
        #[arg(short, long)]
        number: u32,
        /// Description written to the log
        #[arg(short, long)]
        description: String,
        /// Fit folds in parallel
        #[arg(long)]
        parallel: bool,
    },
    /// Search gradient boosting hyperparameters
    Tune {
        /// Trial budget (defaults to the configured one)
        #[arg(short, long)]
        trials: Option<usize>,
        /// Sampler: tpe or random
        #[arg(short, long, default_value = "tpe")]
        sampler: SamplerKind,
    },
    /// Serve predictions from a snapshot
    Serve {
        /// Snapshot file
        #[arg(short, long)]
        model: PathBuf,
        /// Bind address (defaults to the configured one)
        #[arg(short, long)]
        address: Option<SocketAddr>,
    },
    /// Print the parsed experiment log
    History {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Experiment {
            estimator,
            number,
            description,
            parallel,
        } => {
            let outcome = run_experiment(
                &config,
                &ExperimentRequest {
                    preset: estimator,
                    number,
                    description,
                    parallel,
                },
            )?;
            for fold in &outcome.cv.fold_results {
                println!("fold {}: {:.4}", fold.fold, fold.score);
            }
            println!("mean RMSE: {:.4}", outcome.cv.mean_score);
            println!("time: {}s", outcome.cv.duration_secs);
            println!("snapshot: {}", outcome.snapshot.display());
        }
        Commands::Tune { trials, sampler } => {
            let outcome = run_tuning(&config, sampler, trials.unwrap_or(config.n_trials))?;
            println!("best score: {:.4} (trial {})", outcome.best_score, outcome.best_trial);
            println!("best params: {}", serde_json::to_string_pretty(&outcome.best_params)?);
        }
        Commands::Serve { model, address } => {
            serve(&config, model, address.unwrap_or(config.address))?;
        }
        Commands::History { json } => {
            let records = parse_log(&config.experiment_log)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                println!(
                    "{:>5}  {:>6}  {:>10}  {:>10}  description",
                    "index", "logged", "score", "time (s)"
                );
                for r in &records {
                    let logged = r.logged_number.map_or_else(|| "-".to_string(), |n| n.to_string());
                    println!(
                        "{:>5}  {:>6}  {:>10.4}  {:>10.2}  {}",
                        r.index, logged, r.mean_score, r.duration_secs, r.description
                    );
                }
            }
        }
    }
    Ok(())
}

#[cfg(feature = "server")]
fn serve(config: &PipelineConfig, model: PathBuf, address: SocketAddr) -> Result<()> {
    use exam_score::service::{server, InferenceService};
    use tracing::info;

    let cors = server::cors_layer(&config.cors_origins)?;
    let service = InferenceService::load(&model)?;
    info!(model = %model.display(), "model loaded");
    tokio::runtime::Runtime::new()?.block_on(server::serve(address, service, cors))?;
    Ok(())
}

#[cfg(not(feature = "server"))]
fn serve(_config: &PipelineConfig, _model: PathBuf, _address: SocketAddr) -> Result<()> {
    anyhow::bail!("built without the `server` feature")
}
