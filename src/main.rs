use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod aggregator;
mod config;
mod labeler;
mod models;
mod openai;
mod oracle;
mod output;
mod pipeline;
mod prompts;
mod source;
mod store;

use crate::config::Config;
use crate::openai::OpenAiOracle;
use crate::output::OutputFormat;
use crate::pipeline::Pipeline;
use crate::source::JsonlSource;
use crate::store::ResultStore;

/// Conversation Insights CLI - Discover common topics and themes in a conversation dataset and label every conversation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    config_file: PathBuf,

    /// Output format: plain or json
    #[arg(short, long, default_value = "plain")]
    output: OutputFormat,

    /// Verbose output - log progress for each conversation
    #[arg(short, long)]
    verbose: bool,

    /// Report on a previously stored result instead of analyzing the dataset
    #[arg(long, env = "ANALYTICS_FILENAME")]
    analytics_file: Option<PathBuf>,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = Config::from_file(&args.config_file)?;

    let result = match args.analytics_file.or(config.analytics_file) {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading stored analysis");
            store::load(&path)?
        }
        None => {
            tracing::info!(data_file = %config.data_file.display(), "Analyzing conversations");
            let oracle = OpenAiOracle::from_config(&config.oracle)?;
            let source = JsonlSource::new(&config.data_file);
            let pipeline = Pipeline::new(Arc::new(oracle), config.vocabulary_policy)
                .with_store(config.out_dir.as_ref().map(ResultStore::new));

            pipeline.run(&source).await?
        }
    };

    output::print_results(&result, args.output);

    Ok(())
}
