use clap::Parser;
use cli::Args;
use indicatif::ProgressStyle;
use termination::terminate;
use tracing_error::ErrorLayer;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub mod artifacts;
pub mod ethers_utils;
pub mod serde_utils;

mod cli;
mod constants;
mod deployment;
mod termination;

async fn start() -> eyre::Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => return Err(err.into()),
    };

    deployment::run_deployment(args).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    dotenv::dotenv().ok();

    let indicatif_layer =
        IndicatifLayer::new().with_progress_style(ProgressStyle::with_template(
            "{span_child_prefix}{spinner} {span_name}{{{span_fields}}} [{elapsed}]",
        )?);

    let filter = EnvFilter::from_default_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(indicatif_layer.get_stderr_writer())
                .with_filter(filter),
        )
        .with(indicatif_layer)
        .with(ErrorLayer::default())
        .init();

    let termination = terminate(start().await, &mut std::io::stderr());

    std::process::exit(termination.code())
}
