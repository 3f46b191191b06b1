use clap::Parser;
use tracing_subscriber::EnvFilter;

use idolface::processing::args::Args;
use idolface::processing::runner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = Args::parse();

    let default_level = if args.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    runner::run(args).await
}
