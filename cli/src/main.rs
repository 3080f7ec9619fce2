use clap::Parser;
use lawer_cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    lawer_cli::init_tracing();
    cli.run().await
}
