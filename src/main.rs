use anyhow::Result;
use clap::Parser;
use moodlist::{cli, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    logging::init(args.verbose);
    cli::run(args).await
}
