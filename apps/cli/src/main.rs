//! textloader CLI: build, check, and upload text corpora to the text API.
//!
//! Each subcommand is one batch tool. Reports go to stdout (or `--output`),
//! logs and progress go to stderr.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
