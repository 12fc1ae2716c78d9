//! csv2md CLI: publish semicolon-delimited dataset CSVs to a Markdown index.
//!
//! Each CSV adds one row to the index table and gets its own dataset page.
//! Files come from the local disk or from the attachments of a GitHub issue.

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
