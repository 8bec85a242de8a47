//! orderpack CLI — compile workshop orders into printable packets.
//!
//! Reads an order record, composes the cover, fetches the attached
//! documents from the store, and writes one merged PDF.

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
