// src/bin/cli.rs
use std::process::ExitCode;

use sales_scrape::cli;

fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;
    let code = cli::run()?;
    Ok(ExitCode::from(code))
}
