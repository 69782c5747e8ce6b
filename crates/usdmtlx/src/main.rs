use std::process::ExitCode;

use clap::Parser;
use usdmtlx::cli::{self, Cli};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    usdmtlx::init(cli.verbosity());

    cli::run(cli)
}
