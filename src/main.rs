use anyhow::Result;
use clap::Parser;

mod cli;

use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    vigil::logging::init(cli.verbose);
    cli::dispatch(cli)
}
