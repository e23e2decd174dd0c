use anyhow::Result;
use vigil::commands::submit::Submission;
use vigil::commands::{reap, run, status, submit, verify};

use super::types::{Cli, Commands};

pub fn dispatch(cli: Cli) -> Result<()> {
    let config = cli.config;
    match cli.command {
        Commands::Run { objects } => run::execute(config, objects),
        Commands::Verify { objects } => verify::execute(config, objects),
        Commands::Submit {
            host,
            service,
            code,
            output,
        } => submit::execute(
            config,
            Submission {
                host,
                service,
                return_code: code,
                output,
            },
        ),
        Commands::Reap { objects } => reap::execute(config, objects),
        Commands::Status { all } => status::execute(config, all),
    }
}
