// Entrypoint for the CLI application.
// - Loads .env files, parses flags and validates them before any request.
// - Every failure is printed in red and ends the process with exit code 1.

use std::process::ExitCode;

use clap::Parser;
use hedra_cli::api::{ApiClient, VideoApi};
use hedra_cli::cli::Cli;
use hedra_cli::runner;
use hedra_cli::{config, logger, ui};

fn main() -> ExitCode {
    logger::init_logger();
    config::load_env_files();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let settings = cli.settings()?;

    if cli.list_voices {
        let api = ApiClient::new(&settings)?;
        let voices = api.list_voices()?;
        ui::print_voices(&voices);
        return Ok(());
    }

    // Validate flags before the client exists so nothing goes out on a bad run.
    let plan = cli.plan()?;
    std::fs::create_dir_all(&plan.output_dir)
        .map_err(|e| hedra_cli::Error::io(&plan.output_dir, e))?;

    let api = ApiClient::new(&settings)?;
    log::info!("using {:?} service at {}", api.service(), api.base_url());

    let mut console = ui::Console::new();
    let outcome = runner::run(&api, &plan, &mut console)?;
    ui::report(&outcome);
    Ok(())
}
