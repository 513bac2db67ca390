use std::process::ExitCode;

use gdrive_upload::actions::{self, Inputs};
use gdrive_upload::config::ActionConfig;
use gdrive_upload::logging;
use gdrive_upload::retry::RetryPolicy;
use gdrive_upload::runner::{ActionRuntime, publish_outputs};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliMode {
    Run,
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut mode = CliMode::Run;
    for arg in args.into_iter().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => mode = CliMode::Help,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(mode)
}

async fn run() -> anyhow::Result<()> {
    let config = ActionConfig::from_inputs(&Inputs::from_env())?;
    let retry = RetryPolicy::from_env();
    let runtime = ActionRuntime::bootstrap(config, retry).await?;
    let report = runtime.run().await?;
    publish_outputs(&report)?;
    report.ensure_success()?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    match parse_cli_mode(std::env::args()) {
        Ok(CliMode::Help) => {
            println!("Usage: gdrive-upload [--help]");
            println!("  Reads INPUT_* variables set by the workflow runner:");
            println!("  credentials, parent_folder_id, target (required)");
            println!("  owner, child_folder, name, replace_mode, override (optional)");
            return ExitCode::SUCCESS;
        }
        Ok(CliMode::Run) => {}
        Err(err) => {
            eprintln!("[gdrive-upload] {err}");
            return ExitCode::FAILURE;
        }
    }

    logging::init();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            actions::set_failed(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}
