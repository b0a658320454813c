mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod utils;

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use clap::Parser;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.clone())?;

    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default().into_hooks();
    eyre_hook.install().map_err(|e| CliError::Other(e.into()))?;
    std::panic::set_hook(Box::new(move |pi| {
        error!("{}", panic_hook.panic_report(pi));
    }));

    info!("🚀 CAMM CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let Cli {
        command,
        config: config_path,
        set_values,
        ..
    } = cli;
    let app_config = || AppConfig::load(&config_path, &set_values);

    let command_result = match command {
        Commands::FfUpdate(args) => {
            info!("Dispatching to 'ff-update' command.");
            commands::ff_update::run(args).await
        }
        Commands::Fftpl(args) => {
            info!("Dispatching to 'fftpl' command.");
            commands::fftpl::run(args).await
        }
        Commands::DakotaInit(args) => {
            info!("Dispatching to 'dakota-init' command.");
            commands::dakota_init::run(args).await
        }
        Commands::Pbs(args) => {
            info!("Dispatching to 'pbs' command.");
            commands::pbs::run(args).await
        }
        Commands::Driver(args) => {
            info!("Dispatching to 'driver' command.");
            commands::driver::run(args, &app_config()?).await
        }
        Commands::Listen => {
            info!("Dispatching to 'listen' command.");
            commands::listen::run(&app_config()?).await
        }
        Commands::Report(args) => {
            info!("Dispatching to 'report' command.");
            commands::report::run(args, &app_config()?).await
        }
        Commands::Status(args) => {
            info!("Dispatching to 'status' command.");
            commands::status::run(args, &app_config()?).await
        }
        Commands::Monitor => {
            info!("Dispatching to 'monitor' command.");
            commands::status::monitor(&app_config()?).await
        }
    };

    match &command_result {
        Ok(_) => {
            info!("✅ Command completed successfully.");
            println!("✅ Command completed successfully.");
        }
        Err(e) => error!("❌ Command failed: {}", e),
    }
    command_result
}
