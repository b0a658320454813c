use super::default_instance;
use crate::cli::DriverArgs;
use crate::config::{AppConfig, defaults::DAKOTA_CLIENT_ID};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use camm::broker::requester::write_results;
use camm::broker::{ProgressReporter, Requester, StompConnection};
use tracing::{info, instrument};

/// Runs one optimizer evaluation through the workflow engine and writes its results file.
#[instrument(skip_all, name = "driver_command")]
pub async fn run(args: DriverArgs, config: &AppConfig) -> Result<()> {
    let params = std::fs::read_to_string(&args.params_file).map_err(|e| CliError::FileParsing {
        path: args.params_file.clone(),
        source: e.into(),
    })?;
    let results_file = std::path::absolute(&args.results_file)?;

    let requester = Requester::new(
        config.queues.clone(),
        args.instance.unwrap_or_else(default_instance),
    );
    let request = requester.job(params, results_file.to_string_lossy(), &args.work_dir);
    info!(
        "Evaluation {:?} for instance {} will be answered on {}",
        &args.params_file,
        requester.instance(),
        requester.reply_queue()
    );

    let connection = StompConnection::connect(&config.broker_config(DAKOTA_CLIENT_ID)?).await?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let reply = requester.submit(connection, &request, &reporter).await?;

    write_results(&reply)?;
    println!(
        "✓ Cost function {} written to: {}",
        reply.cost_function, reply.output_file
    );
    Ok(())
}
