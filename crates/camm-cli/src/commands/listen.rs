use crate::config::{AppConfig, defaults::KEPLER_CLIENT_ID};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use camm::broker::{
    Connection, LaunchHandle, Listener, ListenerStats, ProgressReporter, StompConnection, TokioSpawner,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// Serves jobs until the broker ends the session or the user interrupts.
#[instrument(skip_all, name = "listen_command")]
pub async fn run(config: &AppConfig) -> Result<()> {
    let mut connection = StompConnection::connect(&config.broker_config(KEPLER_CLIENT_ID)?).await?;

    let (launched_tx, launched_rx) = mpsc::unbounded_channel();
    let reaper = tokio::spawn(reap(launched_rx));

    let listener = Listener::new(config.queues.clone(), config.launch.clone(), TokioSpawner)
        .with_observer(launched_tx);
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Listening for jobs on {} (Ctrl-C to stop)...",
        config.queues.params_ready_queue
    );
    let stats: Option<ListenerStats> = tokio::select! {
        stats = listener.run(&mut connection, &reporter) => Some(stats?),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Interrupted, shutting down the listener.");
            None
        }
    };
    drop(listener);

    match stats {
        Some(stats) => println!(
            "Broker session ended: {} job(s) received, {} launched, {} dropped, {} failed.",
            stats.received, stats.launched, stats.dropped, stats.failed
        ),
        None => {
            if let Err(e) = connection.disconnect().await {
                warn!("Disconnect failed: {}", e);
            }
        }
    }

    if let Err(e) = reaper.await {
        error!("Process reaper failed: {}", e);
    }
    Ok(())
}

async fn reap(mut launched: mpsc::UnboundedReceiver<LaunchHandle>) {
    while let Some(handle) = launched.recv().await {
        tokio::spawn(async move {
            let command = handle.command.to_string();
            match handle.wait().await {
                Ok(Some(0)) => info!("Workflow finished: {}", command),
                Ok(Some(code)) => debug!("Workflow exited with code {}: {}", code, command),
                Ok(None) => warn!("Workflow terminated by a signal: {}", command),
                Err(e) => error!("Lost track of workflow '{}': {}", command, e),
            }
        });
    }
}
