use super::default_instance;
use crate::cli::{StatusArgs, StatusKind};
use crate::config::AppConfig;
use crate::config::defaults::{FALLBACK_USER, MONITOR_CLIENT_ID, REPORT_CLIENT_ID};
use crate::error::Result;
use camm::broker::status::{self, publish_status};
use camm::broker::{Connection, JobStatus, StatusReport, StompConnection};
use tracing::{info, warn};

impl From<StatusKind> for JobStatus {
    fn from(kind: StatusKind) -> Self {
        match kind {
            StatusKind::DakotaStart => JobStatus::DakotaStart,
            StatusKind::StartIteration => JobStatus::StartIteration,
            StatusKind::StopIteration => JobStatus::StopIteration,
            StatusKind::DakotaStop => JobStatus::DakotaStop,
        }
    }
}

pub async fn run(args: StatusArgs, config: &AppConfig) -> Result<()> {
    let user = args
        .user
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| FALLBACK_USER.to_string());
    let instance = args.instance.unwrap_or_else(default_instance);
    let report = StatusReport::now(instance, user, args.status.into(), args.code);

    let mut connection = StompConnection::connect(&config.broker_config(REPORT_CLIENT_ID)?).await?;
    publish_status(&mut connection, &config.queues, &report).await?;
    connection.disconnect().await?;

    println!(
        "✓ Reported '{}' for instance {}",
        report.status, report.instance_number
    );
    Ok(())
}

/// Prints every status report until the broker ends the session or the user interrupts.
pub async fn monitor(config: &AppConfig) -> Result<()> {
    let mut connection = StompConnection::connect(&config.broker_config(MONITOR_CLIENT_ID)?).await?;

    println!(
        "Monitoring {} (Ctrl-C to stop)...",
        config.queues.status_topic
    );
    let seen = tokio::select! {
        seen = status::monitor(&mut connection, &config.queues, print_report) => Some(seen?),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            None
        }
    };

    match seen {
        Some(seen) => info!("Status topic closed after {} report(s).", seen),
        None => {
            info!("Interrupted, leaving the status topic.");
            if let Err(e) = connection.disconnect().await {
                warn!("Disconnect failed: {}", e);
            }
        }
    }
    Ok(())
}

fn print_report(report: &StatusReport) {
    println!(
        "[{:.0}] instance {} ({}): {} (code {})",
        report.timestamp, report.instance_number, report.user, report.status, report.code
    );
}
