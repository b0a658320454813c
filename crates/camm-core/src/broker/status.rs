use super::config::QueueConfig;
use super::connection::{Connection, send_json};
use super::error::BrokerError;
use super::message::{Destination, JobStatus, StatusReport};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

impl StatusReport {
    /// A report stamped with the current time.
    pub fn now(instance_number: impl Into<String>, user: impl Into<String>, status: JobStatus, code: i64) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or_default();
        Self {
            instance_number: instance_number.into(),
            user: user.into(),
            timestamp,
            status,
            code,
        }
    }
}

pub async fn publish_status<C: Connection>(
    connection: &mut C,
    queues: &QueueConfig,
    report: &StatusReport,
) -> Result<(), BrokerError> {
    let topic = Destination::new(&queues.status_topic);
    send_json(connection, &topic, report).await?;
    info!(
        "Instance {} reported '{}' (code {})",
        report.instance_number, report.status, report.code
    );
    Ok(())
}

/// Logs every status report published on the status topic until the session ends.
/// `on_report` sees each decoded report; undecodable messages are logged and skipped.
pub async fn monitor<C, F>(connection: &mut C, queues: &QueueConfig, mut on_report: F) -> Result<usize, BrokerError>
where
    C: Connection,
    F: FnMut(&StatusReport),
{
    let topic = Destination::new(&queues.status_topic);
    connection.subscribe(&topic).await?;
    info!("Monitoring {}", topic);

    let mut seen = 0;
    while let Some(message) = connection.recv().await? {
        match serde_json::from_str::<StatusReport>(&message.body) {
            Ok(report) => {
                info!(
                    instance = %report.instance_number,
                    user = %report.user,
                    code = report.code,
                    "{} at {:.3}",
                    report.status,
                    report.timestamp
                );
                on_report(&report);
                seen += 1;
            }
            Err(e) => warn!("Ignoring malformed status message: {}", e),
        }
    }
    Ok(seen)
}
