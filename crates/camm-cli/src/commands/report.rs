use crate::cli::ReportArgs;
use crate::config::{AppConfig, defaults::REPORT_CLIENT_ID};
use crate::error::Result;
use camm::broker::connection::send_json;
use camm::broker::{Connection, Destination, JobReply, StompConnection};
use tracing::info;

/// Posts a finished evaluation's cost function, as the last step of a workflow does.
pub async fn run(args: ReportArgs, config: &AppConfig) -> Result<()> {
    let reply = JobReply {
        output_file: args.output_file,
        cost_function: args.cost,
    };
    let queue = Destination::new(&args.queue);

    let mut connection = StompConnection::connect(&config.broker_config(REPORT_CLIENT_ID)?).await?;
    send_json(&mut connection, &queue, &reply).await?;
    connection.disconnect().await?;

    info!("Reply for {} posted on {}", reply.output_file, queue);
    println!("✓ Cost function {} posted to {}", reply.cost_function, queue);
    Ok(())
}
