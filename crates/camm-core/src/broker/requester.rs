use super::config::QueueConfig;
use super::connection::{Connection, send_json};
use super::error::BrokerError;
use super::message::{Destination, JobReply, JobRequest};
use super::progress::{Progress, ProgressReporter};
use super::rendezvous::rendezvous;
use crate::core::io::dakota;
use std::fs::File;
use std::io::{BufWriter, Write};
use tracing::{debug, info, warn};

/// The optimizer side of the job handoff.
///
/// Each requester owns a reply queue named after its instance, so several
/// optimizer processes can share one params-ready queue.
#[derive(Debug, Clone)]
pub struct Requester {
    queues: QueueConfig,
    instance: String,
}

impl Requester {
    pub fn new(queues: QueueConfig, instance: impl Into<String>) -> Self {
        Self {
            queues,
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn reply_queue(&self) -> String {
        self.queues.reply_queue(&self.instance)
    }

    pub fn job(
        &self,
        params: impl Into<String>,
        output_file: impl Into<String>,
        working_directory: impl Into<String>,
    ) -> JobRequest {
        JobRequest {
            params: params.into(),
            output_file: output_file.into(),
            amq_results_queue: self.reply_queue(),
            working_directory: working_directory.into(),
        }
    }

    /// Posts `request` and waits for the worker's reply on the request's reply queue.
    ///
    /// There is no timeout. The call returns once a well-formed reply arrives or the
    /// broker closes the session. The connection is torn down in both cases.
    pub async fn submit<C>(
        &self,
        mut connection: C,
        request: &JobRequest,
        reporter: &ProgressReporter<'_>,
    ) -> Result<JobReply, BrokerError>
    where
        C: Connection + 'static,
    {
        let reply_queue = Destination::new(&request.amq_results_queue);
        connection.subscribe(&reply_queue).await?;
        reporter.report(Progress::Subscribed {
            destination: reply_queue.clone(),
        });

        let params_ready = Destination::new(&self.queues.params_ready_queue);
        send_json(&mut connection, &params_ready, request).await?;
        info!("Job posted to {}, reply expected on {}", params_ready, reply_queue);
        reporter.report(Progress::RequestSent {
            destination: params_ready,
        });

        let (notifier, waiter) = rendezvous();
        let listening_on = reply_queue.clone();
        let receiver = tokio::spawn(async move {
            let mut notifier = Some(notifier);
            while let Some(message) = connection.recv().await? {
                if message.destination != listening_on {
                    debug!("Ignoring message from {}", message.destination);
                    continue;
                }
                match serde_json::from_str::<JobReply>(&message.body) {
                    Ok(reply) => {
                        if let Some(notifier) = notifier.take() {
                            let _ = notifier.notify(reply);
                        }
                        break;
                    }
                    Err(e) => warn!("Dropping undecodable reply on {}: {}", listening_on, e),
                }
            }
            drop(notifier);
            if let Err(e) = connection.unsubscribe(&listening_on).await {
                debug!("Unsubscribe from {} failed: {}", listening_on, e);
            }
            connection.disconnect().await
        });

        reporter.report(Progress::WaitingForReply {
            destination: reply_queue,
        });
        match waiter.wait().await {
            Ok(reply) => {
                reporter.report(Progress::ReplyReceived {
                    cost_function: reply.cost_function,
                });
                info!("Reply received: cost function {}", reply.cost_function);
                match receiver.await {
                    Ok(Err(e)) => warn!("Broker teardown failed: {}", e),
                    Err(e) => warn!("Receive task failed: {}", e),
                    Ok(Ok(())) => {}
                }
                Ok(reply)
            }
            Err(closed) => match receiver.await {
                Ok(Err(e)) => Err(e),
                Ok(Ok(())) => Err(closed),
                Err(e) => Err(BrokerError::Io(std::io::Error::other(e))),
            },
        }
    }
}

/// Writes the reply's cost function where the optimizer expects its results file.
pub fn write_results(reply: &JobReply) -> Result<(), BrokerError> {
    let to_error = |source| BrokerError::Results {
        path: reply.output_file.clone(),
        source,
    };
    let file = File::create(&reply.output_file).map_err(to_error)?;
    let mut writer = BufWriter::new(file);
    dakota::write_results(&mut writer, reply.cost_function).map_err(to_error)?;
    writer.flush().map_err(to_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::memory::MemoryBroker;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reply_on_the_instance_queue_unblocks_the_requester() {
        let broker = MemoryBroker::new();
        let queues = QueueConfig::default();
        let params_ready = Destination::new(&queues.params_ready_queue);

        let mut worker = broker.connect().await;
        worker.subscribe(&params_ready).await.unwrap();
        let worker_task = tokio::spawn(async move {
            let message = worker.recv().await.unwrap().unwrap();
            let request: JobRequest = serde_json::from_str(&message.body).unwrap();
            assert_eq!(request.params, "X");
            assert_eq!(request.working_directory, "/tmp");
            let reply = JobReply {
                output_file: request.output_file.clone(),
                cost_function: 3.14,
            };
            send_json(&mut worker, &Destination::new(&request.amq_results_queue), &reply)
                .await
                .unwrap();
            request
        });

        let requester = Requester::new(queues, "Q1");
        let request = JobRequest {
            params: "X".into(),
            output_file: "out.dat".into(),
            amq_results_queue: "Q1".into(),
            working_directory: "/tmp".into(),
        };
        let connection = broker.connect().await;
        let reply = requester
            .submit(connection, &request, &ProgressReporter::new())
            .await
            .unwrap();
        assert_eq!(reply.cost_function, 3.14);
        assert_eq!(reply.output_file, "out.dat");
        assert_eq!(worker_task.await.unwrap(), request);
    }

    #[tokio::test]
    async fn malformed_replies_are_skipped() {
        let broker = MemoryBroker::new();
        let requester = Requester::new(QueueConfig::default(), "7");
        let reply_queue = Destination::new(&requester.reply_queue());

        let mut worker = broker.connect().await;
        worker.send(&reply_queue, "not json").await.unwrap();
        worker
            .send(&reply_queue, r#"{"output_file":"r.7","cost_function":"7"}"#)
            .await
            .unwrap();

        let events = std::sync::Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            events.lock().unwrap().push(format!("{event:?}"));
        }));
        let request = requester.job("X", "r.7", "/tmp");
        let reply = requester
            .submit(broker.connect().await, &request, &reporter)
            .await
            .unwrap();
        assert_eq!(reply.cost_function, 7.0);
        drop(reporter);
        let events = events.into_inner().unwrap();
        assert!(events.first().unwrap().starts_with("Subscribed"));
        assert!(events.last().unwrap().starts_with("ReplyReceived"));
    }

    #[tokio::test]
    async fn closed_broker_releases_the_requester() {
        let broker = MemoryBroker::new();
        let requester = Requester::new(QueueConfig::default(), "9");
        let request = requester.job("X", "out", "/tmp");
        let connection = broker.connect().await;
        let closer = broker.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            closer.close().await;
        });
        let result = requester.submit(connection, &request, &ProgressReporter::new()).await;
        assert!(matches!(result, Err(BrokerError::ConnectionClosed)));
    }

    #[test]
    fn job_names_the_instance_reply_queue() {
        let requester = Requester::new(QueueConfig::default(), "4242");
        let job = requester.job("1 variables\n0.5 FF1\n", "results.out", "/work");
        assert_eq!(job.amq_results_queue, "RESULTS.READY.4242");
        assert_eq!(requester.instance(), "4242");
    }

    #[test]
    fn results_file_holds_the_cost_function() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.out");
        let reply = JobReply {
            output_file: path.to_string_lossy().into_owned(),
            cost_function: 3.14,
        };
        write_results(&reply).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "3.140000\n");

        let missing = JobReply {
            output_file: dir.path().join("no/such/dir/out").to_string_lossy().into_owned(),
            cost_function: 1.0,
        };
        assert!(matches!(write_results(&missing), Err(BrokerError::Results { .. })));
    }
}
