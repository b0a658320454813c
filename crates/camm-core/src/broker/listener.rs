use super::config::{LaunchConfig, QueueConfig};
use super::connection::Connection;
use super::error::BrokerError;
use super::message::{Destination, JobRequest};
use super::progress::{Progress, ProgressReporter};
use super::spawner::{CommandLine, LaunchHandle, ProcessSpawner};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub received: usize,
    pub launched: usize,
    /// Messages that could not be decoded as a job.
    pub dropped: usize,
    /// Jobs whose process could not be started.
    pub failed: usize,
}

/// The workflow side of the job handoff: turns every job posted on the
/// params-ready queue into a workflow-engine process.
pub struct Listener<S: ProcessSpawner> {
    queues: QueueConfig,
    launch: LaunchConfig,
    spawner: S,
    observer: Option<mpsc::UnboundedSender<LaunchHandle>>,
}

impl<S: ProcessSpawner> Listener<S> {
    pub fn new(queues: QueueConfig, launch: LaunchConfig, spawner: S) -> Self {
        Self {
            queues,
            launch,
            spawner,
            observer: None,
        }
    }

    /// Forwards every launched process to `observer`, which may await its exit.
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<LaunchHandle>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// `EXE QFLAG QUEUE WDFLAG DIR OUTFLAG FILE [FLAG VALUE]... -runwf WORKFLOW -nogui`
    pub fn command_line(&self, job: &JobRequest) -> CommandLine {
        let launch = &self.launch;
        let mut command = CommandLine::new(&launch.executable)
            .arg(&launch.result_queue_flag)
            .arg(&job.amq_results_queue)
            .arg(&launch.work_dir_flag)
            .arg(&job.working_directory)
            .arg(&launch.output_file_flag)
            .arg(&job.output_file);
        for (flag, value) in &launch.run_options {
            command = command.arg(flag).arg(value);
        }
        command.arg("-runwf").arg(&launch.workflow).arg("-nogui")
    }

    /// Serves jobs until the broker closes the session.
    pub async fn run<C: Connection>(
        &self,
        connection: &mut C,
        reporter: &ProgressReporter<'_>,
    ) -> Result<ListenerStats, BrokerError> {
        let params_ready = Destination::new(&self.queues.params_ready_queue);
        connection.subscribe(&params_ready).await?;
        reporter.report(Progress::Subscribed {
            destination: params_ready.clone(),
        });
        info!("Listening for jobs on {}", params_ready);

        let mut stats = ListenerStats::default();
        while let Some(message) = connection.recv().await? {
            if message.destination != params_ready {
                continue;
            }
            stats.received += 1;
            reporter.report(Progress::JobReceived);

            let job: JobRequest = match serde_json::from_str(&message.body) {
                Ok(job) => job,
                Err(e) => {
                    error!("Dropping undecodable job message: {}", e);
                    stats.dropped += 1;
                    continue;
                }
            };

            let command = self.command_line(&job);
            info!("Launching: {}", command);
            match self.spawner.spawn(&command) {
                Ok(handle) => {
                    stats.launched += 1;
                    reporter.report(Progress::JobLaunched { pid: handle.pid });
                    if let Some(observer) = &self.observer {
                        if observer.send(handle).is_err() {
                            warn!("Launch observer has gone away");
                        }
                    }
                }
                Err(e) => {
                    error!("{}", e);
                    stats.failed += 1;
                }
            }
        }
        info!(
            "Broker session ended after {} jobs ({} launched)",
            stats.received, stats.launched
        );
        Ok(stats)
    }
}
