use camm::broker::progress::{Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

#[derive(Clone)]
pub struct CliProgressHandler {
    pb: Arc<Mutex<ProgressBar>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let pb = ProgressBar::new(0)
            .with_style(Self::spinner_style())
            .with_message("Connecting...");
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.disable_steady_tick();
        pb.finish_and_clear();

        Self {
            pb: Arc::new(Mutex::new(pb)),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let pb_clone = self.pb.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut pb_guard) = pb_clone.lock() else {
                warn!("Progress bar mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::Subscribed { destination } => {
                    pb_guard.reset();
                    pb_guard.set_length(0);
                    pb_guard.set_style(Self::spinner_style());
                    pb_guard.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                    pb_guard.set_message(format!("Subscribed to {}", destination));
                }
                Progress::RequestSent { destination } => {
                    pb_guard.set_message(format!("Job posted to {}", destination));
                }
                Progress::WaitingForReply { destination } => {
                    pb_guard.set_message(format!("Waiting for the cost function on {}", destination));
                }
                Progress::ReplyReceived { cost_function } => {
                    pb_guard.disable_steady_tick();
                    pb_guard.finish_with_message(format!("✓ Cost function: {}", cost_function));
                }
                Progress::JobReceived => {
                    pb_guard.inc(1);
                    let received = pb_guard.position();
                    pb_guard.set_message(format!("Jobs received: {}", received));
                }
                Progress::JobLaunched { pid } => {
                    let line = match pid {
                        Some(pid) => format!("  Workflow launched (pid {})", pid),
                        None => "  Workflow launched".to_string(),
                    };
                    pb_guard.println(line);
                }
                Progress::Message(msg) => {
                    if !pb_guard.is_finished() {
                        pb_guard.println(format!("  {}", msg));
                    } else {
                        pb_guard.set_message(msg);
                    }
                }
            }
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camm::broker::Destination;
    use std::thread;

    #[test]
    fn handler_initializes_in_a_clean_state() {
        let handler = CliProgressHandler::new();
        let pb = handler.pb.lock().unwrap();
        assert_eq!(pb.length(), Some(0));
        assert!(pb.is_finished());
    }

    #[test]
    fn callback_follows_a_job_submission() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        callback(Progress::Subscribed {
            destination: Destination::new("RESULTS.READY.7"),
        });
        {
            let pb = handler.pb.lock().unwrap();
            assert_eq!(pb.message(), "Subscribed to RESULTS.READY.7");
            assert!(!pb.is_finished());
        }

        callback(Progress::WaitingForReply {
            destination: Destination::new("RESULTS.READY.7"),
        });
        {
            let pb = handler.pb.lock().unwrap();
            assert!(pb.message().contains("Waiting"));
        }

        callback(Progress::ReplyReceived { cost_function: 3.14 });
        {
            let pb = handler.pb.lock().unwrap();
            assert!(pb.is_finished());
            assert_eq!(pb.message(), "✓ Cost function: 3.14");
        }
    }

    #[test]
    fn received_jobs_are_counted() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        callback(Progress::Subscribed {
            destination: Destination::new("PARAMS.READY"),
        });
        callback(Progress::JobReceived);
        callback(Progress::JobLaunched { pid: Some(42) });
        callback(Progress::JobReceived);

        let pb = handler.pb.lock().unwrap();
        assert_eq!(pb.position(), 2);
        assert_eq!(pb.message(), "Jobs received: 2");
    }

    #[test]
    fn callback_is_thread_safe() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        thread::spawn(move || {
            callback(Progress::Subscribed {
                destination: Destination::new("RESULTS.READY.1"),
            });
            callback(Progress::ReplyReceived { cost_function: 1.0 });
        })
        .join()
        .unwrap();

        let pb = handler.pb.lock().unwrap();
        assert!(pb.is_finished());
        assert_eq!(pb.message(), "✓ Cost function: 1");
    }
}
