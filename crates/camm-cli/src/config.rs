pub mod defaults;
mod file;

use file::{FileBrokerAddress, PartialAppConfig};

use crate::error::{CliError, Result};
use camm::broker::{BrokerAddress, BrokerConfig, BrokerConfigBuilder, LaunchConfig, QueueConfig};
use camm::broker::config::LaunchConfigBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Settings every broker-facing command is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub brokers: Vec<BrokerAddress>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub queues: QueueConfig,
    pub launch: LaunchConfig,
}

impl AppConfig {
    /// Loads the configuration file and applies `-S key=value` overrides.
    ///
    /// A missing file, or one that is not a JSON object, is reported and the
    /// built-in defaults are used instead. A key holding a value of the wrong shape
    /// falls back to its own default. Malformed overrides are errors.
    pub fn load(path: &Path, set_values: &[String]) -> Result<Self> {
        let mut partial = if path.exists() {
            match PartialAppConfig::from_file(path) {
                Ok(partial) => {
                    info!("Loaded configuration from {:?}", path);
                    partial
                }
                Err(e) => {
                    error!("{}; using default configuration.", e);
                    PartialAppConfig::default()
                }
            }
        } else {
            warn!("Configuration file {:?} not found; using default configuration.", path);
            PartialAppConfig::default()
        };
        partial.apply_set_values(set_values)?;
        Ok(partial.into())
    }

    /// Broker connection settings; the broker list and credentials are required.
    pub fn broker_config(&self, client_id: &str) -> Result<BrokerConfig> {
        let mut builder = BrokerConfigBuilder::new()
            .brokers(self.brokers.iter().cloned())
            .client_id(client_id);
        if let Some(user) = &self.user {
            builder = builder.user(user.as_str());
        }
        if let Some(password) = &self.password {
            builder = builder.password(password.as_str());
        }
        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }
}

impl From<PartialAppConfig> for AppConfig {
    fn from(partial: PartialAppConfig) -> Self {
        let brokers = partial
            .brokers
            .unwrap_or_default()
            .into_iter()
            .filter_map(|address| match address {
                FileBrokerAddress::Pair(host, port) => Some(BrokerAddress::new(host, port)),
                FileBrokerAddress::Text(text) => match text.parse() {
                    Ok(address) => Some(address),
                    Err(e) => {
                        error!("Ignoring broker entry: {}", e);
                        None
                    }
                },
            })
            .collect();

        let defaults = QueueConfig::default();
        let queues = QueueConfig {
            params_ready_queue: partial.params_ready_queue.unwrap_or(defaults.params_ready_queue),
            results_ready_queue: partial.results_ready_queue.unwrap_or(defaults.results_ready_queue),
            status_topic: partial.status_topic.unwrap_or(defaults.status_topic),
        };
        if let Some(extra) = &partial.queues {
            debug!("Ignoring {} extra queue names from the configuration.", extra.len());
        }

        let mut launch = LaunchConfigBuilder::new();
        if let Some(executable) = partial.kepler_executable {
            launch = launch.executable(PathBuf::from(executable));
        }
        if let Some(flag) = partial.kepler_result_queue_flag {
            launch = launch.result_queue_flag(flag);
        }
        if let Some(flag) = partial.kepler_work_dir_flag {
            launch = launch.work_dir_flag(flag);
        }
        if let Some(flag) = partial.kepler_output_file_flag {
            launch = launch.output_file_flag(flag);
        }
        if let Some(workflow) = partial.kepler_workflow {
            launch = launch.workflow(workflow);
        }
        for (flag, value) in partial.kepler_run_options.unwrap_or_default() {
            launch = launch.run_option(flag, value);
        }

        Self {
            brokers,
            user: partial.amq_user,
            password: partial.amq_pwd,
            queues,
            launch: launch.build(),
        }
    }
}

impl PartialAppConfig {
    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let value = value.to_string();

            match key {
                "brokers" => {
                    let addresses = value
                        .split(',')
                        .map(|entry| FileBrokerAddress::Text(entry.trim().to_string()))
                        .collect();
                    self.brokers = Some(addresses);
                }
                "amq_user" => self.amq_user = Some(value),
                "amq_pwd" => self.amq_pwd = Some(value),
                "params_ready_queue" => self.params_ready_queue = Some(value),
                "results_ready_queue" => self.results_ready_queue = Some(value),
                "status_topic" => self.status_topic = Some(value),
                "kepler_executable" => self.kepler_executable = Some(value),
                "kepler_result_queue_flag" => self.kepler_result_queue_flag = Some(value),
                "kepler_work_dir_flag" => self.kepler_work_dir_flag = Some(value),
                "kepler_output_file_flag" => self.kepler_output_file_flag = Some(value),
                "kepler_workflow" => self.kepler_workflow = Some(value),
                _ => match key.strip_prefix("kepler_run_options.") {
                    Some(flag) if !flag.is_empty() => {
                        self.kepler_run_options
                            .get_or_insert_with(Default::default)
                            .insert(flag.to_string(), value);
                    }
                    _ => {
                        return Err(CliError::Config(format!(
                            "Unsupported configuration key for --set: '{}'",
                            key
                        )));
                    }
                },
            }
        }
        Ok(())
    }
}
