use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid broker address '{0}', expected HOST:PORT")]
    InvalidAddress(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl BrokerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl FromStr for BrokerAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidAddress(s.to_string());
        let (host, port) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse().map_err(|_| invalid())?;
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// How to reach the message broker. Brokers are tried in order until one accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub brokers: Vec<BrokerAddress>,
    pub user: String,
    pub password: String,
    /// Sent as `client-id` so the broker can tell the connections apart.
    pub client_id: String,
}

#[derive(Default)]
pub struct BrokerConfigBuilder {
    brokers: Vec<BrokerAddress>,
    user: Option<String>,
    password: Option<String>,
    client_id: Option<String>,
}

impl BrokerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broker(mut self, address: BrokerAddress) -> Self {
        self.brokers.push(address);
        self
    }
    pub fn brokers(mut self, addresses: impl IntoIterator<Item = BrokerAddress>) -> Self {
        self.brokers.extend(addresses);
        self
    }
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    pub fn build(self) -> Result<BrokerConfig, ConfigError> {
        if self.brokers.is_empty() {
            return Err(ConfigError::MissingParameter("brokers"));
        }
        Ok(BrokerConfig {
            brokers: self.brokers,
            user: self.user.ok_or(ConfigError::MissingParameter("amq_user"))?,
            password: self.password.ok_or(ConfigError::MissingParameter("amq_pwd"))?,
            client_id: self.client_id.unwrap_or_else(|| "camm".to_string()),
        })
    }
}

/// Names of the well-known destinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub params_ready_queue: String,
    pub results_ready_queue: String,
    pub status_topic: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            params_ready_queue: "PARAMS.READY".to_string(),
            results_ready_queue: "RESULTS.READY".to_string(),
            status_topic: "/topic/SNS.CAMM.STATUS.JOBS".to_string(),
        }
    }
}

impl QueueConfig {
    /// The reply queue dedicated to one optimizer instance.
    pub fn reply_queue(&self, instance: &str) -> String {
        format!("{}.{}", self.results_ready_queue, instance)
    }
}

/// How the listener turns a job into a workflow-engine command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub executable: PathBuf,
    pub result_queue_flag: String,
    pub work_dir_flag: String,
    pub output_file_flag: String,
    pub workflow: String,
    /// Extra `flag value` pairs, passed in key order.
    pub run_options: BTreeMap<String, String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("/usr/local/kepler/kepler.sh"),
            result_queue_flag: "-qName".to_string(),
            work_dir_flag: "-LocalWorkingDirectory".to_string(),
            output_file_flag: "-OutputFile".to_string(),
            workflow: String::new(),
            run_options: BTreeMap::new(),
        }
    }
}

#[derive(Default)]
pub struct LaunchConfigBuilder {
    executable: Option<PathBuf>,
    result_queue_flag: Option<String>,
    work_dir_flag: Option<String>,
    output_file_flag: Option<String>,
    workflow: Option<String>,
    run_options: BTreeMap<String, String>,
}

impl LaunchConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executable(mut self, path: PathBuf) -> Self {
        self.executable = Some(path);
        self
    }
    pub fn result_queue_flag(mut self, flag: impl Into<String>) -> Self {
        self.result_queue_flag = Some(flag.into());
        self
    }
    pub fn work_dir_flag(mut self, flag: impl Into<String>) -> Self {
        self.work_dir_flag = Some(flag.into());
        self
    }
    pub fn output_file_flag(mut self, flag: impl Into<String>) -> Self {
        self.output_file_flag = Some(flag.into());
        self
    }
    pub fn workflow(mut self, workflow: impl Into<String>) -> Self {
        self.workflow = Some(workflow.into());
        self
    }
    pub fn run_option(mut self, flag: impl Into<String>, value: impl Into<String>) -> Self {
        self.run_options.insert(flag.into(), value.into());
        self
    }

    /// Fills unset options with the stock Kepler installation's values.
    pub fn build(self) -> LaunchConfig {
        let defaults = LaunchConfig::default();
        LaunchConfig {
            executable: self.executable.unwrap_or(defaults.executable),
            result_queue_flag: self.result_queue_flag.unwrap_or(defaults.result_queue_flag),
            work_dir_flag: self.work_dir_flag.unwrap_or(defaults.work_dir_flag),
            output_file_flag: self.output_file_flag.unwrap_or(defaults.output_file_flag),
            workflow: self.workflow.unwrap_or(defaults.workflow),
            run_options: self.run_options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_broker_addresses() {
        assert_eq!(
            "amq.example.org:61613".parse::<BrokerAddress>().unwrap(),
            BrokerAddress::new("amq.example.org", 61613)
        );
        assert!("amq.example.org".parse::<BrokerAddress>().is_err());
        assert!(":61613".parse::<BrokerAddress>().is_err());
        assert!("host:notaport".parse::<BrokerAddress>().is_err());
    }

    #[test]
    fn broker_config_requires_brokers_and_credentials() {
        assert_eq!(
            BrokerConfigBuilder::new().user("u").password("p").build(),
            Err(ConfigError::MissingParameter("brokers"))
        );
        assert_eq!(
            BrokerConfigBuilder::new()
                .broker(BrokerAddress::new("localhost", 61613))
                .password("p")
                .build(),
            Err(ConfigError::MissingParameter("amq_user"))
        );
        let config = BrokerConfigBuilder::new()
            .broker(BrokerAddress::new("localhost", 61613))
            .user("u")
            .password("p")
            .build()
            .unwrap();
        assert_eq!(config.client_id, "camm");
    }

    #[test]
    fn reply_queue_is_suffixed_with_the_instance() {
        assert_eq!(QueueConfig::default().reply_queue("4242"), "RESULTS.READY.4242");
    }

    #[test]
    fn launch_builder_keeps_defaults_for_unset_options() {
        let config = LaunchConfigBuilder::new()
            .workflow("/opt/wf/camm.xml")
            .run_option("-ssh", "yes")
            .build();
        assert_eq!(config.executable, PathBuf::from("/usr/local/kepler/kepler.sh"));
        assert_eq!(config.result_queue_flag, "-qName");
        assert_eq!(config.workflow, "/opt/wf/camm.xml");
        assert_eq!(config.run_options.get("-ssh").map(String::as_str), Some("yes"));
    }
}
