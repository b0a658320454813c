use crate::error::{CliError, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// A broker location, written either as `["host", port]` or `"host:port"`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum FileBrokerAddress {
    Pair(String, u16),
    Text(String),
}

/// Queue names, as a list or as one comma-separated string.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
enum QueueNames {
    List(Vec<String>),
    Text(String),
}

impl QueueNames {
    fn into_names(self) -> Vec<String> {
        match self {
            QueueNames::List(names) => names,
            QueueNames::Text(text) => text
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// The JSON configuration shared by the optimizer driver and the listener.
///
/// Each key is read on its own: a key with a value of the wrong shape is reported
/// and left unset, and unknown keys are tolerated so one file can serve other
/// tools of the pipeline.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PartialAppConfig {
    pub brokers: Option<Vec<FileBrokerAddress>>,
    pub amq_user: Option<String>,
    pub amq_pwd: Option<String>,
    /// Extra destinations a client may listen to. Kept for compatibility only.
    pub queues: Option<Vec<String>>,
    pub params_ready_queue: Option<String>,
    pub results_ready_queue: Option<String>,
    pub status_topic: Option<String>,
    pub kepler_executable: Option<String>,
    pub kepler_result_queue_flag: Option<String>,
    pub kepler_work_dir_flag: Option<String>,
    pub kepler_output_file_flag: Option<String>,
    pub kepler_workflow: Option<String>,
    pub kepler_run_options: Option<BTreeMap<String, String>>,
}

impl PartialAppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Fails only when the document is not a JSON object.
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        let mut map: Map<String, Value> = serde_json::from_str(content)?;
        let config = Self {
            brokers: take_key::<Vec<Value>>(&mut map, "brokers").map(broker_entries),
            amq_user: take_key(&mut map, "amq_user"),
            amq_pwd: take_key(&mut map, "amq_pwd"),
            queues: take_key::<QueueNames>(&mut map, "queues").map(QueueNames::into_names),
            params_ready_queue: take_key(&mut map, "params_ready_queue"),
            results_ready_queue: take_key(&mut map, "results_ready_queue"),
            status_topic: take_key(&mut map, "status_topic"),
            kepler_executable: take_key(&mut map, "kepler_executable"),
            kepler_result_queue_flag: take_key(&mut map, "kepler_result_queue_flag"),
            kepler_work_dir_flag: take_key(&mut map, "kepler_work_dir_flag"),
            kepler_output_file_flag: take_key(&mut map, "kepler_output_file_flag"),
            kepler_workflow: take_key(&mut map, "kepler_workflow"),
            kepler_run_options: take_key::<Map<String, Value>>(&mut map, "kepler_run_options")
                .map(run_options),
        };
        if !map.is_empty() {
            debug!(
                "Ignoring configuration keys: {}",
                map.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
            );
        }
        Ok(config)
    }
}

fn take_key<T: DeserializeOwned>(map: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = map.remove(key)?;
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Ignoring configuration key '{}': {}", key, e);
            None
        }
    }
}

fn broker_entries(entries: Vec<Value>) -> Vec<FileBrokerAddress> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry.clone()) {
            Ok(address) => Some(address),
            Err(_) => {
                warn!("Ignoring broker entry {}: expected [host, port] or \"host:port\"", entry);
                None
            }
        })
        .collect()
}

/// Flag values may be written as JSON strings, numbers or booleans.
fn run_options(options: Map<String, Value>) -> BTreeMap<String, String> {
    options
        .into_iter()
        .filter_map(|(flag, value)| match value {
            Value::String(text) => Some((flag, text)),
            Value::Number(number) => Some((flag, number.to_string())),
            Value::Bool(flag_value) => Some((flag, flag_value.to_string())),
            other => {
                warn!("Ignoring run option '{}' with value {}", flag, other);
                None
            }
        })
        .collect()
}
