use super::config::ConfigError;
use super::stomp::frame::FrameError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Malformed frame: {0}")]
    Frame(#[from] FrameError),

    #[error("Failed to encode or decode message body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Broker refused the request: {message}")]
    Refused { message: String },

    #[error("Unexpected '{command}' frame while waiting for '{expected}'")]
    UnexpectedFrame {
        command: String,
        expected: &'static str,
    },

    #[error("Could not connect to any broker ({attempts} attempted)")]
    Unreachable { attempts: usize },

    #[error("Connection closed by the broker")]
    ConnectionClosed,

    #[error("Not subscribed to '{0}'")]
    NotSubscribed(String),

    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write results file '{path}': {source}")]
    Results {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
