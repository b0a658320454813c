use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A broker destination path.
///
/// Bare names are queues, so `PARAMS.READY` becomes `/queue/PARAMS.READY`;
/// names starting with `/` (such as `/topic/...`) are kept as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination(String);

impl Destination {
    pub fn new(name: &str) -> Self {
        if name.starts_with('/') {
            Self(name.to_string())
        } else {
            Self(format!("/queue/{name}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_topic(&self) -> bool {
        self.0.starts_with("/topic/")
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Destination {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Posted by the optimizer side on the params-ready destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Raw text of the optimizer's parameters file.
    pub params: String,
    pub output_file: String,
    pub amq_results_queue: String,
    pub working_directory: String,
}

/// Posted by the workflow on the reply queue named in the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReply {
    pub output_file: String,
    #[serde(deserialize_with = "number_or_numeric_string")]
    pub cost_function: f64,
}

/// Workflow engines sometimes send the cost function as a string.
fn number_or_numeric_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    struct CostVisitor;

    impl Visitor<'_> for CostVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number or a numeric string")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            v.trim()
                .parse()
                .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }

    deserializer.deserialize_any(CostVisitor)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    DakotaStart,
    StartIteration,
    StopIteration,
    DakotaStop,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::DakotaStart,
        JobStatus::StartIteration,
        JobStatus::StopIteration,
        JobStatus::DakotaStop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::DakotaStart => "dakota_start",
            JobStatus::StartIteration => "start_iteration",
            JobStatus::StopIteration => "stop_iteration",
            JobStatus::DakotaStop => "dakota_stop",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of an optimization job, broadcast on the status topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub instance_number: String,
    pub user: String,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub status: JobStatus,
    #[serde(default)]
    pub code: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_names_are_queues() {
        assert_eq!(Destination::new("PARAMS.READY").as_str(), "/queue/PARAMS.READY");
        let topic = Destination::new("/topic/SNS.CAMM.STATUS.JOBS");
        assert_eq!(topic.as_str(), "/topic/SNS.CAMM.STATUS.JOBS");
        assert!(topic.is_topic());
    }

    #[test]
    fn job_request_uses_the_wire_field_names() {
        let request = JobRequest {
            params: "X".into(),
            output_file: "out.dat".into(),
            amq_results_queue: "Q1".into(),
            working_directory: "/tmp".into(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "params": "X",
                "output_file": "out.dat",
                "amq_results_queue": "Q1",
                "working_directory": "/tmp"
            })
        );
    }

    #[test]
    fn reply_cost_function_accepts_numbers_and_numeric_strings() {
        let reply: JobReply = serde_json::from_str(r#"{"output_file":"out.dat","cost_function":3.14}"#).unwrap();
        assert_eq!(reply.cost_function, 3.14);

        let reply: JobReply =
            serde_json::from_str(r#"{"params":"test","output_file":"r.7","cost_function":"7"}"#).unwrap();
        assert_eq!(reply.cost_function, 7.0);

        assert!(serde_json::from_str::<JobReply>(r#"{"output_file":"o","cost_function":"high"}"#).is_err());
        assert!(serde_json::from_str::<JobReply>(r#"{"output_file":"o"}"#).is_err());
    }

    #[test]
    fn status_names_match_the_wire_format() {
        let report = StatusReport {
            instance_number: "12".into(),
            user: "camm".into(),
            timestamp: 1.5,
            status: JobStatus::StartIteration,
            code: 0,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["status"], "start_iteration");
        for status in JobStatus::ALL {
            assert_eq!(serde_json::to_value(status).unwrap(), status.as_str());
        }
    }
}
