//! The wire message pushed to the collector.

use serde::{Deserialize, Serialize};

/// Outcome of a probe group run, as reported to the collector.
///
/// A probe that runs and exits non-zero is not an agent error; it is
/// carried in the message as `FAILURE` and sent normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeStatus {
    Success,
    Failure,
}

impl ProbeStatus {
    pub fn from_exit(success: bool) -> Self {
        if success {
            ProbeStatus::Success
        } else {
            ProbeStatus::Failure
        }
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeStatus::Success => write!(f, "SUCCESS"),
            ProbeStatus::Failure => write!(f, "FAILURE"),
        }
    }
}

/// One monitoring report: a single line of text, sealed as a unit before
/// transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorMessage {
    pub status: ProbeStatus,
    pub retries: u32,
    pub payload: String,
}

impl MonitorMessage {
    pub fn new(status: ProbeStatus, retries: u32, payload: String) -> Self {
        Self { status, retries, payload }
    }

    /// Render the wire line: `MONITOR <SUCCESS|FAILURE> <retries> <payload>\n`.
    pub fn to_line(&self) -> String {
        format!("MONITOR {} {} {}\n", self.status, self.retries, self.payload)
    }
}
