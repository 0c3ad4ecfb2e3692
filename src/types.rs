//! Core types shared by the fetch, aggregation and output layers

use crate::error::{Error, FetchError};
use bytes::Bytes;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A caller-supplied (identifier, URL) pair
///
/// Identifiers need not be unique; results are matched to targets by position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetDescriptor {
    /// Caller identifier echoed back in the output
    pub id: String,
    /// Target URL, fetched with GET
    pub url: String,
}

impl TargetDescriptor {
    /// Create a new target
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

/// How the aggregated response is serialized
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// A JSON array with one object per target
    #[default]
    Json,
    /// Plain text blocks joined by a delimiter
    Delimited,
}

impl OutputMode {
    /// Name as accepted on the query string
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Json => "json",
            OutputMode::Delimited => "delimiter",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputMode::Json),
            "delimiter" | "delimited" => Ok(OutputMode::Delimited),
            _ => Err(Error::UnknownOutputMode(s.trim().to_string())),
        }
    }
}

/// The serialization-ready outcome of one fetch unit
#[derive(Clone, Debug, PartialEq)]
pub struct ResultRecord {
    /// Identifier of the target that produced this record
    pub id: String,
    /// Success or failure payload
    pub outcome: RecordOutcome,
}

/// Either a response (any status code) or a failure
#[derive(Clone, Debug, PartialEq)]
pub enum RecordOutcome {
    /// The target answered within its timeout. Non-2xx statuses land here too.
    Success {
        /// Numeric status code
        status_code: u16,
        /// Status line text as sent by the target, e.g. "200 OK"
        status: String,
        /// Wall-clock time from issuing the call until the response headers arrived
        ///
        /// Covers the header phase only. The body read happens later, against the same
        /// deadline, and is not included.
        duration: Duration,
        /// Full response body
        body: Bytes,
    },
    /// Transport failure, timeout or invalid target
    Failure(FetchError),
}

impl ResultRecord {
    /// Build a success record
    pub fn success(
        id: impl Into<String>,
        status_code: u16,
        status: impl Into<String>,
        duration: Duration,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            id: id.into(),
            outcome: RecordOutcome::Success {
                status_code,
                status: status.into(),
                duration,
                body: body.into(),
            },
        }
    }

    /// Build a failure record
    pub fn failure(id: impl Into<String>, error: FetchError) -> Self {
        Self {
            id: id.into(),
            outcome: RecordOutcome::Failure(error),
        }
    }

    /// True for the success shape, whatever the status code
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RecordOutcome::Success { .. })
    }

    /// True if this record failed because its timeout expired
    pub fn is_timeout(&self) -> bool {
        self.error().is_some_and(FetchError::is_timeout)
    }

    /// Numeric status code, if the target answered
    pub fn status_code(&self) -> Option<u16> {
        match &self.outcome {
            RecordOutcome::Success { status_code, .. } => Some(*status_code),
            RecordOutcome::Failure(_) => None,
        }
    }

    /// Status text, if the target answered
    pub fn status(&self) -> Option<&str> {
        match &self.outcome {
            RecordOutcome::Success { status, .. } => Some(status),
            RecordOutcome::Failure(_) => None,
        }
    }

    /// Header-phase time in whole milliseconds, rounded down
    pub fn duration_ms(&self) -> Option<u64> {
        match &self.outcome {
            RecordOutcome::Success { duration, .. } => Some(duration.as_millis() as u64),
            RecordOutcome::Failure(_) => None,
        }
    }

    /// Response body, if the target answered
    pub fn body(&self) -> Option<&Bytes> {
        match &self.outcome {
            RecordOutcome::Success { body, .. } => Some(body),
            RecordOutcome::Failure(_) => None,
        }
    }

    /// Failure reason, if any
    pub fn error(&self) -> Option<&FetchError> {
        match &self.outcome {
            RecordOutcome::Success { .. } => None,
            RecordOutcome::Failure(error) => Some(error),
        }
    }
}

/// Counters for one completed `process` call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Number of targets in the batch
    pub total: usize,
    /// Targets that answered (any status code)
    pub succeeded: usize,
    /// Targets that produced a failure record, timeouts included
    pub failed: usize,
    /// Subset of `failed` caused by timeouts
    pub timed_out: usize,
    /// Wall-clock time of the whole batch
    pub elapsed: Duration,
}

impl BatchSummary {
    /// Tally a slice of records
    pub fn from_records(records: &[ResultRecord], elapsed: Duration) -> Self {
        let succeeded = records.iter().filter(|r| r.is_success()).count();
        let timed_out = records.iter().filter(|r| r.is_timeout()).count();
        Self {
            total: records.len(),
            succeeded,
            failed: records.len() - succeeded,
            timed_out,
            elapsed,
        }
    }
}
