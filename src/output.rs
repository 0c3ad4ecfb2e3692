//! Output formatters
//!
//! A formatter turns the ordered result records of a batch into the response bytes.
//! Formatters are pure: they never touch the network and never mutate the aggregator,
//! so rendering the same records twice yields identical output.

use crate::error::Result;
use crate::types::{OutputMode, RecordOutcome, ResultRecord};
use serde::Serialize;
use std::borrow::Cow;
use std::io::Write;

/// Separator used by delimited output unless the caller picks one
pub const DEFAULT_DELIMITER: &str = "---XXX---";

/// Content type of structured output
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Content type of delimited output
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Renders ordered result records into a byte sink
pub trait OutputFormatter: Send + Sync {
    /// Content type to declare for the produced bytes
    fn content_type(&self) -> &'static str;

    /// Write every record, in order, to `sink`
    fn write(&self, records: &[ResultRecord], sink: &mut dyn Write) -> Result<()>;

    /// Convenience wrapper collecting the output in memory
    fn render(&self, records: &[ResultRecord]) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write(records, &mut buf)?;
        Ok(buf)
    }
}

/// Frame a delimiter with line breaks so a body never touches the separator
///
/// A single pass: a leading `\n` is added unless present, then a trailing one.
pub fn normalize_delimiter(delimiter: &str) -> String {
    let mut framed = String::with_capacity(delimiter.len() + 2);
    if !delimiter.starts_with('\n') {
        framed.push('\n');
    }
    framed.push_str(delimiter);
    if !framed.ends_with('\n') {
        framed.push('\n');
    }
    framed
}

/// JSON array output, one object per record
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuredFormatter;

/// Wire shape of one record; absent fields are omitted, never null
#[derive(Serialize)]
struct RecordJson<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Cow<'a, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> From<&'a ResultRecord> for RecordJson<'a> {
    fn from(record: &'a ResultRecord) -> Self {
        match &record.outcome {
            RecordOutcome::Success {
                status_code,
                status,
                duration,
                body,
            } => RecordJson {
                id: &record.id,
                status_code: Some(*status_code),
                status: Some(status),
                duration: Some(format!("{}ms", duration.as_millis())),
                body: Some(String::from_utf8_lossy(body)),
                error: None,
            },
            RecordOutcome::Failure(error) => RecordJson {
                id: &record.id,
                status_code: None,
                status: None,
                duration: None,
                body: None,
                error: Some(error.to_string()),
            },
        }
    }
}

impl OutputFormatter for StructuredFormatter {
    fn content_type(&self) -> &'static str {
        JSON_CONTENT_TYPE
    }

    fn write(&self, records: &[ResultRecord], sink: &mut dyn Write) -> Result<()> {
        let rows: Vec<RecordJson<'_>> = records.iter().map(RecordJson::from).collect();
        serde_json::to_writer(&mut *sink, &rows)?;
        Ok(())
    }
}

/// Plain text blocks joined by a framed delimiter
#[derive(Clone, Debug)]
pub struct DelimitedFormatter {
    delimiter: String,
}

impl DelimitedFormatter {
    /// Create a formatter; the delimiter is framed with [`normalize_delimiter`]
    pub fn new(delimiter: &str) -> Self {
        Self {
            delimiter: normalize_delimiter(delimiter),
        }
    }

    /// The framed delimiter written between blocks
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    fn write_block(record: &ResultRecord, sink: &mut dyn Write) -> std::io::Result<()> {
        match &record.outcome {
            RecordOutcome::Success {
                status,
                duration,
                body,
                ..
            } => {
                writeln!(
                    sink,
                    "Id: {}, Status: {}, Duration: {}ms",
                    record.id,
                    status,
                    duration.as_millis()
                )?;
                sink.write_all(body)
            }
            RecordOutcome::Failure(error) => {
                write!(sink, "Id: {}, Status: error\n{}", record.id, error)
            }
        }
    }
}

impl Default for DelimitedFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER)
    }
}

impl OutputFormatter for DelimitedFormatter {
    fn content_type(&self) -> &'static str {
        TEXT_CONTENT_TYPE
    }

    fn write(&self, records: &[ResultRecord], sink: &mut dyn Write) -> Result<()> {
        for (i, record) in records.iter().enumerate() {
            if i > 0 {
                sink.write_all(self.delimiter.as_bytes())?;
            }
            Self::write_block(record, sink)?;
        }
        Ok(())
    }
}

/// The formatter selected for one `process` call
#[derive(Clone, Debug)]
pub enum Formatter {
    /// JSON array
    Structured(StructuredFormatter),
    /// Delimited text
    Delimited(DelimitedFormatter),
}

impl Formatter {
    /// Pick the formatter for `mode`; `delimiter` is only used by delimited output
    pub fn for_mode(mode: OutputMode, delimiter: &str) -> Self {
        match mode {
            OutputMode::Json => Formatter::Structured(StructuredFormatter),
            OutputMode::Delimited => Formatter::Delimited(DelimitedFormatter::new(delimiter)),
        }
    }

    fn inner(&self) -> &dyn OutputFormatter {
        match self {
            Formatter::Structured(f) => f,
            Formatter::Delimited(f) => f,
        }
    }
}

impl OutputFormatter for Formatter {
    fn content_type(&self) -> &'static str {
        self.inner().content_type()
    }

    fn write(&self, records: &[ResultRecord], sink: &mut dyn Write) -> Result<()> {
        self.inner().write(records, sink)
    }
}
