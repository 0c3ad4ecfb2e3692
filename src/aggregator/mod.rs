//! The aggregator: concurrent fan-out over an ordered set of fetch units
//!
//! Units are registered in order (at construction or via [`Aggregator::add`]). A call to
//! [`Aggregator::process`] freezes the current list, runs one tokio task per unit, waits
//! for every task, then hands the results to the configured formatter in registration
//! order. Completion order never leaks into the output: each task writes only into its
//! own unit, and records are read back by position.
//!
//! Structural changes (`add`) are serialized by a lock, but must not overlap a running
//! `process` call. That is a caller contract, not something the aggregator enforces.

use crate::config::{DEFAULT_TIMEOUT, FetchConfig};
use crate::error::{Error, Result};
use crate::fetch::FetchUnit;
use crate::output::{DEFAULT_DELIMITER, Formatter, OutputFormatter, normalize_delimiter};
use crate::types::{BatchSummary, OutputMode, ResultRecord, TargetDescriptor};
use futures::future::join_all;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Fans out GET requests and renders one aggregated response
pub struct Aggregator {
    client: reqwest::Client,
    /// Registered units in output order (the mutation lock)
    units: Mutex<Vec<Arc<FetchUnit>>>,
    /// Units of the most recent completed `process` call
    last_batch: Mutex<Option<Vec<Arc<FetchUnit>>>>,
    output_mode: OutputMode,
    /// Framed with line breaks, see [`normalize_delimiter`]
    delimiter: String,
    timeout: Duration,
}

impl Aggregator {
    /// Create an aggregator with its own HTTP client
    pub fn new(targets: impl IntoIterator<Item = TargetDescriptor>) -> Result<Self> {
        let client = FetchConfig::default().build_client()?;
        Ok(Self::with_client(client, targets))
    }

    /// Create an aggregator sharing an existing client (and its connection pool)
    ///
    /// Defaults: JSON output, the `---XXX---` delimiter, 10 s timeout per unit.
    pub fn with_client(
        client: reqwest::Client,
        targets: impl IntoIterator<Item = TargetDescriptor>,
    ) -> Self {
        let units = targets
            .into_iter()
            .map(|target| Arc::new(FetchUnit::new(target, DEFAULT_TIMEOUT)))
            .collect();

        Self {
            client,
            units: Mutex::new(units),
            last_batch: Mutex::new(None),
            output_mode: OutputMode::default(),
            delimiter: normalize_delimiter(DEFAULT_DELIMITER),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a target; it gets the timeout configured at the time of the call
    pub async fn add(&self, target: TargetDescriptor) {
        self.add_unit(FetchUnit::new(target, self.timeout)).await;
    }

    /// Append a prepared unit (custom headers or query parameters)
    pub async fn add_unit(&self, unit: FetchUnit) {
        let mut units = self.units.lock().await;
        tracing::debug!(id = %unit.id(), position = units.len(), "target added");
        units.push(Arc::new(unit));
    }

    /// Set the timeout for future additions and every registered unit
    ///
    /// Registered units are replaced by unfetched copies carrying the new timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
        for unit in self.units.get_mut().iter_mut() {
            *unit = Arc::new(unit.renewed(timeout));
        }
    }

    /// Switch output mode; a delimiter replaces the stored one only when given
    pub fn set_output_mode(&mut self, mode: OutputMode, delimiter: Option<&str>) {
        self.output_mode = mode;
        if let Some(delimiter) = delimiter {
            self.delimiter = normalize_delimiter(delimiter);
        }
    }

    /// Render results as a JSON array
    pub fn use_json(&mut self) {
        self.set_output_mode(OutputMode::Json, None);
    }

    /// Render results as text blocks separated by `delimiter`
    pub fn use_delimiter(&mut self, delimiter: &str) {
        self.set_output_mode(OutputMode::Delimited, Some(delimiter));
    }

    /// Current default timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Current output mode
    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    /// Current delimiter, already framed with line breaks
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// The formatter `process` would use right now
    pub fn formatter(&self) -> Formatter {
        Formatter::for_mode(self.output_mode, &self.delimiter)
    }

    /// Content type of the output `process` would produce right now
    pub fn content_type(&self) -> &'static str {
        self.formatter().content_type()
    }

    /// Number of registered units
    pub async fn len(&self) -> usize {
        self.units.lock().await.len()
    }

    /// True if no units are registered
    pub async fn is_empty(&self) -> bool {
        self.units.lock().await.is_empty()
    }

    /// Registered units in output order
    pub async fn units(&self) -> Vec<Arc<FetchUnit>> {
        self.units.lock().await.clone()
    }

    /// Fetch every registered unit concurrently and write the aggregated output to `sink`
    ///
    /// Per-target failures never fail this call; they show up as failure records.
    /// Errors are only returned when the output cannot be written. Calling `process`
    /// again fetches every unit anew.
    pub async fn process(&self, sink: &mut (dyn Write + Send)) -> Result<BatchSummary> {
        let started = Instant::now();
        let batch = self.snapshot().await;
        let formatter = self.formatter();

        tracing::info!(
            targets = batch.len(),
            mode = %self.output_mode,
            timeout_ms = self.timeout.as_millis() as u64,
            "processing batch"
        );

        let handles: Vec<_> = batch
            .iter()
            .map(|unit| {
                let unit = Arc::clone(unit);
                let client = self.client.clone();
                tokio::spawn(async move { unit.fetch(&client).await })
            })
            .collect();

        // Barrier: every task has finished past this point
        for (unit, joined) in batch.iter().zip(join_all(handles).await) {
            if let Err(e) = joined {
                tracing::error!(id = %unit.id(), error = %e, "fetch task did not complete");
            }
        }

        let records = collect_records(&batch).await;
        let summary = BatchSummary::from_records(&records, started.elapsed());
        *self.last_batch.lock().await = Some(batch);

        formatter.write(&records, sink)?;

        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            timed_out = summary.timed_out,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "batch complete"
        );

        Ok(summary)
    }

    /// Write the results of the last `process` call again, without any network access
    pub async fn render(&self, sink: &mut (dyn Write + Send)) -> Result<()> {
        let batch = self
            .last_batch
            .lock()
            .await
            .clone()
            .ok_or_else(|| Error::Other("no processed batch to render".into()))?;

        let records = collect_records(&batch).await;
        self.formatter().write(&records, sink)
    }

    /// Freeze batch membership, swapping already-fetched units for fresh copies
    async fn snapshot(&self) -> Vec<Arc<FetchUnit>> {
        let mut units = self.units.lock().await;
        for unit in units.iter_mut() {
            if unit.is_complete() {
                *unit = Arc::new(unit.renewed(unit.timeout()));
            }
        }
        units.clone()
    }
}

/// Result records in positional order; bodies are read concurrently
async fn collect_records(batch: &[Arc<FetchUnit>]) -> Vec<ResultRecord> {
    join_all(batch.iter().map(|unit| unit.result_record())).await
}
