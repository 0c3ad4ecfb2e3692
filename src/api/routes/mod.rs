//! Route handlers
//!
//! - [`aggregate`] - Fan-out aggregation (every path except `/health`)
//! - [`system`] - Health

use crate::aggregator::Aggregator;
use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::types::{OutputMode, TargetDescriptor};
use std::time::Duration;

mod aggregate;
mod system;

pub use aggregate::*;
pub use system::*;

/// Message for a missing or empty `requests` parameter
pub const MISSING_REQUESTS_MESSAGE: &str = "Bad Request: required parameter 'requests' missing.";

/// Message for a `requests` entry that is not an `id:url` pair
pub const MALFORMED_REQUESTS_MESSAGE: &str = "Bad Request: entries should be in comma separated multiple 'id:url' format e.g. 'sampleid:http://url.com,sampleid2:http://url2.com'";

/// Message for a `timeout` that is not a whole number of milliseconds
pub const INVALID_TIMEOUT_MESSAGE: &str =
    "Bad Request: parameter 'timeout' should be a whole number of milliseconds.";

// ============================================================================
// Query parameters
// ============================================================================

/// Validated query parameters of an aggregation request
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateParams {
    /// Targets in the order they appeared in `requests`
    pub targets: Vec<TargetDescriptor>,
    /// `None` when absent or `0`: use the configured default
    pub timeout: Option<Duration>,
    /// `None` when absent or empty: JSON
    pub output_mode: Option<OutputMode>,
    /// `None` when absent or empty: use the configured default
    pub delimiter: Option<String>,
}

impl AggregateParams {
    /// Parse a raw query string
    ///
    /// Only the first occurrence of each parameter counts. Nothing is fetched here, so a
    /// rejected request never causes outbound traffic.
    pub fn from_query(query: Option<&str>) -> Result<Self> {
        let mut requests = None;
        let mut timeout = None;
        let mut kind = None;
        let mut delimiter = None;

        for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            let slot = match key.as_ref() {
                "requests" => &mut requests,
                "timeout" => &mut timeout,
                "type" => &mut kind,
                "delimiter" => &mut delimiter,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        let requests = requests
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| Error::InvalidRequest(MISSING_REQUESTS_MESSAGE.into()))?;
        let targets = parse_targets(&requests)?;

        let output_mode = kind
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::parse::<OutputMode>)
            .transpose()?;

        let timeout = timeout
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(parse_timeout)
            .transpose()?
            .flatten();

        Ok(Self {
            targets,
            timeout,
            output_mode,
            delimiter: delimiter.filter(|d| !d.is_empty()),
        })
    }

    /// Apply timeout and output settings, falling back to `defaults`
    pub fn configure(&self, aggregator: &mut Aggregator, defaults: &FetchConfig) {
        aggregator.set_timeout(self.timeout.unwrap_or(defaults.default_timeout));

        match self.output_mode.unwrap_or_default() {
            OutputMode::Json => aggregator.use_json(),
            OutputMode::Delimited => aggregator
                .use_delimiter(self.delimiter.as_deref().unwrap_or(&defaults.delimiter)),
        }
    }
}

/// Split `id1:url1,id2:url2` into targets
///
/// Entries split on the first `:` only, so URLs keep their scheme and port. Ids and
/// URLs are trimmed; URLs are validated later, per target.
pub fn parse_targets(requests: &str) -> Result<Vec<TargetDescriptor>> {
    requests
        .split(',')
        .map(|entry| {
            entry
                .split_once(':')
                .map(|(id, url)| TargetDescriptor::new(id.trim(), url.trim()))
                .ok_or_else(|| Error::InvalidRequest(MALFORMED_REQUESTS_MESSAGE.into()))
        })
        .collect()
}

/// `0` means "not set"
fn parse_timeout(value: &str) -> Result<Option<Duration>> {
    let millis: u64 = value
        .parse()
        .map_err(|_| Error::InvalidRequest(INVALID_TIMEOUT_MESSAGE.into()))?;
    Ok((millis > 0).then(|| Duration::from_millis(millis)))
}
