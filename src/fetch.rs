//! Fetch units: one outbound GET and its outcome
//!
//! A [`FetchUnit`] is created per target and fetched at most once. Its outcome is a
//! write-once slot filled by the task that ran the fetch. When the target answers,
//! only the status line is captured; the body stays on the wire until someone asks
//! for it through [`FetchUnit::body`], and is cached from then on.

use crate::error::FetchError;
use crate::types::{ResultRecord, TargetDescriptor};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;
use url::Url;

/// One target plus everything needed to fetch it
#[derive(Debug)]
pub struct FetchUnit {
    target: TargetDescriptor,
    headers: HashMap<String, String>,
    query_params: Vec<(String, String)>,
    timeout: Duration,
    outcome: OnceLock<Fetched>,
}

/// The terminal state of a fetch unit
#[derive(Debug)]
pub enum Fetched {
    /// The target answered within the timeout (any status code)
    Response(ResponseHandle),
    /// The call failed or timed out
    Failed {
        /// Why it failed
        error: FetchError,
        /// Time from issuing the call until the failure
        elapsed: Duration,
    },
}

/// A received response whose body has not necessarily been read yet
#[derive(Debug)]
pub struct ResponseHandle {
    status: StatusCode,
    /// Reason phrase as sent, when it differs from the canonical one
    reason: Option<String>,
    elapsed: Duration,
    timeout: Duration,
    /// Issue time plus timeout; bounds the body read too
    deadline: Instant,
    pending: Mutex<Option<reqwest::Response>>,
    body: OnceCell<Result<Bytes, FetchError>>,
}

impl ResponseHandle {
    fn new(response: reqwest::Response, issued: Instant, timeout: Duration) -> Self {
        let reason = response
            .extensions()
            .get::<hyper::ext::ReasonPhrase>()
            .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned());

        Self {
            status: response.status(),
            reason,
            elapsed: issued.elapsed(),
            timeout,
            deadline: issued + timeout,
            pending: Mutex::new(Some(response)),
            body: OnceCell::new(),
        }
    }

    /// Numeric status code
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Status line text as received, e.g. "200 OK"
    ///
    /// The reason phrase is the one the target sent; the canonical phrase is only
    /// used when the target's matched it or sent none.
    pub fn status_text(&self) -> String {
        match self.reason.as_deref().or(self.status.canonical_reason()) {
            Some(reason) if !reason.is_empty() => format!("{} {}", self.status.as_u16(), reason),
            _ => self.status.as_u16().to_string(),
        }
    }

    /// Time from issuing the call until the response headers arrived
    ///
    /// The body read is not included; it may happen much later, when output is written.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// True once the body has been read (successfully or not)
    pub fn is_materialized(&self) -> bool {
        self.body.initialized()
    }

    /// Read the body on first call, return the cached bytes afterwards
    pub async fn body(&self) -> Result<&Bytes, &FetchError> {
        self.body.get_or_init(|| self.read_body()).await.as_ref()
    }

    async fn read_body(&self) -> Result<Bytes, FetchError> {
        let Some(response) = self.pending.lock().await.take() else {
            return Err(FetchError::Body("response body already consumed".into()));
        };

        // The response (and its connection) is dropped when this future ends.
        // A body that has already arrived completes even past the deadline.
        match tokio::time::timeout_at(self.deadline, response.bytes()).await {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) => Err(FetchError::from_reqwest(&e, self.timeout)),
            Err(_) => Err(FetchError::Timeout {
                after: self.timeout,
            }),
        }
    }
}

impl Fetched {
    /// Elapsed time regardless of outcome
    pub fn elapsed(&self) -> Duration {
        match self {
            Fetched::Response(handle) => handle.elapsed,
            Fetched::Failed { elapsed, .. } => *elapsed,
        }
    }
}

impl FetchUnit {
    /// Create an unfetched unit for `target`
    pub fn new(target: TargetDescriptor, timeout: Duration) -> Self {
        Self {
            target,
            headers: HashMap::new(),
            query_params: Vec::new(),
            timeout,
            outcome: OnceLock::new(),
        }
    }

    /// Attach a request header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Append a query parameter; existing keys in the URL are kept, not replaced
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Caller identifier
    pub fn id(&self) -> &str {
        &self.target.id
    }

    /// Target URL as supplied
    pub fn url(&self) -> &str {
        &self.target.url
    }

    /// The descriptor this unit was built from
    pub fn target(&self) -> &TargetDescriptor {
        &self.target
    }

    /// Timeout applied to this unit
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Request headers
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Extra query parameters
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query_params
    }

    /// Outcome, once the fetch has finished
    pub fn outcome(&self) -> Option<&Fetched> {
        self.outcome.get()
    }

    /// True once an outcome has been stored
    pub fn is_complete(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// A fresh, unfetched copy of this unit using `timeout`
    pub fn renewed(&self, timeout: Duration) -> Self {
        Self {
            target: self.target.clone(),
            headers: self.headers.clone(),
            query_params: self.query_params.clone(),
            timeout,
            outcome: OnceLock::new(),
        }
    }

    /// Issue the call and store its outcome
    ///
    /// Never fails: every problem becomes a [`Fetched::Failed`] outcome. A unit that
    /// already holds an outcome is left untouched and no request is sent.
    pub async fn fetch(&self, client: &reqwest::Client) {
        if self.is_complete() {
            tracing::warn!(id = %self.target.id, "fetch unit already completed, not fetching again");
            return;
        }

        tracing::debug!(id = %self.target.id, url = %self.target.url, timeout_ms = self.timeout.as_millis() as u64, "fetching target");

        let issued = Instant::now();
        let fetched = match self.send(client, issued + self.timeout).await {
            Ok(response) => {
                let handle = ResponseHandle::new(response, issued, self.timeout);
                tracing::debug!(
                    id = %self.target.id,
                    status = handle.status_code(),
                    elapsed_ms = handle.elapsed().as_millis() as u64,
                    "target responded"
                );
                Fetched::Response(handle)
            }
            Err(error) => {
                let elapsed = issued.elapsed();
                tracing::warn!(
                    id = %self.target.id,
                    url = %self.target.url,
                    timed_out = error.is_timeout(),
                    error = %error,
                    "target fetch failed"
                );
                Fetched::Failed { error, elapsed }
            }
        };

        if self.outcome.set(fetched).is_err() {
            tracing::warn!(id = %self.target.id, "outcome already stored by a concurrent fetch");
        }
    }

    async fn send(
        &self,
        client: &reqwest::Client,
        deadline: Instant,
    ) -> Result<reqwest::Response, FetchError> {
        let url = self.request_url()?;
        let headers = self.header_map()?;
        let request = client.get(url).headers(headers).send();

        match tokio::time::timeout_at(deadline, request).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(FetchError::from_reqwest(&e, self.timeout)),
            Err(_) => Err(FetchError::Timeout {
                after: self.timeout,
            }),
        }
    }

    /// Target URL with the extra query parameters appended
    pub fn request_url(&self) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.target.url).map_err(|e| FetchError::InvalidUrl {
            url: self.target.url.clone(),
            reason: e.to_string(),
        })?;

        if !self.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    fn header_map(&self) -> Result<HeaderMap, FetchError> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| FetchError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| FetchError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            map.append(header_name, header_value);
        }
        Ok(map)
    }

    /// Response body, read from the wire on first use and cached
    pub async fn body(&self) -> Result<&Bytes, FetchError> {
        match self.outcome.get() {
            None => Err(FetchError::Aborted("target was never fetched".into())),
            Some(Fetched::Failed { error, .. }) => Err(error.clone()),
            Some(Fetched::Response(handle)) => handle.body().await.map_err(Clone::clone),
        }
    }

    /// Materialize the serialization-ready record for this unit
    ///
    /// Reads the body if needed. Calling it again returns an identical record.
    pub async fn result_record(&self) -> ResultRecord {
        let id = self.target.id.clone();
        match self.outcome.get() {
            None => ResultRecord::failure(
                id,
                FetchError::Aborted("fetch did not complete".into()),
            ),
            Some(Fetched::Failed { error, .. }) => ResultRecord::failure(id, error.clone()),
            Some(Fetched::Response(handle)) => match handle.body().await {
                Ok(body) => ResultRecord::success(
                    id,
                    handle.status_code(),
                    handle.status_text(),
                    handle.elapsed(),
                    body.clone(),
                ),
                Err(error) => ResultRecord::failure(id, error.clone()),
            },
        }
    }
}
