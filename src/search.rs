use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::{Job, SearchParams};

pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred while fetching jobs";
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// Transport failure or non-2xx status.
    #[error("{0}")]
    Network(String),

    /// Superseded by a newer search. Never shown to the user.
    #[error("search superseded by a newer request")]
    Cancelled,

    #[error("Unexpected response from search backend: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    InvalidParams(String),
}

impl SearchError {
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            DEFAULT_ERROR_MESSAGE.to_string()
        } else {
            message
        }
    }
}

// --- Backend ---

#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, params: &SearchParams) -> Result<Vec<Job>, SearchError>;
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBackend {
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    #[cfg(test)]
    fn with_client(endpoint: &str, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SearchBackend for HttpBackend {
    async fn search(&self, params: &SearchParams) -> Result<Vec<Job>, SearchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(params)
            .send()
            .await
            .map_err(|e| SearchError::Network(describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Network(status_error_message(status, &body)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SearchError::Network(describe_transport_error(&e)))?;
        parse_jobs(&body)
    }
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timed out".to_string()
    } else if e.is_connect() {
        "Network Error: could not reach the search service".to_string()
    } else {
        e.to_string()
    }
}

/// The backend's own `detail` (or `message`) wins over the status line.
pub fn status_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["detail", "message", "error"] {
            if let Some(text) = value.get(field).and_then(|v| v.as_str()) {
                if !text.trim().is_empty() {
                    return text.to_string();
                }
            }
        }
    }
    format!("Request failed with status code {}", status.as_u16())
}

pub fn parse_jobs(body: &[u8]) -> Result<Vec<Job>, SearchError> {
    serde_json::from_slice::<Vec<Job>>(body)
        .map_err(|e| SearchError::MalformedResponse(e.to_string()))
}

pub fn validate(params: &SearchParams) -> Result<(), SearchError> {
    if params.limit == 0 {
        return Err(SearchError::InvalidParams(
            "Limit must be a positive number".to_string(),
        ));
    }
    if params.limit > MAX_LIMIT {
        return Err(SearchError::InvalidParams(format!(
            "Limit must be at most {}",
            MAX_LIMIT
        )));
    }
    Ok(())
}

// --- Session ---

#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub jobs: Arc<Vec<Job>>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RequestTicket {
    id: u64,
    token: CancellationToken,
}

struct Inner {
    state: SearchState,
    current: u64,
    in_flight: Option<CancellationToken>,
}

/// Owns the search lifecycle: at most one request is live, and only the
/// most recently issued one may touch the state.
#[derive(Clone)]
pub struct SearchSession {
    backend: Arc<dyn SearchBackend>,
    inner: Arc<Mutex<Inner>>,
}

impl SearchSession {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            inner: Arc::new(Mutex::new(Inner {
                state: SearchState::default(),
                current: 0,
                in_flight: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> SearchState {
        self.lock().state.clone()
    }

    /// Run one search to completion. Safe to call again while a previous
    /// call is still pending; the older call then finishes without
    /// touching the state.
    pub async fn search(&self, params: SearchParams) {
        let ticket = self.begin();
        info!(
            request_id = ticket.id,
            role = %params.role,
            location = %params.location,
            work_type = %params.work_type,
            limit = params.limit,
            "search issued"
        );

        let outcome = match validate(&params) {
            Err(e) => Err(e),
            Ok(()) => {
                tokio::select! {
                    biased;
                    _ = ticket.token.cancelled() => Err(SearchError::Cancelled),
                    result = self.backend.search(&params) => result,
                }
            }
        };

        self.complete(&ticket, outcome);
    }

    /// Supersede whatever is in flight and mark the session as loading.
    /// The job list is left in place until the new result arrives.
    pub fn begin(&self) -> RequestTicket {
        let mut inner = self.lock();
        if let Some(previous) = inner.in_flight.take() {
            previous.cancel();
            debug!(request_id = inner.current, "cancelled superseded search");
        }
        inner.current += 1;
        let token = CancellationToken::new();
        inner.in_flight = Some(token.clone());
        inner.state.loading = true;
        inner.state.error = None;
        RequestTicket {
            id: inner.current,
            token,
        }
    }

    /// Apply an outcome if `ticket` is still the current request.
    /// Returns whether the state changed.
    pub fn complete(&self, ticket: &RequestTicket, outcome: Result<Vec<Job>, SearchError>) -> bool {
        let mut inner = self.lock();
        if ticket.id != inner.current {
            debug!(
                request_id = ticket.id,
                current = inner.current,
                "discarding stale search result"
            );
            return false;
        }

        match outcome {
            Err(SearchError::Cancelled) => {
                debug!(request_id = ticket.id, "search cancelled");
                return false;
            }
            Ok(jobs) => {
                info!(request_id = ticket.id, count = jobs.len(), "search completed");
                inner.state.jobs = Arc::new(jobs);
            }
            Err(e) => {
                warn!(request_id = ticket.id, "search failed: {}", e);
                inner.state.error = Some(e.user_message());
            }
        }
        inner.state.loading = false;
        inner.in_flight = None;
        true
    }

    pub fn cancel(&self) {
        let mut inner = self.lock();
        if let Some(token) = inner.in_flight.take() {
            token.cancel();
            inner.current += 1;
            inner.state.loading = false;
            debug!("search cancelled by user");
        }
    }
}
