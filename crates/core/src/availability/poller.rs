//! The polling state machine behind [`AvailabilityClient::search`].

use std::sync::Arc;

use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::availability::wire::{self, Classification, RawServerResponse};
use crate::availability::{NormalizedResult, SearchRequest, ServerState};
use crate::error::SearchError;
use crate::progress::{emit_poll, PollObserver, PollPhase};

pub const DEFAULT_HOST: &str = "https://api.calil.jp";

/// Client for the availability service.
///
/// Holds no per-search state: each call to [`search`](Self::search) owns its
/// own session token, so one client can serve concurrent searches.
#[derive(Clone)]
pub struct AvailabilityClient {
    http: reqwest::Client,
    endpoint: String,
    observer: Option<Arc<dyn PollObserver>>,
}

/// Mutable state of one search, discarded when it returns.
struct PollState<'a> {
    request: &'a SearchRequest,
    session: String,
    state: ServerState,
    polls: u32,
}

impl<'a> PollState<'a> {
    fn new(request: &'a SearchRequest) -> Self {
        Self {
            request,
            session: String::new(),
            state: ServerState::Initial,
            polls: 0,
        }
    }

    /// Query for the next request: the full lookup first, then session-only polls.
    fn query(&self) -> Vec<(&'static str, &str)> {
        let mut query = vec![("appkey", self.request.app_key.as_str())];
        if self.state == ServerState::Initial {
            query.push(("isbn", self.request.isbn.as_str()));
            query.push(("systemid", self.request.system_id.as_str()));
        } else {
            query.push(("session", self.session.as_str()));
        }
        query.push(("format", "json"));
        query
    }

    fn absorb_session(&mut self, raw: &RawServerResponse) {
        if let Some(token) = raw.session_token() {
            self.session = token.to_string();
        }
    }
}

impl AvailabilityClient {
    pub fn new() -> Self {
        Self::with_host(DEFAULT_HOST)
    }

    /// Point the client at another host, e.g. a mock server.
    pub fn with_host(host: &str) -> Self {
        Self::with_http_client(reqwest::Client::new(), host)
    }

    pub fn with_http_client(http: reqwest::Client, host: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/check", host.trim_end_matches('/')),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PollObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run a search to completion.
    pub async fn search(&self, request: &SearchRequest) -> Result<NormalizedResult, SearchError> {
        self.search_until_cancelled(request, &CancellationToken::new()).await
    }

    /// Run a search until it finishes or `cancel` fires. Cancellation aborts
    /// both the wait between polls and an outstanding request.
    pub async fn search_until_cancelled(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<NormalizedResult, SearchError> {
        request.validate()?;
        let mut poll = PollState::new(request);

        loop {
            self.emit(request, poll.polls, PollPhase::Requesting);
            tracing::debug!(
                isbn = %request.isbn,
                system_id = %request.system_id,
                round = poll.polls,
                "requesting availability"
            );
            let query = poll.query();
            let raw = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SearchError::Cancelled),
                raw = self.fetch(&query) => raw?,
            };
            poll.absorb_session(&raw);

            let class = wire::classify(&raw, &request.isbn, &request.system_id)?;
            poll.state = class.state();
            if poll.state.is_terminal() {
                self.emit(request, poll.polls, PollPhase::Finished { state: poll.state });
            }

            match class {
                Classification::Polling => {
                    if poll.session.is_empty() {
                        return Err(SearchError::Protocol(
                            "service asked to continue without a session token".to_string(),
                        ));
                    }
                    if poll.polls >= request.max_rounds {
                        tracing::warn!(isbn = %request.isbn, rounds = poll.polls, "giving up on availability search");
                        return Err(SearchError::PollLimitExceeded { rounds: poll.polls });
                    }
                    self.emit(
                        request,
                        poll.polls,
                        PollPhase::Waiting { interval: request.poll_interval },
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(SearchError::Cancelled),
                        _ = tokio::time::sleep(request.poll_interval) => {}
                    }
                    poll.polls += 1;
                }
                Classification::Success(entry) => {
                    let result = wire::normalize(entry)?;
                    tracing::info!(
                        isbn = %request.isbn,
                        system_id = %request.system_id,
                        libraries = result.library_stock.len(),
                        "availability search finished"
                    );
                    return Ok(result);
                }
                Classification::NotFound(entry) => {
                    tracing::info!(isbn = %request.isbn, system_id = %request.system_id, "book not held in this system");
                    return Ok(NormalizedResult {
                        continuation: 0,
                        library_stock: Vec::new(),
                        reserve_url: entry.reserveurl.clone().unwrap_or_default(),
                    });
                }
                Classification::ServerError(entry) => {
                    tracing::warn!(isbn = %request.isbn, status = ?entry.status, "availability search failed on server");
                    return Err(SearchError::Server {
                        status: StatusCode::OK.as_u16(),
                        detail: format!(
                            "search for {} in {} ended with status {:?}",
                            request.isbn, request.system_id, entry.status
                        ),
                    });
                }
            }
        }
    }

    async fn fetch(&self, query: &[(&str, &str)]) -> Result<RawServerResponse, SearchError> {
        let response = self.http.get(&self.endpoint).query(query).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(SearchError::Server {
                status: status.as_u16(),
                detail: "failed to fetch availability response".to_string(),
            });
        }
        let body = response.text().await?;
        wire::decode(&body)
    }

    fn emit(&self, request: &SearchRequest, round: u32, phase: PollPhase) {
        emit_poll(
            self.observer.as_deref(),
            &request.isbn,
            &request.system_id,
            round,
            phase,
        );
    }
}

impl Default for AvailabilityClient {
    fn default() -> Self {
        Self::new()
    }
}
