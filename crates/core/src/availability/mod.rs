//! Real-time library availability via the Calil `check` API.
//!
//! The service answers asynchronously: the first reply usually says "still
//! searching" and hands out a session token, which the client re-polls with
//! until the search settles. [`AvailabilityClient::search`] drives that
//! exchange and flattens the nested per-ISBN/per-system reply into a list of
//! [`LibraryAvailability`] records.

mod poller;
pub mod wire;

use std::time::Duration;

use serde::Serialize;

use crate::error::SearchError;
use crate::municipality;

pub use poller::{AvailabilityClient, DEFAULT_HOST};

/// Interval the service asks clients to wait between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Upper bound on follow-up polls for one search.
pub const DEFAULT_MAX_ROUNDS: u32 = 30;

/// Parameters of one availability search. Never mutated by the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Calil application key.
    pub app_key: String,
    pub isbn: String,
    /// Calil `systemid`, see [`crate::municipality`].
    pub system_id: String,
    pub poll_interval: Duration,
    /// Maximum number of follow-up polls before giving up.
    pub max_rounds: u32,
}

impl SearchRequest {
    pub fn new(
        app_key: impl Into<String>,
        isbn: impl Into<String>,
        system_id: impl Into<String>,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            isbn: isbn.into(),
            system_id: system_id.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds;
        self
    }

    /// Check preconditions. Runs before any request is sent.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.app_key.trim().is_empty() {
            return Err(SearchError::Validation("app key is required".to_string()));
        }
        if self.isbn.trim().is_empty() {
            return Err(SearchError::Validation("ISBN is required".to_string()));
        }
        if self.system_id.is_empty() {
            return Err(SearchError::Validation("system id is required".to_string()));
        }
        if !municipality::is_known(&self.system_id) {
            return Err(SearchError::Validation(format!(
                "unknown system id: {}",
                self.system_id
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(SearchError::Validation(
                "poll interval must be positive".to_string(),
            ));
        }
        if self.max_rounds == 0 {
            return Err(SearchError::Validation(
                "max rounds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lending status of a book at one library facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BorrowingStatus {
    Lendable,
    InCollection,
    InLibraryOnly,
    OnLoan,
    Reserved,
    Preparing,
    Closed,
    NotHeld,
}

impl BorrowingStatus {
    pub const ALL: [BorrowingStatus; 8] = [
        BorrowingStatus::Lendable,
        BorrowingStatus::InCollection,
        BorrowingStatus::InLibraryOnly,
        BorrowingStatus::OnLoan,
        BorrowingStatus::Reserved,
        BorrowingStatus::Preparing,
        BorrowingStatus::Closed,
        BorrowingStatus::NotHeld,
    ];

    /// Decode the label the service uses on the wire.
    pub fn from_wire(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.wire_label() == label)
    }

    pub fn wire_label(&self) -> &'static str {
        match self {
            BorrowingStatus::Lendable => "貸出可",
            BorrowingStatus::InCollection => "蔵書あり",
            BorrowingStatus::InLibraryOnly => "館内のみ",
            BorrowingStatus::OnLoan => "貸出中",
            BorrowingStatus::Reserved => "予約中",
            BorrowingStatus::Preparing => "準備中",
            BorrowingStatus::Closed => "休館中",
            BorrowingStatus::NotHeld => "蔵書なし",
        }
    }
}

impl std::fmt::Display for BorrowingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_label())
    }
}

/// One library's holding, numbered in the order the service listed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryAvailability {
    /// 1-based position within this result only.
    pub id: u32,
    pub name: String,
    pub status: BorrowingStatus,
}

/// Flattened outcome of a finished search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedResult {
    /// Always 0 for a finished search.
    pub continuation: u8,
    pub library_stock: Vec<LibraryAvailability>,
    /// Reservation page of the library system; empty when none is offered.
    pub reserve_url: String,
}

impl NormalizedResult {
    pub fn is_held(&self) -> bool {
        !self.library_stock.is_empty()
    }
}

/// Classification of a search after a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    Initial,
    Polling,
    Success,
    NotFound,
    ServerError,
}

impl ServerState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ServerState::Success | ServerState::NotFound | ServerState::ServerError
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SearchRequest {
        SearchRequest::new("key", "9784877713379", "Tokyo_Setagaya")
    }

    #[test]
    fn defaults() {
        let r = request();
        assert_eq!(r.poll_interval, Duration::from_millis(2000));
        assert_eq!(r.max_rounds, DEFAULT_MAX_ROUNDS);
        assert!(r.validate().is_ok());
    }

    #[test]
    fn missing_fields_rejected() {
        for r in [
            SearchRequest { app_key: String::new(), ..request() },
            SearchRequest { isbn: "  ".to_string(), ..request() },
            SearchRequest { system_id: String::new(), ..request() },
            SearchRequest { system_id: "Nowhere_Town".to_string(), ..request() },
            request().with_poll_interval(Duration::ZERO),
            request().with_max_rounds(0),
        ] {
            assert!(matches!(r.validate(), Err(SearchError::Validation(_))), "{:?}", r);
        }
    }

    #[test]
    fn borrowing_status_wire_labels() {
        assert_eq!(BorrowingStatus::from_wire("貸出可"), Some(BorrowingStatus::Lendable));
        assert_eq!(BorrowingStatus::from_wire("貸出中"), Some(BorrowingStatus::OnLoan));
        assert_eq!(BorrowingStatus::from_wire("蔵書なし"), Some(BorrowingStatus::NotHeld));
        assert_eq!(BorrowingStatus::from_wire("lendable"), None);
        for s in BorrowingStatus::ALL {
            assert_eq!(BorrowingStatus::from_wire(s.wire_label()), Some(s));
        }
    }

    #[test]
    fn borrowing_status_serializes_snake_case() {
        let json = serde_json::to_string(&BorrowingStatus::InLibraryOnly).unwrap();
        assert_eq!(json, "\"in_library_only\"");
    }

    #[test]
    fn terminal_states() {
        assert!(!ServerState::Initial.is_terminal());
        assert!(!ServerState::Polling.is_terminal());
        assert!(ServerState::Success.is_terminal());
        assert!(ServerState::NotFound.is_terminal());
        assert!(ServerState::ServerError.is_terminal());
    }
}
