//! Wire format of the Calil `check` API and its decoding.
//!
//! Replies are JSONP: `callback({...});`. The JSON carries a `continue` flag,
//! an optional `session` token and a `books` mapping of
//! ISBN -> systemid -> `{status, reserveurl, libkey}`.

use std::collections::HashMap;
use std::fmt;

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;

use crate::availability::{BorrowingStatus, LibraryAvailability, NormalizedResult, ServerState};
use crate::error::SearchError;

const JSONP_PREFIX: &str = "callback(";
const JSONP_SUFFIX: &str = ");";

/// Search status the service reports per ISBN and library system.
/// A missing `status` reads as `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SearchStatus {
    #[serde(rename = "OK")]
    Ok,
    Cache,
    Running,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawServerResponse {
    #[serde(rename = "continue")]
    pub continuation: i64,
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub books: HashMap<String, HashMap<String, RawSystemEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSystemEntry {
    #[serde(default)]
    pub status: SearchStatus,
    #[serde(default)]
    pub reserveurl: Option<String>,
    /// Library name -> wire borrowing label, in document order.
    #[serde(default, deserialize_with = "ordered_entries")]
    pub libkey: Vec<(String, String)>,
}

impl RawServerResponse {
    /// Non-empty session token carried by this reply, if any.
    pub fn session_token(&self) -> Option<&str> {
        self.session.as_deref().filter(|s| !s.is_empty())
    }

    pub fn entry(&self, isbn: &str, system_id: &str) -> Option<&RawSystemEntry> {
        self.books.get(isbn).and_then(|systems| systems.get(system_id))
    }
}

/// Outcome of one round, borrowing the entry it was decided on.
#[derive(Debug, Clone, Copy)]
pub enum Classification<'a> {
    Polling,
    Success(&'a RawSystemEntry),
    NotFound(&'a RawSystemEntry),
    ServerError(&'a RawSystemEntry),
}

impl Classification<'_> {
    pub fn state(&self) -> ServerState {
        match self {
            Classification::Polling => ServerState::Polling,
            Classification::Success(_) => ServerState::Success,
            Classification::NotFound(_) => ServerState::NotFound,
            Classification::ServerError(_) => ServerState::ServerError,
        }
    }
}

/// Strip the JSONP envelope and return the JSON text inside it.
pub fn strip_jsonp(body: &str) -> Result<&str, SearchError> {
    body.trim()
        .strip_prefix(JSONP_PREFIX)
        .and_then(|rest| rest.strip_suffix(JSONP_SUFFIX))
        .ok_or_else(|| SearchError::Protocol("response is not a callback(...); envelope".to_string()))
}

/// Decode a raw response body.
pub fn decode(body: &str) -> Result<RawServerResponse, SearchError> {
    let json = strip_jsonp(body)?;
    serde_json::from_str(json).map_err(|e| SearchError::Protocol(e.to_string()))
}

/// Decide what a round means for the search keyed by `isbn` and `system_id`.
///
/// While the service is still running the entry is not inspected, so replies
/// that omit it are accepted. A finished reply must contain it.
pub fn classify<'a>(
    raw: &'a RawServerResponse,
    isbn: &str,
    system_id: &str,
) -> Result<Classification<'a>, SearchError> {
    match raw.continuation {
        1 => Ok(Classification::Polling),
        0 => {
            let entry = raw.entry(isbn, system_id).ok_or_else(|| {
                SearchError::Protocol(format!("no entry for ISBN {} in {}", isbn, system_id))
            })?;
            Ok(match entry.status {
                SearchStatus::Ok | SearchStatus::Cache if entry.libkey.is_empty() => {
                    Classification::NotFound(entry)
                }
                SearchStatus::Ok | SearchStatus::Cache => Classification::Success(entry),
                _ => Classification::ServerError(entry),
            })
        }
        other => Err(SearchError::Protocol(format!("unexpected continue flag: {}", other))),
    }
}

/// Flatten a finished entry into numbered library records.
pub fn normalize(entry: &RawSystemEntry) -> Result<NormalizedResult, SearchError> {
    let library_stock = entry
        .libkey
        .iter()
        .zip(1u32..)
        .map(|((name, label), id)| {
            let status = BorrowingStatus::from_wire(label).ok_or_else(|| {
                SearchError::Protocol(format!("unknown borrowing status '{}' for {}", label, name))
            })?;
            Ok(LibraryAvailability { id, name: name.clone(), status })
        })
        .collect::<Result<Vec<_>, SearchError>>()?;
    Ok(NormalizedResult {
        continuation: 0,
        library_stock,
        reserve_url: entry.reserveurl.clone().unwrap_or_default(),
    })
}

/// Deserialize a JSON object into its entries, keeping document order.
/// A repeated name keeps its first position and takes the last label.
/// `null` and `[]` both mean "no entries".
fn ordered_entries<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of library name to borrowing status")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, status)) = map.next_entry::<String, String>()? {
                match entries.iter_mut().find(|(seen, _)| *seen == name) {
                    Some(existing) => existing.1 = status,
                    None => entries.push((name, status)),
                }
            }
            Ok(entries)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            if seq.next_element::<de::IgnoredAny>()?.is_some() {
                return Err(de::Error::invalid_type(de::Unexpected::Seq, &self));
            }
            Ok(Vec::new())
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(EntriesVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const ISBN: &str = "9784877713379";
    const SYSTEM: &str = "Tokyo_Setagaya";

    fn finished(status: &str, libkey: &str) -> String {
        format!(
            r#"callback({{"session":"s1","continue":0,"books":{{"{}":{{"{}":{{"status":"{}","reserveurl":"https://example.jp/reserve","libkey":{}}}}}}}}});"#,
            ISBN, SYSTEM, status, libkey
        )
    }

    #[test]
    fn strip_jsonp_extracts_payload() {
        assert_eq!(strip_jsonp("callback({\"a\":1});").unwrap(), "{\"a\":1}");
        assert_eq!(strip_jsonp("  callback({});\n").unwrap(), "{}");
    }

    #[test]
    fn strip_jsonp_rejects_other_bodies() {
        for body in ["{\"continue\":0}", "callback({})", "cb({});", "", "<html></html>"] {
            assert!(matches!(strip_jsonp(body), Err(SearchError::Protocol(_))), "{}", body);
        }
    }

    #[test]
    fn decode_rejects_bad_json() {
        assert!(matches!(decode("callback({not json});"), Err(SearchError::Protocol(_))));
        assert!(matches!(decode("callback({\"books\":{}});"), Err(SearchError::Protocol(_))));
    }

    #[test]
    fn decode_polling_reply_without_books() {
        let raw = decode(r#"callback({"session":"abc123","continue":1});"#).unwrap();
        assert_eq!(raw.session_token(), Some("abc123"));
        assert!(matches!(classify(&raw, ISBN, SYSTEM).unwrap(), Classification::Polling));
    }

    #[test]
    fn empty_session_is_ignored() {
        let raw = decode(r#"callback({"session":"","continue":1,"books":{}});"#).unwrap();
        assert_eq!(raw.session_token(), None);
    }

    #[test]
    fn classify_success_keeps_document_order() {
        let raw = decode(&finished("Cache", r#"{"Zeta":"貸出可","Alpha":"貸出中","Mid":"館内のみ"}"#)).unwrap();
        let class = classify(&raw, ISBN, SYSTEM).unwrap();
        assert_eq!(class.state(), ServerState::Success);
        let Classification::Success(entry) = class else { panic!("expected success") };
        let result = normalize(entry).unwrap();
        let names: Vec<&str> = result.library_stock.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
        assert_eq!(result.library_stock[2].id, 3);
        assert_eq!(result.library_stock[2].status, BorrowingStatus::InLibraryOnly);
        assert_eq!(result.reserve_url, "https://example.jp/reserve");
        assert_eq!(result.continuation, 0);
    }

    #[test]
    fn classify_empty_libkey_is_not_found() {
        for libkey in ["{}", "null", "[]"] {
            let raw = decode(&finished("OK", libkey)).unwrap();
            assert_eq!(classify(&raw, ISBN, SYSTEM).unwrap().state(), ServerState::NotFound, "{}", libkey);
        }
    }

    #[test]
    fn classify_absent_libkey_is_not_found() {
        let body = format!(
            r#"callback({{"continue":0,"books":{{"{}":{{"{}":{{"status":"OK","reserveurl":"u"}}}}}}}});"#,
            ISBN, SYSTEM
        );
        let raw = decode(&body).unwrap();
        let class = classify(&raw, ISBN, SYSTEM).unwrap();
        assert_eq!(class.state(), ServerState::NotFound);
        let Classification::NotFound(entry) = class else { panic!("expected not found") };
        let result = normalize(entry).unwrap();
        assert!(result.library_stock.is_empty());
        assert_eq!(result.reserve_url, "u");
    }

    #[test]
    fn duplicate_library_keeps_first_position_and_last_status() {
        let raw = decode(&finished("OK", r#"{"A":"貸出可","B":"貸出中","A":"蔵書なし"}"#)).unwrap();
        let Classification::Success(entry) = classify(&raw, ISBN, SYSTEM).unwrap() else {
            panic!("expected success")
        };
        let result = normalize(entry).unwrap();
        assert_eq!(
            result.library_stock,
            vec![
                LibraryAvailability { id: 1, name: "A".to_string(), status: BorrowingStatus::NotHeld },
                LibraryAvailability { id: 2, name: "B".to_string(), status: BorrowingStatus::OnLoan },
            ]
        );
    }

    #[test]
    fn continuing_reply_with_partial_entry_is_polling() {
        let body = format!(r#"callback({{"session":"x","continue":1,"books":{{"{}":{{"{}":{{}}}}}}}});"#, ISBN, SYSTEM);
        let raw = decode(&body).unwrap();
        assert_eq!(raw.session_token(), Some("x"));
        assert!(matches!(classify(&raw, ISBN, SYSTEM).unwrap(), Classification::Polling));
    }

    #[test]
    fn finished_reply_without_status_is_server_error() {
        let body = format!(
            r#"callback({{"continue":0,"books":{{"{}":{{"{}":{{"libkey":{{"A":"貸出可"}}}}}}}}}});"#,
            ISBN, SYSTEM
        );
        let raw = decode(&body).unwrap();
        assert_eq!(classify(&raw, ISBN, SYSTEM).unwrap().state(), ServerState::ServerError);
    }

    #[test]
    fn classify_running_or_error_when_finished_is_server_error() {
        for status in ["Running", "Error", "Whatever"] {
            let raw = decode(&finished(status, r#"{"A":"貸出可"}"#)).unwrap();
            assert_eq!(classify(&raw, ISBN, SYSTEM).unwrap().state(), ServerState::ServerError, "{}", status);
        }
    }

    #[test]
    fn classify_missing_keys_is_protocol_error() {
        let raw = decode(&finished("OK", r#"{"A":"貸出可"}"#)).unwrap();
        assert!(matches!(classify(&raw, "4334926940", SYSTEM), Err(SearchError::Protocol(_))));
        assert!(matches!(classify(&raw, ISBN, "Tokyo_Chuo"), Err(SearchError::Protocol(_))));
    }

    #[test]
    fn classify_rejects_unexpected_continue_flag() {
        let raw = decode(r#"callback({"continue":2});"#).unwrap();
        assert!(matches!(classify(&raw, ISBN, SYSTEM), Err(SearchError::Protocol(_))));
    }

    #[test]
    fn normalize_rejects_unknown_borrowing_status() {
        let raw = decode(&finished("OK", r#"{"A":"lost"}"#)).unwrap();
        let Classification::Success(entry) = classify(&raw, ISBN, SYSTEM).unwrap() else {
            panic!("expected success")
        };
        assert!(matches!(normalize(entry), Err(SearchError::Protocol(_))));
    }

    proptest! {
        #[test]
        fn normalize_numbers_libraries_in_order(
            picks in proptest::collection::vec((0usize..8, "[A-Za-z]{1,12}"), 1..20)
        ) {
            let libkey: Vec<(String, String)> = picks
                .iter()
                .enumerate()
                .map(|(i, (s, name))| (format!("{}-{}", i, name), BorrowingStatus::ALL[*s].wire_label().to_string()))
                .collect();
            let entry = RawSystemEntry { status: SearchStatus::Ok, reserveurl: None, libkey: libkey.clone() };
            let result = normalize(&entry).unwrap();
            prop_assert_eq!(result.library_stock.len(), libkey.len());
            for (i, (lib, (name, label))) in result.library_stock.iter().zip(&libkey).enumerate() {
                prop_assert_eq!(lib.id as usize, i + 1);
                prop_assert_eq!(&lib.name, name);
                prop_assert_eq!(lib.status.wire_label(), label.as_str());
            }
            prop_assert_eq!(result.reserve_url, "");
        }
    }
}
