//! openBD metadata provider.
//!
//! openBD answers `200` with `[null]` for unknown ISBNs, so "not found" is
//! read from the body rather than the status.

use reqwest::StatusCode;
use serde_json::Value;
use serde_json_path::JsonPath;

use crate::error::LookupError;
use crate::lookup::{BookSummary, MetadataProvider};

pub const DEFAULT_HOST: &str = "https://api.openbd.jp";

const PROVIDER: &str = "openbd";
const TITLE_PATH: &str = "$.onix.DescriptiveDetail.TitleDetail.TitleElement.TitleText.content";
const COVER_PATH: &str = "$.summary.cover";

#[derive(Debug, Clone)]
pub struct OpenBdProvider {
    http: reqwest::Client,
    endpoint: String,
}

impl OpenBdProvider {
    pub fn new() -> Self {
        Self::with_host(DEFAULT_HOST)
    }

    pub fn with_host(host: &str) -> Self {
        Self::with_http_client(reqwest::Client::new(), host)
    }

    pub fn with_http_client(http: reqwest::Client, host: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/v1/get", host.trim_end_matches('/')),
        }
    }
}

impl Default for OpenBdProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataProvider for OpenBdProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn lookup_isbn(&self, isbn: &str) -> Result<BookSummary, LookupError> {
        let isbn = isbn.trim().replace('-', "");
        if isbn.is_empty() {
            return Err(LookupError::InvalidIsbn);
        }
        tracing::debug!(endpoint = %self.endpoint, %isbn, "looking up metadata");

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("isbn", isbn.as_str()), ("pretty", "")])
            .send()
            .await
            .map_err(|e| LookupError::Network(e.to_string()))?;
        if response.status() != StatusCode::OK {
            return Err(LookupError::Server {
                provider: PROVIDER.to_string(),
                status: response.status().as_u16(),
            });
        }
        let body = response.text().await.map_err(|e| LookupError::Network(e.to_string()))?;
        parse_openbd_response(&body).map_err(|message| LookupError::Malformed {
            provider: PROVIDER.to_string(),
            message,
        })
    }
}

fn parse_openbd_response(body: &str) -> Result<BookSummary, String> {
    let v: Value = serde_json::from_str(body).map_err(|e| e.to_string())?;
    let records = v.as_array().ok_or("expected a JSON array")?;
    let record = match records.first() {
        Some(r) if !r.is_null() => r,
        _ => return Ok(BookSummary::not_found()),
    };
    Ok(BookSummary {
        title: string_at(record, TITLE_PATH)?,
        cover_url: string_at(record, COVER_PATH)?,
        found: true,
    })
}

/// String at `path`, or empty when the path is absent or not a string.
fn string_at(record: &Value, path: &str) -> Result<String, String> {
    let path = JsonPath::parse(path).map_err(|e| e.to_string())?;
    Ok(path
        .query(record)
        .at_most_one()
        .ok()
        .flatten()
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string())
}
