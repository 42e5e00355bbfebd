use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::EntityKind;
use crate::error::GraphError;
use crate::record::{FlatRecord, parse_record};

pub const DEFAULT_BASE_URL: &str = "https://rest.kegg.jp";

/// A call performs exactly one request and never retries.
pub trait KeggClient: Send + Sync {
    fn fetch(&self, kind: EntityKind, id: &str) -> Result<FlatRecord, GraphError>;
}

#[derive(Clone)]
pub struct KeggHttpClient {
    client: Client,
    base_url: String,
}

impl KeggHttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GraphError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kegg-graph/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GraphError::KeggHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| GraphError::KeggHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn entry_url(&self, kind: EntityKind, id: &str) -> String {
        format!("{}/get/{}:{}", self.base_url, kind.api_code(), id)
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, GraphError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .ok()
            .map(|body| body.trim().to_string())
            .filter(|body| !body.is_empty())
            .unwrap_or_else(|| "KEGG request failed".to_string());
        Err(GraphError::KeggStatus { status, message })
    }
}

impl KeggClient for KeggHttpClient {
    fn fetch(&self, kind: EntityKind, id: &str) -> Result<FlatRecord, GraphError> {
        let url = self.entry_url(kind, id);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| GraphError::KeggHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let body = response
            .text()
            .map_err(|err| GraphError::KeggHttp(err.to_string()))?;
        parse_body(id, &body)
    }
}

pub fn parse_body(id: &str, body: &str) -> Result<FlatRecord, GraphError> {
    let record = parse_record(body);
    if !record.has_fields() {
        return Err(GraphError::EmptyRecord { id: id.to_string() });
    }
    Ok(record)
}
