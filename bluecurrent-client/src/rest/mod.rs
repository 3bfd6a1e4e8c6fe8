//! REST channel for historical and report data
//!
//! Stateless request/response calls authenticated with the bearer token
//! obtained over the socket. Each endpoint wraps its payload in a documented
//! top-level key which is unwrapped here; non-2xx statuses surface as
//! [`ClientError::Http`].

pub mod pagination;

use futures_util::stream::Stream;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::ClientConfig;
use crate::dates::{self, COMPACT_DATETIME};
use crate::error::{ClientError, Result};

pub use pagination::{paginate, Page, PageIter, TransactionPage, FIRST_PAGE};

/// REST endpoint client
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    api_url: String,
    user_agent: String,
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent(),
        }
    }

    fn headers(&self, token: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Token {}", token))
                .map_err(|e| ClientError::InvalidHeader(e.to_string()))?,
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .map_err(|e| ClientError::InvalidHeader(e.to_string()))?,
        );
        Ok(headers)
    }

    async fn get(&self, token: &str, path: &str, query: &[(&str, &str)]) -> Result<Map<String, Value>> {
        let url = format!("{}/{}", self.api_url, path);
        debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .headers(self.headers(token)?)
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn post(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, String)],
        body: &Value,
    ) -> Result<Map<String, Value>> {
        let url = format!("{}/{}", self.api_url, path);
        debug!("POST {}", url);
        let response = self
            .http
            .post(&url)
            .headers(self.headers(token)?)
            .query(query)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Live status of a charge point
    pub async fn get_charge_point_status(&self, token: &str, evse_id: &str) -> Result<Value> {
        let body = self
            .get(token, "chargepointstatus", &[("evse_id", evse_id)])
            .await?;
        let status = unwrap_key(body, "chargepointstatus", "data")?;
        let formats = dates::formats(&[
            ("start_datetime", COMPACT_DATETIME),
            ("stop_datetime", COMPACT_DATETIME),
        ]);
        dates::parse_value(status, &formats)
    }

    pub async fn get_contracts(&self, token: &str) -> Result<Value> {
        let body = self.get(token, "getcontracts", &[]).await?;
        unwrap_key(body, "getcontracts", "contracts")
    }

    pub async fn get_grids(&self, token: &str) -> Result<Value> {
        let body = self.get(token, "getgrids", &[]).await?;
        unwrap_key(body, "getgrids", "grids")
    }

    /// One page of transactions, newest or oldest first; records are left as sent
    pub async fn get_transactions(
        &self,
        token: &str,
        evse_id: &str,
        newest_first: bool,
        page: u32,
    ) -> Result<TransactionPage> {
        let order = if newest_first { "DESC" } else { "ASC" };
        let query = [
            ("page", page.to_string()),
            ("sort_field_order", order.to_string()),
            ("sort_field", "stoppedtimestamp".to_string()),
        ];
        let body = json!({"chargepoints": [{"chargepoint_id": evse_id}]});

        let response = self.post(token, "gettransactions", &query, &body).await?;
        unwrap_typed(response, "gettransactions", "data")
    }

    /// All transactions of a charge point as one forward-only stream
    pub fn iterate_transactions<'a>(
        &'a self,
        token: &'a str,
        evse_id: &'a str,
        newest_first: bool,
    ) -> impl Stream<Item = Result<Value>> + 'a {
        paginate(move |page| self.get_transactions(token, evse_id, newest_first, page))
    }
}

fn unwrap_key(mut body: Map<String, Value>, endpoint: &str, key: &str) -> Result<Value> {
    body.remove(key).ok_or_else(|| ClientError::MissingField {
        kind: endpoint.to_string(),
        field: key.to_string(),
    })
}

fn unwrap_typed<T: DeserializeOwned>(body: Map<String, Value>, endpoint: &str, key: &str) -> Result<T> {
    Ok(serde_json::from_value(unwrap_key(body, endpoint, key)?)?)
}
