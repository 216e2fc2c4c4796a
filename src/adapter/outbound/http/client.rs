//! REST client for the comparison backend.
//!
//! One attempt per call: retries for reads belong to the query cache and
//! mutations are never retried. The bearer token is read from the auth
//! channel on every request, so sign-in and sign-out take effect without
//! rebuilding the client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, warn};
use url::Url;

use super::dto::{
    narrow_all, narrow_bars, CreatedDto, Envelope, MemberRequest, NameRequest, PriceBarDto,
    SetDetailDto, SetSummaryDto,
};
use crate::domain::{ComparisonSet, ComparisonSetSummary, Interval, PriceBar, SetId, StockCode};
use crate::error::{ConfigError, Error, Result};
use crate::infrastructure::config::api::ApiConfig;
use crate::port::ComparisonStore;

/// Longest error body echoed back in a rejection message.
const MAX_ERROR_BODY: usize = 512;

/// HTTP implementation of [`ComparisonStore`].
pub struct HttpComparisonStore {
    http: HttpClient,
    base_url: Url,
    token: watch::Receiver<Option<String>>,
}

impl HttpComparisonStore {
    /// Build a client from API settings and an auth token channel.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the base URL cannot be parsed or
    /// cannot carry path segments.
    pub fn from_config(config: &ApiConfig, token: watch::Receiver<Option<String>>) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue {
                field: "base_url",
                reason: format!("'{}' cannot be used as a base URL", config.base_url),
            }
            .into());
        }

        let http = HttpClient::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Failed to build HTTP client, using defaults");
                HttpClient::new()
            });

        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    /// Join percent-encoded path segments onto the base URL.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ConfigError::InvalidValue {
                field: "base_url",
                reason: "cannot append path segments".into(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.borrow().as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute(&self, request: RequestBuilder, resource: &str) -> Result<Response> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(Error::not_found(resource));
        }

        let mut message = response.text().await.unwrap_or_default();
        if message.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        debug!(status = status.as_u16(), resource, "Request rejected");
        Err(Error::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch_json<T>(&self, request: RequestBuilder, resource: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.execute(request, resource).await?;
        let bytes = response.bytes().await?;
        let envelope: Envelope<T> = serde_json::from_slice(&bytes)
            .map_err(|e| Error::InvalidPayload(format!("{resource}: {e}")))?;
        envelope.into_result()
    }

    async fn send_empty(&self, request: RequestBuilder, resource: &str) -> Result<()> {
        self.execute(request, resource).await.map(|_| ())
    }
}

#[async_trait]
impl ComparisonStore for HttpComparisonStore {
    async fn list_sets(&self) -> Result<Vec<ComparisonSetSummary>> {
        let url = self.url(&["comparisons"])?;
        let dtos: Vec<SetSummaryDto> = self
            .fetch_json(self.http.get(url), "comparison sets")
            .await?;
        narrow_all(dtos)
    }

    async fn get_set(&self, id: &SetId) -> Result<ComparisonSet> {
        let url = self.url(&["comparisons", id.as_str()])?;
        let resource = format!("comparison set {id}");
        let dto: SetDetailDto = self.fetch_json(self.http.get(url), &resource).await?;
        ComparisonSet::try_from(dto)
    }

    async fn create_set(&self, name: &str) -> Result<SetId> {
        let url = self.url(&["comparisons"])?;
        let created: CreatedDto = self
            .fetch_json(
                self.http.post(url).json(&NameRequest { name }),
                "comparison sets",
            )
            .await?;
        created.into_set_id()
    }

    async fn rename_set(&self, id: &SetId, name: &str) -> Result<()> {
        let url = self.url(&["comparisons", id.as_str()])?;
        self.send_empty(
            self.http.patch(url).json(&NameRequest { name }),
            &format!("comparison set {id}"),
        )
        .await
    }

    async fn add_member(&self, id: &SetId, stock_code: &StockCode) -> Result<()> {
        let url = self.url(&["comparisons", id.as_str(), "companies"])?;
        self.send_empty(
            self.http.post(url).json(&MemberRequest {
                stock_code: stock_code.as_str(),
            }),
            &format!("comparison set {id}"),
        )
        .await
    }

    async fn remove_member(&self, id: &SetId, stock_code: &StockCode) -> Result<()> {
        let url = self.url(&["comparisons", id.as_str(), "companies", stock_code.as_str()])?;
        self.send_empty(
            self.http.delete(url),
            &format!("{stock_code} in comparison set {id}"),
        )
        .await
    }

    async fn delete_set(&self, id: &SetId) -> Result<()> {
        let url = self.url(&["comparisons", id.as_str()])?;
        self.send_empty(self.http.delete(url), &format!("comparison set {id}"))
            .await
    }

    async fn get_price_history(
        &self,
        stock_code: &StockCode,
        interval: Interval,
    ) -> Result<Vec<PriceBar>> {
        let mut url = self.url(&["stocks", stock_code.as_str(), "prices"])?;
        url.query_pairs_mut()
            .append_pair("interval", interval.as_str());
        let dtos: Vec<PriceBarDto> = self
            .fetch_json(self.http.get(url), &format!("price history for {stock_code}"))
            .await?;
        narrow_bars(dtos)
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(base_url: &str) -> HttpComparisonStore {
        let config = ApiConfig {
            base_url: base_url.into(),
            ..ApiConfig::default()
        };
        let (_tx, rx) = watch::channel(None);
        HttpComparisonStore::from_config(&config, rx).unwrap()
    }

    #[test]
    fn joins_segments_onto_base_path() {
        let store = store("https://api.example.com/v1/");
        let url = store.url(&["comparisons", "7", "companies"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/comparisons/7/companies");
    }

    #[test]
    fn encodes_segments() {
        let store = store("https://api.example.com/v1");
        let url = store.url(&["comparisons", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/comparisons/a%20b%2Fc");
    }

    #[test]
    fn rejects_non_base_urls() {
        let config = ApiConfig {
            base_url: "mailto:ops@example.com".into(),
            ..ApiConfig::default()
        };
        let (_tx, rx) = watch::channel(None);
        assert!(matches!(
            HttpComparisonStore::from_config(&config, rx),
            Err(Error::Config(ConfigError::InvalidValue { field: "base_url", .. }))
        ));
    }

    #[tokio::test]
    async fn unreachable_backend_is_transient() {
        let store = store("http://127.0.0.1:9/api");
        let err = store.list_sets().await.unwrap_err();
        assert!(err.is_transient(), "expected transient error, got {err}");
    }
}
