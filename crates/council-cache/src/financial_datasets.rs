use std::time::Duration;

use async_trait::async_trait;
use council_models::config::DataConfig;
use council_models::{CompanyNews, FinancialMetrics, InsiderTrade, LineItem, Price};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{DataProvider, DateRange, ProviderError};

const PROVIDER_NAME: &str = "financialdatasets.ai";
const API_KEY_HEADER: &str = "X-API-KEY";
const DEFAULT_PERIOD: &str = "ttm";

#[derive(Deserialize)]
struct PriceResponse {
    prices: Vec<Price>,
}

#[derive(Deserialize)]
struct FinancialMetricsResponse {
    financial_metrics: Vec<FinancialMetrics>,
}

#[derive(Deserialize)]
struct LineItemResponse {
    search_results: Vec<LineItem>,
}

#[derive(Deserialize)]
struct InsiderTradeResponse {
    insider_trades: Vec<InsiderTrade>,
}

#[derive(Deserialize)]
struct CompanyNewsResponse {
    news: Vec<CompanyNews>,
}

/// HTTP client for the financialdatasets.ai REST API.
///
/// Requests go out without an API key header when no key is configured; the
/// API then serves its free tickers only.
pub struct FinancialDatasetsClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl FinancialDatasetsClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Build a client from configuration, reading the key from the configured
    /// environment variable.
    pub fn from_config(config: &DataConfig) -> Result<Self, ProviderError> {
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            warn!(env = %config.api_key_env, "No API key set, requests are unauthenticated");
        }
        Self::new(
            config.base_url.clone(),
            api_key,
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        ticker: &str,
    ) -> Result<T, ProviderError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if let Some(err) = classify_status(status, ticker) {
            let body = response.text().await.unwrap_or_default();
            debug!(ticker, %status, body = %body, "Provider request failed");
            return Err(err);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Decode(format!("{ticker}: {e}")))
    }
}

/// Map a non-success HTTP status to a provider error. `None` means success.
pub fn classify_status(status: StatusCode, ticker: &str) -> Option<ProviderError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited {
            provider: PROVIDER_NAME.to_string(),
        },
        StatusCode::NOT_FOUND => ProviderError::NotFound {
            ticker: ticker.to_string(),
        },
        other => ProviderError::Http(format!("{PROVIDER_NAME} returned {other} for {ticker}")),
    })
}

fn date_param(date: chrono::NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[async_trait]
impl DataProvider for FinancialDatasetsClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn fetch_prices(&self, ticker: &str, range: DateRange) -> Result<Vec<Price>, ProviderError> {
        let mut query = vec![
            ("ticker", ticker.to_string()),
            ("interval", "day".to_string()),
            ("interval_multiplier", "1".to_string()),
            ("end_date", date_param(range.end)),
        ];
        if let Some(start) = range.start {
            query.push(("start_date", date_param(start)));
        }
        let request = self.client.get(self.endpoint("/prices/")).query(&query);
        let response: PriceResponse = self.send(request, ticker).await?;
        Ok(response.prices)
    }

    async fn fetch_financial_metrics(
        &self,
        ticker: &str,
        range: DateRange,
        limit: u32,
    ) -> Result<Vec<FinancialMetrics>, ProviderError> {
        let query = [
            ("ticker", ticker.to_string()),
            ("report_period_lte", date_param(range.end)),
            ("limit", limit.to_string()),
            ("period", DEFAULT_PERIOD.to_string()),
        ];
        let request = self
            .client
            .get(self.endpoint("/financial-metrics/"))
            .query(&query);
        let response: FinancialMetricsResponse = self.send(request, ticker).await?;
        Ok(response.financial_metrics)
    }

    async fn fetch_line_items(
        &self,
        ticker: &str,
        line_items: &[String],
        range: DateRange,
        limit: u32,
    ) -> Result<Vec<LineItem>, ProviderError> {
        let body = serde_json::json!({
            "tickers": [ticker],
            "line_items": line_items,
            "end_date": date_param(range.end),
            "period": DEFAULT_PERIOD,
            "limit": limit,
        });
        let request = self
            .client
            .post(self.endpoint("/financials/search/line-items"))
            .json(&body);
        let response: LineItemResponse = self.send(request, ticker).await?;
        Ok(response.search_results)
    }

    async fn fetch_insider_trades(
        &self,
        ticker: &str,
        range: DateRange,
        limit: u32,
    ) -> Result<Vec<InsiderTrade>, ProviderError> {
        let mut query = vec![
            ("ticker", ticker.to_string()),
            ("filing_date_lte", date_param(range.end)),
            ("limit", limit.to_string()),
        ];
        if let Some(start) = range.start {
            query.push(("filing_date_gte", date_param(start)));
        }
        let request = self.client.get(self.endpoint("/insider-trades/")).query(&query);
        let response: InsiderTradeResponse = self.send(request, ticker).await?;
        Ok(response.insider_trades)
    }

    async fn fetch_company_news(
        &self,
        ticker: &str,
        range: DateRange,
        limit: u32,
    ) -> Result<Vec<CompanyNews>, ProviderError> {
        let mut query = vec![
            ("ticker", ticker.to_string()),
            ("end_date", date_param(range.end)),
            ("limit", limit.to_string()),
        ];
        if let Some(start) = range.start {
            query.push(("start_date", date_param(start)));
        }
        let request = self.client.get(self.endpoint("/news/")).query(&query);
        let response: CompanyNewsResponse = self.send(request, ticker).await?;
        Ok(response.news)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_key: Option<&str>) -> FinancialDatasetsClient {
        FinancialDatasetsClient::new(
            "https://api.example.test/",
            api_key.map(String::from),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client = client(None);
        assert_eq!(
            client.endpoint("/prices/"),
            "https://api.example.test/prices/"
        );
        assert_eq!(
            client.endpoint("financials/search/line-items"),
            "https://api.example.test/financials/search/line-items"
        );
    }

    #[test]
    fn api_key_header_only_when_configured() {
        let with_key = client(Some("abc"));
        let request = with_key
            .authorize(with_key.client.get(with_key.endpoint("/prices/")))
            .build()
            .unwrap();
        assert_eq!(request.headers().get(API_KEY_HEADER).unwrap(), "abc");

        let without_key = client(None);
        let request = without_key
            .authorize(without_key.client.get(without_key.endpoint("/prices/")))
            .build()
            .unwrap();
        assert!(request.headers().get(API_KEY_HEADER).is_none());
    }

    #[test]
    fn blank_api_key_is_ignored() {
        assert!(!client(Some("  ")).has_api_key());
        assert!(client(Some("k")).has_api_key());
    }

    #[test]
    fn success_is_not_an_error() {
        assert!(classify_status(StatusCode::OK, "AAPL").is_none());
    }

    #[test]
    fn rate_limit_status() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "AAPL"),
            Some(ProviderError::RateLimited { .. })
        ));
    }

    #[test]
    fn not_found_status() {
        match classify_status(StatusCode::NOT_FOUND, "ZZZZ") {
            Some(ProviderError::NotFound { ticker }) => assert_eq!(ticker, "ZZZZ"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn server_error_is_http() {
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "AAPL"),
            Some(ProviderError::Http(_))
        ));
    }

    #[test]
    fn price_envelope_decodes() {
        let json = r#"{
            "ticker": "AAPL",
            "prices": [
                {"open": "184.22", "close": "185.64", "high": "186.95", "low": "183.89",
                 "volume": 82488700, "time": "2024-01-02T05:00:00Z"}
            ]
        }"#;
        let response: PriceResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.prices.len(), 1);
        assert_eq!(response.prices[0].volume, 82488700);
    }

    #[test]
    fn line_item_envelope_keeps_requested_values() {
        let json = r#"{
            "search_results": [
                {"ticker": "AAPL", "report_period": "2023-09-30", "period": "ttm",
                 "currency": "USD", "revenue": 383285000000, "net_income": 96995000000}
            ]
        }"#;
        let response: LineItemResponse = serde_json::from_str(json).unwrap();
        let item = &response.search_results[0];
        assert_eq!(item.report_period, "2023-09-30");
        assert!(item.values.contains_key("revenue"));
        assert!(item.values.contains_key("net_income"));
    }

    #[tokio::test]
    #[ignore]
    async fn live_prices_for_free_ticker() {
        let client = FinancialDatasetsClient::from_config(&DataConfig::default()).unwrap();
        let end = chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let prices = client
            .fetch_prices("AAPL", DateRange::new(start, end))
            .await
            .unwrap();
        assert!(!prices.is_empty());
    }
}
