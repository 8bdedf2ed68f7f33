use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use council_cache::{CachedFetcher, DateRange, ProviderError};
use council_models::config::AppConfig;
use council_models::{AnalystSignal, Decision, Portfolio};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::aggregator::aggregate;
use crate::analyst::{AnalysisRequest, AnalystAgent};
use crate::error::AgentError;
use crate::progress::AgentProgress;
use crate::risk::RiskModel;

/// Knobs for one orchestrated run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub analyst_timeout: Duration,
    pub period_limit: u32,
    pub news_limit: u32,
    pub insider_trade_limit: u32,
    pub line_items: Vec<String>,
}

impl RunSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            analyst_timeout: Duration::from_secs(config.agents.analyst_timeout_seconds),
            period_limit: config.data.period_limit,
            news_limit: config.data.news_limit,
            insider_trade_limit: config.data.insider_trade_limit,
            line_items: config.data.line_items.clone(),
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRequest {
    pub tickers: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub portfolio: Portfolio,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunOutput {
    pub run_id: Uuid,
    /// One decision per requested ticker.
    pub decisions: BTreeMap<String, Decision>,
    /// Raw analyst output, agent id -> ticker -> signal.
    pub analyst_signals: BTreeMap<String, BTreeMap<String, AnalystSignal>>,
}

type TickerInputs = Vec<(String, Result<Arc<AnalysisRequest>, String>)>;

/// Runs the analyst panel over a set of tickers and aggregates the result.
///
/// The orchestrator never resets the data cache; callers do that at run
/// boundaries.
pub struct Orchestrator {
    analysts: Vec<Arc<dyn AnalystAgent>>,
    fetcher: Arc<CachedFetcher>,
    risk: Arc<dyn RiskModel>,
    progress: Arc<AgentProgress>,
    settings: RunSettings,
}

impl Orchestrator {
    pub fn new(
        analysts: Vec<Arc<dyn AnalystAgent>>,
        fetcher: Arc<CachedFetcher>,
        risk: Arc<dyn RiskModel>,
        settings: RunSettings,
    ) -> Self {
        Self {
            analysts,
            fetcher,
            risk,
            progress: Arc::new(AgentProgress::new()),
            settings,
        }
    }

    pub fn fetcher(&self) -> &Arc<CachedFetcher> {
        &self.fetcher
    }

    pub fn progress(&self) -> &Arc<AgentProgress> {
        &self.progress
    }

    pub fn analyst_ids(&self) -> Vec<&str> {
        self.analysts.iter().map(|a| a.id()).collect()
    }

    pub async fn run(&self, request: &RunRequest) -> Result<RunOutput, AgentError> {
        request.portfolio.validate()?;
        let run_id = Uuid::new_v4();
        let start = Instant::now();
        let tickers = dedupe(&request.tickers);
        info!(
            %run_id,
            tickers = ?tickers,
            analysts = self.analysts.len(),
            start_date = %request.start_date,
            end_date = %request.end_date,
            "Starting run"
        );
        self.progress.start();

        // 1. Fetch each ticker's data through the cache
        let inputs = self
            .gather_inputs(&tickers, request.start_date, request.end_date)
            .await;

        // 2. Fan out to analysts
        let signals = self.collect_signals(&inputs).await;

        // 3. Size and aggregate per ticker
        let latest_prices: BTreeMap<String, Decimal> = inputs
            .iter()
            .filter_map(|(ticker, input)| {
                let close = input.as_ref().ok()?.latest_close()?;
                Some((ticker.clone(), close))
            })
            .collect();

        let mut decisions = BTreeMap::new();
        for (ticker, input) in &inputs {
            let decision = match input {
                Ok(_) => {
                    let ticker_signals = signals.get(ticker).map(Vec::as_slice).unwrap_or(&[]);
                    let limits = self.risk.limits(ticker, &request.portfolio, &latest_prices);
                    aggregate(ticker, ticker_signals, &request.portfolio, &limits)
                }
                Err(cause) => Decision::hold(ticker.clone(), format!("Data unavailable for {ticker}: {cause}")),
            };
            info!(
                ticker = %ticker,
                action = %decision.action,
                quantity = decision.quantity,
                confidence = %decision.confidence,
                "Decision"
            );
            decisions.insert(ticker.clone(), decision);
        }

        let mut analyst_signals: BTreeMap<String, BTreeMap<String, AnalystSignal>> = BTreeMap::new();
        for (ticker, ticker_signals) in signals {
            for signal in ticker_signals {
                analyst_signals
                    .entry(signal.agent_id.clone())
                    .or_default()
                    .insert(ticker.clone(), signal);
            }
        }

        self.progress.stop();
        info!(%run_id, elapsed_ms = start.elapsed().as_millis(), "Run complete");

        Ok(RunOutput {
            run_id,
            decisions,
            analyst_signals,
        })
    }

    async fn gather_inputs(&self, tickers: &[String], start: NaiveDate, end: NaiveDate) -> TickerInputs {
        let mut handles = Vec::new();
        for ticker in tickers {
            let fetcher = Arc::clone(&self.fetcher);
            let settings = self.settings.clone();
            let progress = Arc::clone(&self.progress);
            let owned = ticker.clone();
            handles.push((
                ticker.clone(),
                tokio::spawn(async move {
                    progress.update_status("data_fetch", Some(&owned), "Fetching data");
                    fetch_inputs(&fetcher, &owned, start, end, &settings).await
                }),
            ));
        }

        let mut inputs = Vec::with_capacity(handles.len());
        for (ticker, handle) in handles {
            let input = match handle.await {
                Ok(Ok(request)) => Ok(Arc::new(request)),
                Ok(Err(e)) => {
                    warn!(ticker = %ticker, error = %e, "Data fetch failed");
                    Err(e.to_string())
                }
                Err(e) => {
                    error!(ticker = %ticker, error = %e, "Data fetch task panicked");
                    Err(format!("fetch task failed: {e}"))
                }
            };
            inputs.push((ticker, input));
        }
        inputs
    }

    async fn collect_signals(&self, inputs: &TickerInputs) -> BTreeMap<String, Vec<AnalystSignal>> {
        let mut handles = Vec::new();
        for (_, input) in inputs {
            let Ok(request) = input else { continue };
            for analyst in &self.analysts {
                let analyst = Arc::clone(analyst);
                let request = Arc::clone(request);
                let progress = Arc::clone(&self.progress);
                let timeout = self.settings.analyst_timeout;

                handles.push(tokio::spawn(async move {
                    progress.update_status(analyst.id(), Some(&request.ticker), "Analyzing");
                    let agent_start = Instant::now();
                    let result = tokio::time::timeout(timeout, analyst.analyze(&request))
                        .await
                        .unwrap_or(Err(AgentError::Timeout(timeout.as_secs())));
                    let status = if result.is_ok() { "Done" } else { "Failed" };
                    progress.update_status(analyst.id(), Some(&request.ticker), status);
                    (
                        analyst.id().to_string(),
                        request.ticker.clone(),
                        result,
                        agent_start.elapsed(),
                    )
                }));
            }
        }

        // Graceful degradation: a failed analyst contributes no signal
        let mut signals: BTreeMap<String, Vec<AnalystSignal>> = BTreeMap::new();
        for handle in handles {
            match handle.await {
                Ok((agent, ticker, Ok(signal), elapsed)) => {
                    info!(
                        agent = %agent,
                        ticker = %ticker,
                        signal = signal.direction.as_deref().unwrap_or("-"),
                        confidence = %signal.confidence,
                        elapsed_ms = elapsed.as_millis(),
                        "Analyst succeeded"
                    );
                    signals.entry(ticker).or_default().push(signal);
                }
                Ok((agent, ticker, Err(e), elapsed)) => {
                    warn!(agent = %agent, ticker = %ticker, error = %e, elapsed_ms = elapsed.as_millis(), "Analyst failed");
                }
                Err(e) => {
                    error!(error = %e, "Analyst task panicked");
                }
            }
        }
        signals
    }
}

async fn fetch_inputs(
    fetcher: &CachedFetcher,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
    settings: &RunSettings,
) -> Result<AnalysisRequest, ProviderError> {
    let range = DateRange::new(start, end);
    let mut request = AnalysisRequest::new(ticker, start, end);
    request.prices = fetcher.prices(ticker, range).await?;
    request.financial_metrics = fetcher
        .financial_metrics(ticker, end, settings.period_limit)
        .await?;
    request.line_items = fetcher
        .line_items(ticker, &settings.line_items, end, settings.period_limit)
        .await?;
    request.insider_trades = fetcher
        .insider_trades(ticker, range, settings.insider_trade_limit)
        .await?;
    request.company_news = fetcher
        .company_news(ticker, range, settings.news_limit)
        .await?;
    Ok(request)
}

/// Trimmed, upper-cased tickers in first-seen order without repeats.
fn dedupe(tickers: &[String]) -> Vec<String> {
    let mut seen = Vec::with_capacity(tickers.len());
    for ticker in tickers {
        let ticker = ticker.trim().to_uppercase();
        if !ticker.is_empty() && !seen.contains(&ticker) {
            seen.push(ticker);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::FixedFractionRisk;
    use crate::test_support::StaticAnalyst;
    use council_cache::test_support::{price, StubProvider};
    use council_cache::DataCache;
    use council_models::{Action, Direction};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn request(tickers: &[&str]) -> RunRequest {
        RunRequest {
            tickers: tickers.iter().map(|t| t.to_string()).collect(),
            start_date: date(2024, 1, 1),
            end_date: date(2024, 1, 31),
            portfolio: Portfolio::new(dec!(100_000), dec!(0.5)).unwrap(),
        }
    }

    fn orchestrator(provider: StubProvider, analysts: Vec<Arc<dyn AnalystAgent>>) -> Orchestrator {
        let fetcher = Arc::new(CachedFetcher::new(
            Arc::new(DataCache::new(Some(100), None)),
            Arc::new(provider),
        ));
        let settings = RunSettings {
            analyst_timeout: Duration::from_millis(200),
            ..RunSettings::default()
        };
        Orchestrator::new(analysts, fetcher, Arc::new(FixedFractionRisk::default()), settings)
    }

    #[tokio::test]
    async fn bullish_panel_buys() {
        let orch = orchestrator(
            StubProvider::with_prices("AAPL", &[("2024-01-02", dec!(185)), ("2024-01-31", dec!(200))]),
            vec![
                Arc::new(StaticAnalyst::new("ben_graham", Direction::Bullish, dec!(80))),
                Arc::new(StaticAnalyst::new("cathie_wood", Direction::Bullish, dec!(20))),
                Arc::new(StaticAnalyst::new("phil_fisher", Direction::Bearish, dec!(10))),
            ],
        );

        let output = orch.run(&request(&["AAPL"])).await.unwrap();
        let decision = &output.decisions["AAPL"];
        assert_eq!(decision.action, Action::Buy);
        assert_eq!(decision.confidence, dec!(90.9));
        // 20% of 100_000 at the latest close of 200
        assert_eq!(decision.quantity, 100);
        assert_eq!(output.analyst_signals.len(), 3);
        assert!(output.analyst_signals["ben_graham"].contains_key("AAPL"));
    }

    #[tokio::test]
    async fn sizing_uses_newest_bar_when_cache_is_out_of_order() {
        let orch = orchestrator(
            StubProvider::new(),
            vec![Arc::new(StaticAnalyst::new("ben_graham", Direction::Bullish, dec!(80)))],
        );
        let cache = orch.fetcher().cache();
        cache.set_prices("AAPL", &[price("2024-01-31", dec!(200))]).await.unwrap();
        cache.set_prices("AAPL", &[price("2024-01-02", dec!(100))]).await.unwrap();

        let output = orch.run(&request(&["AAPL"])).await.unwrap();
        // 20_000 at 200, not at the older close of 100
        assert_eq!(output.decisions["AAPL"].quantity, 100);
    }

    #[tokio::test]
    async fn failed_fetch_holds_without_blocking_others() {
        let provider = StubProvider::with_prices("AAPL", &[("2024-01-31", dec!(200))]).failing_for("MSFT");
        let orch = orchestrator(
            provider,
            vec![Arc::new(StaticAnalyst::new("ben_graham", Direction::Bullish, dec!(80)))],
        );

        let output = orch.run(&request(&["AAPL", "MSFT"])).await.unwrap();
        assert_eq!(output.decisions["AAPL"].action, Action::Buy);

        let msft = &output.decisions["MSFT"];
        assert_eq!(msft.action, Action::Hold);
        assert_eq!(msft.confidence, Decimal::ZERO);
        assert!(msft.reasoning.contains("Data unavailable for MSFT"));
    }

    #[tokio::test]
    async fn failing_and_slow_analysts_are_skipped() {
        let orch = orchestrator(
            StubProvider::with_prices("AAPL", &[("2024-01-31", dec!(200))]),
            vec![
                Arc::new(StaticAnalyst::new("ben_graham", Direction::Bearish, dec!(60))),
                Arc::new(StaticAnalyst::failing("cathie_wood")),
                Arc::new(
                    StaticAnalyst::new("phil_fisher", Direction::Bullish, dec!(100))
                        .with_delay(Duration::from_secs(5)),
                ),
            ],
        );

        let output = orch.run(&request(&["AAPL"])).await.unwrap();
        let decision = &output.decisions["AAPL"];
        assert_eq!(decision.action, Action::Short);
        assert_eq!(decision.confidence, dec!(100));
        assert_eq!(output.analyst_signals.len(), 1);

        let status = orch.progress().status("cathie_wood").unwrap();
        assert_eq!(status.status, "Failed");
    }

    #[tokio::test]
    async fn no_analysts_holds_every_ticker() {
        let orch = orchestrator(StubProvider::with_prices("AAPL", &[("2024-01-31", dec!(200))]), vec![]);
        let output = orch.run(&request(&["AAPL"])).await.unwrap();
        let decision = &output.decisions["AAPL"];
        assert_eq!(decision.action, Action::Hold);
        assert!(decision.reasoning.contains("No analyst signals"));
    }

    #[tokio::test]
    async fn invalid_portfolio_is_rejected() {
        let orch = orchestrator(StubProvider::new(), vec![]);
        let mut req = request(&["AAPL"]);
        req.portfolio.cash = dec!(-1);
        assert!(matches!(orch.run(&req).await, Err(AgentError::Portfolio(_))));
    }

    #[tokio::test]
    async fn second_run_is_served_from_cache() {
        let provider = Arc::new(StubProvider::with_prices("AAPL", &[("2024-01-31", dec!(200))]));
        let fetcher = Arc::new(CachedFetcher::new(
            Arc::new(DataCache::new(Some(100), None)),
            Arc::clone(&provider) as Arc<dyn council_cache::DataProvider>,
        ));
        let orch = Orchestrator::new(
            vec![],
            fetcher,
            Arc::new(FixedFractionRisk::default()),
            RunSettings::default(),
        );

        orch.run(&request(&["AAPL"])).await.unwrap();
        let after_first = provider.calls();
        orch.run(&request(&["AAPL"])).await.unwrap();
        // Only the empty record types are asked for again
        assert_eq!(provider.calls() - after_first, after_first - 1);
    }

    #[test]
    fn dedupe_normalizes_and_keeps_order() {
        let tickers: Vec<String> = ["msft", " AAPL", "MSFT", ""].iter().map(|t| t.to_string()).collect();
        assert_eq!(dedupe(&tickers), vec!["MSFT".to_string(), "AAPL".to_string()]);
    }
}
