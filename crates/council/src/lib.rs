//! Council - a panel of investor-persona analysts advising on a set of tickers.
//!
//! Each analyst wraps a language model call with its own investment
//! philosophy. Their signals are aggregated into one sized decision per
//! ticker, with financial data fetched once through a shared cache.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use council::models::{AppConfig, Portfolio};
//! use council::agents::RunRequest;
//! ```

pub use council_agents as agents;
pub use council_cache as cache;
pub use council_models as models;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use council_agents::{
    AnalystAgent, ClaudeCli, FixedFractionRisk, LlmAnalyst, ModelInvoker, Orchestrator,
    RunOutput, RunRequest, RunSettings,
};
use council_cache::{CachedFetcher, DataCache, FinancialDatasetsClient, SqliteStore};
use council_models::config::{AgentsConfig, AnalystConfig, AppConfig};
use council_models::ANALYST_ORDER;
use tracing::info;

/// Build an Orchestrator from configuration.
pub fn build_orchestrator(config: &AppConfig) -> Result<Orchestrator> {
    let provider = FinancialDatasetsClient::from_config(&config.data)
        .context("Failed to build financial data client")?;
    let cache = Arc::new(DataCache::from_config(&config.cache));
    let mut fetcher = CachedFetcher::new(cache, Arc::new(provider));
    if let Some(path) = &config.cache.persist_path {
        let store = SqliteStore::open(path)
            .with_context(|| format!("Failed to open cache store: {path}"))?;
        info!(path = %path, "Using persisted cache store");
        fetcher = fetcher.with_store(Arc::new(store));
    }

    Ok(Orchestrator::new(
        build_analysts(&config.agents)?,
        Arc::new(fetcher),
        Arc::new(FixedFractionRisk::from_config(&config.risk)),
        RunSettings::from_config(config),
    ))
}

/// One persona analyst per enabled entry, each with its own model invoker.
pub fn build_analysts(config: &AgentsConfig) -> Result<Vec<Arc<dyn AnalystAgent>>> {
    let timeout = Duration::from_secs(config.analyst_timeout_seconds);
    config
        .analysts
        .iter()
        .filter(|a| a.enabled)
        .map(|a| {
            let model = a.model.clone().unwrap_or_else(|| config.model.clone());
            let invoker: Arc<dyn ModelInvoker> = Arc::new(
                ClaudeCli::new(model, timeout)
                    .with_context(|| format!("Invalid model for analyst {}", a.id))?,
            );
            let analyst = LlmAnalyst::new(&a.id, invoker, config.max_retries)
                .with_context(|| format!("Unknown analyst: {}", a.id))?;
            Ok(Arc::new(analyst) as Arc<dyn AnalystAgent>)
        })
        .collect()
}

/// Enable exactly the analysts named in `ids`, adding entries the config
/// does not list yet.
pub fn select_analysts(config: &mut AgentsConfig, ids: &[String]) -> Result<()> {
    for id in ids {
        if !ANALYST_ORDER.iter().any(|(_, known)| *known == id.as_str()) {
            let known: Vec<&str> = ANALYST_ORDER.iter().map(|(_, known)| *known).collect();
            bail!("Unknown analyst '{id}', expected one of: {}", known.join(", "));
        }
    }
    for analyst in &mut config.analysts {
        analyst.enabled = ids.contains(&analyst.id);
    }
    for id in ids {
        if !config.analysts.iter().any(|a| &a.id == id) {
            config.analysts.push(AnalystConfig {
                id: id.clone(),
                model: None,
                enabled: true,
            });
        }
    }
    Ok(())
}

/// Run the panel once.
///
/// Everything fetched by an earlier run is dropped first. With a store
/// attached, stored partitions are served only for date ranges they were
/// fetched for, and the cache is written back afterwards.
pub async fn run(orchestrator: &Orchestrator, request: &RunRequest) -> Result<RunOutput> {
    let fetcher = orchestrator.fetcher();
    fetcher.reset();

    let output = orchestrator.run(request).await.context("Run failed")?;

    fetcher.persist().context("Failed to persist cached data")?;
    Ok(output)
}
