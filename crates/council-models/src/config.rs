use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::analysts::ANALYST_ORDER;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub risk: RiskConfig,
}

/// Configuration for the in-process data cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of tickers kept per record type. Unbounded when unset;
    /// a bound may evict a ticker mid-run and force a refetch.
    pub max_tickers: Option<u64>,
    /// Optional time-to-live for cached partitions. `None` keeps them for the process lifetime.
    pub ttl_seconds: Option<u64>,
    /// Optional SQLite file used to carry cache contents across runs.
    pub persist_path: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_tickers: None,
            ttl_seconds: None,
            persist_path: None,
        }
    }
}

/// Configuration for the financial data provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub request_timeout_seconds: u64,
    /// Number of reporting periods to request for metrics and line items.
    pub period_limit: u32,
    pub news_limit: u32,
    pub insider_trade_limit: u32,
    /// Line items requested for every ticker.
    pub line_items: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.financialdatasets.ai".to_string(),
            api_key_env: "FINANCIAL_DATASETS_API_KEY".to_string(),
            request_timeout_seconds: 30,
            period_limit: 10,
            news_limit: 100,
            insider_trade_limit: 100,
            line_items: [
                "revenue",
                "net_income",
                "free_cash_flow",
                "operating_margin",
                "total_debt",
                "shareholders_equity",
                "outstanding_shares",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Configuration for the analyst layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentsConfig {
    /// Per-analyst timeout in seconds.
    pub analyst_timeout_seconds: u64,
    /// Default model for analysts.
    pub model: String,
    /// Attempts per model call before falling back to the default signal.
    pub max_retries: u32,
    pub analysts: Vec<AnalystConfig>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            analyst_timeout_seconds: 90,
            model: "claude-3-5-haiku-latest".to_string(),
            max_retries: 3,
            analysts: ANALYST_ORDER
                .iter()
                .map(|(_, id)| AnalystConfig {
                    id: id.to_string(),
                    model: None,
                    enabled: true,
                })
                .collect(),
        }
    }
}

/// Configuration for a single analyst persona.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalystConfig {
    pub id: String,
    /// Override model for this analyst. Falls back to `AgentsConfig::model`.
    pub model: Option<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RiskConfig {
    /// Largest share of total portfolio value a single ticker may take.
    pub max_position_fraction: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_fraction: Decimal::new(20, 2),
        }
    }
}
