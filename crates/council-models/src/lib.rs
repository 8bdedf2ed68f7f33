pub mod analysts;
pub mod config;
pub mod decision;
pub mod financial;
pub mod portfolio;
pub mod signal;

pub use analysts::{analyst_rank, display_name, sort_by_priority, ANALYST_ORDER};
pub use config::{AgentsConfig, AnalystConfig, AppConfig, CacheConfig, DataConfig, RiskConfig};
pub use decision::{Action, Decision};
pub use financial::{
    CachedRecord, CompanyNews, FinancialMetrics, InsiderTrade, LineItem, Price, RecordType,
};
pub use portfolio::{Portfolio, PortfolioError, Position, RealizedGains, RiskLimits};
pub use signal::{AnalystSignal, Direction, Signal, SignalError};
