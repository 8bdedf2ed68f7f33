use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The logical record types the data cache keeps one partition for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Prices,
    FinancialMetrics,
    LineItems,
    InsiderTrades,
    CompanyNews,
}

impl RecordType {
    pub const ALL: [RecordType; 5] = [
        RecordType::Prices,
        RecordType::FinancialMetrics,
        RecordType::LineItems,
        RecordType::InsiderTrades,
        RecordType::CompanyNews,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Prices => "prices",
            RecordType::FinancialMetrics => "financial_metrics",
            RecordType::LineItems => "line_items",
            RecordType::InsiderTrades => "insider_trades",
            RecordType::CompanyNews => "company_news",
        }
    }

    /// Name of the field used to deduplicate records of this type.
    pub fn key_field(&self) -> &'static str {
        match self {
            RecordType::Prices => "time",
            RecordType::FinancialMetrics | RecordType::LineItems => "report_period",
            RecordType::InsiderTrades => "filing_date",
            RecordType::CompanyNews => "date",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record that can live in the data cache.
///
/// Within one ticker's cached collection, records are deduplicated by
/// `natural_key()` alone; two records with the same key are the same record
/// regardless of their other fields.
pub trait CachedRecord: Clone + Send + Sync + Serialize + for<'de> Deserialize<'de> + 'static {
    const RECORD_TYPE: RecordType;

    fn natural_key(&self) -> &str;

    /// Calendar date of the record, taken from the leading `YYYY-MM-DD` of the key.
    fn record_date(&self) -> Option<NaiveDate> {
        let key = self.natural_key();
        let prefix = key.get(..10)?;
        NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
    }
}

/// A daily OHLCV bar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Price {
    pub open: Decimal,
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: u64,
    pub time: String,
}

impl CachedRecord for Price {
    const RECORD_TYPE: RecordType = RecordType::Prices;

    fn natural_key(&self) -> &str {
        &self.time
    }
}

/// Point-in-time valuation and profitability metrics for one reporting period.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FinancialMetrics {
    pub ticker: String,
    pub report_period: String,
    pub period: String,
    pub currency: String,
    pub market_cap: Option<Decimal>,
    pub enterprise_value: Option<Decimal>,
    pub price_to_earnings_ratio: Option<Decimal>,
    pub price_to_book_ratio: Option<Decimal>,
    pub price_to_sales_ratio: Option<Decimal>,
    pub free_cash_flow_yield: Option<Decimal>,
    pub gross_margin: Option<Decimal>,
    pub operating_margin: Option<Decimal>,
    pub net_margin: Option<Decimal>,
    pub return_on_equity: Option<Decimal>,
    pub return_on_invested_capital: Option<Decimal>,
    pub current_ratio: Option<Decimal>,
    pub debt_to_equity: Option<Decimal>,
    pub revenue_growth: Option<Decimal>,
    pub earnings_growth: Option<Decimal>,
    pub earnings_per_share: Option<Decimal>,
    pub book_value_per_share: Option<Decimal>,
    pub free_cash_flow_per_share: Option<Decimal>,
}

impl CachedRecord for FinancialMetrics {
    const RECORD_TYPE: RecordType = RecordType::FinancialMetrics;

    fn natural_key(&self) -> &str {
        &self.report_period
    }
}

/// A set of requested financial statement line items for one period.
/// Line item names vary per request, so the values are kept as a flattened map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub ticker: String,
    pub report_period: String,
    pub period: String,
    pub currency: String,
    #[serde(flatten)]
    pub values: serde_json::Map<String, serde_json::Value>,
}

impl CachedRecord for LineItem {
    const RECORD_TYPE: RecordType = RecordType::LineItems;

    fn natural_key(&self) -> &str {
        &self.report_period
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsiderTrade {
    pub ticker: String,
    pub issuer: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub is_board_director: Option<bool>,
    pub transaction_date: Option<String>,
    pub transaction_shares: Option<Decimal>,
    pub transaction_price_per_share: Option<Decimal>,
    pub transaction_value: Option<Decimal>,
    pub shares_owned_before_transaction: Option<Decimal>,
    pub shares_owned_after_transaction: Option<Decimal>,
    pub security_title: Option<String>,
    pub filing_date: String,
}

impl CachedRecord for InsiderTrade {
    const RECORD_TYPE: RecordType = RecordType::InsiderTrades;

    fn natural_key(&self) -> &str {
        &self.filing_date
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanyNews {
    pub ticker: String,
    pub title: String,
    pub author: Option<String>,
    pub source: String,
    pub date: String,
    pub url: String,
    pub sentiment: Option<String>,
}

impl CachedRecord for CompanyNews {
    const RECORD_TYPE: RecordType = RecordType::CompanyNews;

    fn natural_key(&self) -> &str {
        &self.date
    }
}
