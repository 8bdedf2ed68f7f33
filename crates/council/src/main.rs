use anyhow::{Context, Result};
use chrono::{Local, Months, NaiveDate};
use clap::Parser;
use council_agents::claude_cli::check_cli_available;
use council_agents::RunRequest;
use council_models::config::AppConfig;
use council_models::Portfolio;
use rust_decimal::Decimal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "council", about = "Investor-persona analyst panel for stock tickers")]
struct Cli {
    /// Path to configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<String>,

    /// Comma-separated tickers to analyze
    #[arg(short, long, value_delimiter = ',', required = true)]
    tickers: Vec<String>,

    /// Start of the analysis window (YYYY-MM-DD). Defaults to three months before the end date.
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// End of the analysis window (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Starting cash for the portfolio
    #[arg(long, default_value = "100000")]
    initial_cash: Decimal,

    /// Fraction of a short's value held as margin, between 0 and 1
    #[arg(long, default_value = "0")]
    margin_requirement: Decimal,

    /// Comma-separated analyst ids to run instead of the configured set
    #[arg(long, value_delimiter = ',')]
    analysts: Option<Vec<String>>,

    /// Include every analyst's raw signal in the output
    #[arg(long)]
    show_reasoning: bool,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,
}

fn load_config(path: Option<&str>) -> Result<AppConfig> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    let config_str =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config: {path}"))?;
    toml::from_str(&config_str).with_context(|| format!("Failed to parse config: {path}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(ids) = &cli.analysts {
        council::select_analysts(&mut config.agents, ids)?;
    }

    let end_date = cli.end_date.unwrap_or_else(|| Local::now().date_naive());
    let start_date = match cli.start_date {
        Some(date) => date,
        None => end_date
            .checked_sub_months(Months::new(3))
            .context("End date too early to derive a start date")?,
    };
    anyhow::ensure!(
        start_date <= end_date,
        "Start date {start_date} is after end date {end_date}"
    );

    let portfolio = Portfolio::new(cli.initial_cash, cli.margin_requirement)
        .context("Invalid portfolio settings")?;

    if !check_cli_available().await {
        warn!("claude CLI not found on PATH, analysts will fall back to neutral signals");
    }

    let orchestrator =
        council::build_orchestrator(&config).context("Failed to build orchestrator")?;
    info!(analysts = ?orchestrator.analyst_ids(), "Analyst panel ready");

    let request = RunRequest {
        tickers: cli.tickers,
        start_date,
        end_date,
        portfolio,
    };
    let output = council::run(&orchestrator, &request).await?;

    // Output decisions as JSON to stdout
    let mut value = serde_json::to_value(&output)?;
    if !cli.show_reasoning {
        if let Some(fields) = value.as_object_mut() {
            fields.remove("analyst_signals");
        }
    }
    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    println!("{rendered}");

    Ok(())
}
