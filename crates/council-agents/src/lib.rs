pub mod aggregator;
pub mod analyst;
pub mod claude_cli;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod parser;
pub mod personas;
pub mod progress;
pub mod risk;

pub mod test_support;

pub use aggregator::aggregate;
pub use analyst::{AnalysisRequest, AnalystAgent, LlmAnalyst};
pub use claude_cli::ClaudeCli;
pub use error::AgentError;
pub use model::{invoke_structured, ModelInvoker};
pub use orchestrator::{Orchestrator, RunOutput, RunRequest, RunSettings};
pub use progress::{AgentProgress, AgentStatus};
pub use risk::{FixedFractionRisk, RiskModel};
