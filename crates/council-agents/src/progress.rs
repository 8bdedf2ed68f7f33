use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

/// Last reported state of one agent.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgentStatus {
    pub ticker: Option<String>,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    started: bool,
    agents: BTreeMap<String, AgentStatus>,
}

/// Shared table of agent progress. Observes the run only; nothing reads it
/// to make decisions.
#[derive(Default)]
pub struct AgentProgress {
    inner: Mutex<Inner>,
}

impl AgentProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves only display state behind.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn start(&self) {
        self.lock().started = true;
        info!("Progress tracking started");
    }

    pub fn stop(&self) {
        let mut inner = self.lock();
        inner.started = false;
        info!(agents = inner.agents.len(), "Progress tracking stopped");
    }

    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    pub fn update_status(&self, agent: &str, ticker: Option<&str>, status: &str) {
        let mut inner = self.lock();
        let entry = AgentStatus {
            ticker: ticker.map(str::to_string),
            status: status.to_string(),
            updated_at: Utc::now(),
        };
        debug!(agent, ticker = ticker.unwrap_or("-"), status, "Agent status");
        inner.agents.insert(agent.to_string(), entry);
    }

    pub fn status(&self, agent: &str) -> Option<AgentStatus> {
        self.lock().agents.get(agent).cloned()
    }

    /// Every agent's latest status, ordered by agent id.
    pub fn snapshot(&self) -> BTreeMap<String, AgentStatus> {
        self.lock().agents.clone()
    }
}
