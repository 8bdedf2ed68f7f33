use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::parser::parse_structured;

/// A language model reachable by prompt. Mockable for testing.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    fn model(&self) -> &str;

    /// Send one prompt pair and return the raw text reply.
    async fn invoke(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AgentError>;
}

/// Ask the model for a `T`, retrying malformed or failed replies.
///
/// Makes up to `max_retries` attempts (at least one). If none yields a
/// parseable `T`, returns `default()` instead of an error.
pub async fn invoke_structured<T, F>(
    invoker: &dyn ModelInvoker,
    system_prompt: &str,
    user_prompt: &str,
    max_retries: u32,
    default: F,
) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    let attempts = max_retries.max(1);
    for attempt in 1..=attempts {
        let result = invoker
            .invoke(system_prompt, user_prompt)
            .await
            .and_then(|raw| parse_structured::<T>(&raw));
        match result {
            Ok(value) => {
                debug!(model = invoker.model(), attempt, "Structured model call succeeded");
                return value;
            }
            Err(e) => {
                warn!(model = invoker.model(), attempt, attempts, error = %e, "Model call failed");
            }
        }
    }
    default()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned replies in order; an `Err` entry fails that call.
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, String>>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedModel {
        pub fn new(replies: Vec<Result<&str, &str>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(String::from).map_err(String::from))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ModelInvoker for ScriptedModel {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn invoke(&self, _system: &str, _user: &str) -> Result<String, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.replies.lock().unwrap().pop_front();
            match next {
                Some(Ok(text)) => Ok(text),
                Some(Err(msg)) => Err(AgentError::Model(msg)),
                None => Err(AgentError::Model("script exhausted".to_string())),
            }
        }
    }

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Reply {
        name: String,
        value: f64,
    }

    fn fallback() -> Reply {
        Reply {
            name: "d".to_string(),
            value: 1.0,
        }
    }

    #[tokio::test]
    async fn first_good_reply_wins() {
        let model = ScriptedModel::new(vec![Ok(r#"{"name": "x", "value": 2.5}"#)]);
        let reply: Reply = invoke_structured(&model, "sys", "user", 3, fallback).await;
        assert_eq!(reply.name, "x");
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_past_garbage() {
        let model = ScriptedModel::new(vec![
            Ok("not json"),
            Err("boom"),
            Ok("```json\n{\"name\": \"y\", \"value\": 0}\n```"),
        ]);
        let reply: Reply = invoke_structured(&model, "sys", "user", 3, fallback).await;
        assert_eq!(reply.name, "y");
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_returns_default() {
        let model = ScriptedModel::new(vec![Err("boom"), Err("boom")]);
        let reply: Reply = invoke_structured(&model, "sys", "user", 2, fallback).await;
        assert_eq!(reply, fallback());
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_retries_still_tries_once() {
        let model = ScriptedModel::new(vec![]);
        let reply: Reply = invoke_structured(&model, "sys", "user", 0, fallback).await;
        assert_eq!(reply, fallback());
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }
}
