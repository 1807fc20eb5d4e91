//! Shared fixtures for integration tests: scripted agents with canned
//! responses and hooks that record every callback.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use agent_teams::{Agent, AgentResponse, Result, RunOptions, TeamError, TeamHooks, Usage};

/// Installs a test subscriber once; respects `RUST_LOG`.
#[allow(dead_code)]
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

enum Step {
    Reply(String),
    ReplyAfter(Duration, String),
    Fail(String),
}

/// An agent that replays a queue of canned steps, recording every input it
/// was invoked with. Falls back to a default reply when the queue is empty.
pub struct ScriptedAgent {
    name: String,
    steps: Mutex<VecDeque<Step>>,
    inputs: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Mutex::new(VecDeque::new()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.steps
            .lock()
            .unwrap()
            .push_back(Step::Reply(text.into()));
        self
    }

    pub fn reply_after(self, delay: Duration, text: impl Into<String>) -> Self {
        self.steps
            .lock()
            .unwrap()
            .push_back(Step::ReplyAfter(delay, text.into()));
        self
    }

    pub fn fail(self, message: impl Into<String>) -> Self {
        self.steps
            .lock()
            .unwrap()
            .push_back(Step::Fail(message.into()));
        self
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, input: &str, _options: RunOptions) -> Result<AgentResponse> {
        self.inputs.lock().unwrap().push(input.to_string());

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(text)) => {
                Ok(AgentResponse::text_only(&self.name, text, Usage::new(10, 5)))
            }
            Some(Step::ReplyAfter(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(AgentResponse::text_only(&self.name, text, Usage::new(10, 5)))
            }
            Some(Step::Fail(message)) => Err(TeamError::AgentFailed {
                agent: self.name.clone(),
                message,
            }),
            None => Ok(AgentResponse::text_only(
                &self.name,
                "Default response",
                Usage::new(10, 5),
            )),
        }
    }
}

/// Hooks that record one line per callback, in invocation order.
#[derive(Default)]
pub struct RecordingHooks {
    events: Mutex<Vec<String>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_with_prefix(&self, prefix: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl TeamHooks for RecordingHooks {
    fn on_round_start(&self, round: usize) {
        self.push(format!("round_start:{}", round));
    }

    fn on_agent_start(&self, agent: &str, _input: &str) {
        self.push(format!("agent_start:{}", agent));
    }

    fn on_agent_end(&self, agent: &str, _response: &AgentResponse) {
        self.push(format!("agent_end:{}", agent));
    }

    fn on_round_end(&self, round: usize, responses: &[AgentResponse]) {
        self.push(format!("round_end:{}:{}", round, responses.len()));
    }

    fn on_error(&self, error: &TeamError) {
        self.push(format!("error:{}", error));
    }

    fn on_consensus(&self, round: usize, text: &str) {
        self.push(format!("consensus:{}:{}", round, text));
    }
}
