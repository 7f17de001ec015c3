//! Tool-calling agent loop.
//!
//! A [`ToolAgent`] pairs a [`ChatModel`] with a set of [`AgentTool`]s and
//! iterates until the model answers without requesting a tool:
//!
//! ```text
//! [system, user(question)]
//!        │
//!        ▼
//!   complete(messages, tools) ──► no tool calls ──► final answer
//!        │
//!        ▼ tool calls
//!   execute each tool, append tool results, repeat
//! ```
//!
//! Tool failures never abort the loop. A tool error, or a call to a tool
//! the agent does not know, is returned to the model as `"Error: …"` text
//! so it can correct itself. Only exhausting `max_iterations` or a failing
//! model call is an error.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::llm::{ChatModel, CompletionRequest, Message, Role, ToolCall, ToolSpec};

/// Default cap on model round-trips per question.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

// ═══════════════════════════════════════════════════════════════════════
// AgentTool Trait
// ═══════════════════════════════════════════════════════════════════════

/// A deterministic function the model may call.
#[async_trait]
pub trait AgentTool: Send + Sync {
    /// Function name advertised to the model (lowercase, underscores).
    fn name(&self) -> &str;

    /// One-line description the model uses to pick the tool.
    fn description(&self) -> &str;

    /// JSON Schema for the arguments object (`type: "object"`).
    fn parameters_schema(&self) -> Value;

    /// Run the tool. The returned text is fed back to the model verbatim.
    async fn execute(&self, params: Value) -> Result<String>;
}

fn tool_spec(tool: &dyn AgentTool) -> ToolSpec {
    ToolSpec {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        parameters: tool.parameters_schema(),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ToolAgent
// ═══════════════════════════════════════════════════════════════════════

pub struct ToolAgent {
    model: Arc<dyn ChatModel>,
    tools: Vec<Arc<dyn AgentTool>>,
    system_prompt: String,
    max_iterations: usize,
    temperature: Option<f32>,
}

impl ToolAgent {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: Vec<Arc<dyn AgentTool>>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            model,
            tools,
            system_prompt: system_prompt.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            temperature: None,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Answer `question`, returning the full transcript.
    pub async fn run(&self, question: &str) -> Result<AgentRun> {
        let specs: Vec<ToolSpec> = self.tools.iter().map(|t| tool_spec(t.as_ref())).collect();
        let mut messages = vec![
            Message::system(self.system_prompt.as_str()),
            Message::user(question),
        ];

        for iteration in 1..=self.max_iterations {
            let mut request = CompletionRequest::new(messages.clone()).with_tools(specs.clone());
            if let Some(t) = self.temperature {
                request = request.with_temperature(t);
            }
            let completion = self.model.complete(request).await?;
            let calls = completion.tool_calls().to_vec();
            messages.push(completion.message);

            if calls.is_empty() {
                tracing::debug!(iteration, "agent produced final answer");
                return Ok(AgentRun { messages });
            }

            for call in &calls {
                let output = self.dispatch(call).await;
                messages.push(Message::tool_result(call.id.as_str(), output));
            }
        }

        bail!(
            "agent did not produce an answer within {} iterations",
            self.max_iterations
        )
    }

    async fn dispatch(&self, call: &ToolCall) -> String {
        let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) else {
            tracing::warn!(tool = %call.name, "model called unknown tool");
            return format!("Error: unknown tool '{}'", call.name);
        };
        tracing::info!(tool = %call.name, args = %call.arguments, "tool call");
        match tool.execute(call.arguments.clone()).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "tool failed");
                format!("Error: {:#}", e)
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// AgentRun
// ═══════════════════════════════════════════════════════════════════════

/// The transcript of one [`ToolAgent::run`].
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub messages: Vec<Message>,
}

/// One readable entry of an agent transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentStep {
    UserQuery(String),
    ToolCall { name: String, arguments: Value },
    ToolResult(String),
    Thought(String),
}

impl AgentRun {
    /// Content of the last message (the model's final reply).
    pub fn answer(&self) -> &str {
        self.messages.last().map(|m| m.content_str()).unwrap_or("")
    }

    /// Transcript breakdown, skipping the system prompt.
    pub fn steps(&self) -> Vec<AgentStep> {
        let mut steps = Vec::new();
        for m in &self.messages {
            match m.role {
                Role::System => {}
                Role::User => steps.push(AgentStep::UserQuery(m.content_str().to_string())),
                Role::Assistant => {
                    for call in &m.tool_calls {
                        steps.push(AgentStep::ToolCall {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        });
                    }
                    if !m.content_str().is_empty() {
                        steps.push(AgentStep::Thought(m.content_str().to_string()));
                    }
                }
                Role::Tool => steps.push(AgentStep::ToolResult(m.content_str().to_string())),
            }
        }
        steps
    }

    /// Number of tool calls the model made.
    pub fn tool_call_count(&self) -> usize {
        self.messages.iter().map(|m| m.tool_calls.len()).sum()
    }
}

impl fmt::Display for AgentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStep::UserQuery(q) => write!(f, "User Query: {}", q),
            AgentStep::ToolCall { name, arguments } => {
                write!(f, "Tool: {}\n  Arguments: {}", name, arguments)
            }
            AgentStep::ToolResult(r) => write!(f, "Tool Result: {}", r),
            AgentStep::Thought(t) => write!(f, "AI Thought: {}", t),
        }
    }
}
