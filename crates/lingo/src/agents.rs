//! Agent profiles and the tools they can call.
//!
//! An [`AgentProfile`] is the immutable configuration for one agent: system
//! instructions, model selection, the tools it may call, and an optional
//! structured output schema. Profiles are built once at startup; a session
//! switches which one is current when a handoff-capable tool returns a new
//! profile.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;
use crate::schema::{parameters_schema, ParamSpec};

/// What a tool invocation produced: a stringified value for the transcript,
/// or a handoff to another agent.
pub enum ToolOutput {
    Text(String),
    Handoff(AgentProfile),
}

impl fmt::Debug for ToolOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolOutput::Text(text) => f.debug_tuple("Text").field(text).finish(),
            ToolOutput::Handoff(profile) => f.debug_tuple("Handoff").field(&profile.name()).finish(),
        }
    }
}

/// A locally executable function advertised to the remote model
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The advertised spec, including the derived parameter schema
    fn spec(&self) -> &Tool;

    /// Invoke the tool with already-validated arguments
    async fn call(&self, arguments: Value) -> AgentResult<ToolOutput>;
}

/// A tool backed by a plain closure, with its schema derived from the
/// declared parameter list.
pub struct FnTool<F> {
    spec: Tool,
    func: F,
}

impl<F> FnTool<F>
where
    F: Fn(Value) -> AgentResult<ToolOutput> + Send + Sync,
{
    pub fn new<N, D>(name: N, description: D, params: &[ParamSpec], func: F) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Self {
            spec: Tool::new(name, description, parameters_schema(params)),
            func,
        }
    }
}

#[async_trait]
impl<F> ToolHandler for FnTool<F>
where
    F: Fn(Value) -> AgentResult<ToolOutput> + Send + Sync,
{
    fn spec(&self) -> &Tool {
        &self.spec
    }

    async fn call(&self, arguments: Value) -> AgentResult<ToolOutput> {
        (self.func)(arguments)
    }
}

/// Immutable agent configuration. Cloning shares the tool handlers.
#[derive(Clone)]
pub struct AgentProfile {
    name: String,
    model: String,
    instructions: String,
    tools: Vec<Arc<dyn ToolHandler>>,
    output_schema: Option<Value>,
    temperature: Option<f32>,
}

impl AgentProfile {
    pub fn builder<N, M>(name: N, model: M) -> AgentProfileBuilder
    where
        N: Into<String>,
        M: Into<String>,
    {
        AgentProfileBuilder {
            name: name.into(),
            model: model.into(),
            instructions: String::new(),
            tools: Vec::new(),
            output_schema: None,
            temperature: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn output_schema(&self) -> Option<&Value> {
        self.output_schema.as_ref()
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    /// Look up a tool by the name the model requested
    pub fn tool(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.tools.iter().find(|tool| tool.spec().name == name)
    }

    /// The specs advertised to the remote model, in declaration order
    pub fn tool_specs(&self) -> Vec<Tool> {
        self.tools.iter().map(|tool| tool.spec().clone()).collect()
    }
}

impl fmt::Debug for AgentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentProfile")
            .field("name", &self.name)
            .field("model", &self.model)
            .field(
                "tools",
                &self
                    .tools
                    .iter()
                    .map(|tool| tool.spec().name.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

pub struct AgentProfileBuilder {
    name: String,
    model: String,
    instructions: String,
    tools: Vec<Arc<dyn ToolHandler>>,
    output_schema: Option<Value>,
    temperature: Option<f32>,
}

impl AgentProfileBuilder {
    pub fn instructions<S: Into<String>>(mut self, instructions: S) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn tool(mut self, tool: Arc<dyn ToolHandler>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Build the profile. Tool names must be unique within the profile.
    pub fn build(self) -> AgentResult<AgentProfile> {
        let mut seen = std::collections::HashSet::new();
        for tool in &self.tools {
            if !seen.insert(tool.spec().name.clone()) {
                return Err(AgentError::DuplicateTool(tool.spec().name.clone()));
            }
        }

        Ok(AgentProfile {
            name: self.name,
            model: self.model,
            instructions: self.instructions,
            tools: self.tools,
            output_schema: self.output_schema,
            temperature: self.temperature,
        })
    }
}
