//! The dispatch loop that drives one conversation turn end to end.
//!
//! A [`Session`] owns the transcript and the current agent profile. Each turn
//! appends the user message, calls the remote model with the current agent's
//! instructions and tools, executes any requested tool calls, and keeps going
//! until the model answers without tool requests. A tool that returns
//! [`ToolOutput::Handoff`] replaces the current agent for all subsequent
//! completions; the transcript is never reset by a handoff.
//!
//! Tool failures (`ToolNotFound`, `ToolArgumentError`, execution errors) are
//! recorded in the transcript against the originating call id and reported to
//! the model; they never abort the session. Remote failures are retried with
//! backoff and, once exhausted, fail only the current turn: the transcript is
//! rolled back to its pre-turn state.

use crate::agents::{AgentProfile, ToolOutput};
use crate::errors::{AgentError, AgentResult};
use crate::models::message::{Message, ToolRequest};
use crate::providers::base::{
    complete_with_backoff, Provider, ProviderError, DEFAULT_REMOTE_ATTEMPTS,
};
use crate::schema::validate_arguments;

/// What a completed turn surfaced to the caller
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The final assistant text of the turn
    pub reply: String,
    /// Name of the agent now current, if a handoff happened this turn
    pub handoff: Option<String>,
}

pub struct Session {
    provider: Box<dyn Provider>,
    agent: AgentProfile,
    transcript: Vec<Message>,
    max_remote_attempts: usize,
}

impl Session {
    pub fn new(provider: Box<dyn Provider>, agent: AgentProfile) -> Self {
        Session {
            provider,
            agent,
            transcript: Vec::new(),
            max_remote_attempts: DEFAULT_REMOTE_ATTEMPTS,
        }
    }

    pub fn with_max_remote_attempts(mut self, max_remote_attempts: usize) -> Self {
        self.max_remote_attempts = max_remote_attempts;
        self
    }

    /// The currently active agent
    pub fn agent(&self) -> &AgentProfile {
        &self.agent
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// The underlying provider, for callers that need one-shot generations
    /// outside the dispatch loop
    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    /// Drive one conversation turn. On a remote failure the transcript is
    /// rolled back so the session stays usable for the next turn.
    pub async fn turn(&mut self, user_text: &str) -> Result<TurnOutcome, ProviderError> {
        let checkpoint = self.transcript.len();
        self.transcript.push(Message::user().with_text(user_text));

        match self.run_turn().await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                tracing::warn!(%error, "turn failed, rolling back transcript");
                self.transcript.truncate(checkpoint);
                Err(error)
            }
        }
    }

    async fn run_turn(&mut self) -> Result<TurnOutcome, ProviderError> {
        let mut handoff = None;

        loop {
            let tools = self.agent.tool_specs();
            let (response, _usage) = complete_with_backoff(
                self.provider.as_ref(),
                self.agent.model(),
                self.agent.instructions(),
                &self.transcript,
                &tools,
                self.agent.output_schema(),
                self.agent.temperature(),
                self.max_remote_attempts,
            )
            .await?;

            self.transcript.push(response.clone());

            let requests: Vec<ToolRequest> =
                response.tool_requests().into_iter().cloned().collect();

            if requests.is_empty() {
                return Ok(TurnOutcome {
                    reply: response.text(),
                    handoff,
                });
            }

            // Every call in the batch was issued under the current agent's
            // advertised tools, so the whole batch dispatches against it; a
            // handoff takes effect only for subsequent completions.
            let mut pending_handoff = None;
            for request in requests {
                let (result, next_agent) = self.dispatch_tool_call(&request).await;

                if let Err(error) = &result {
                    tracing::warn!(id = %request.id, %error, "tool call failed");
                }

                self.transcript
                    .push(Message::tool().with_tool_response(request.id.clone(), result));

                if next_agent.is_some() {
                    pending_handoff = next_agent;
                }
            }

            if let Some(profile) = pending_handoff {
                tracing::info!(from = %self.agent.name(), to = %profile.name(), "agent handoff");
                handoff = Some(profile.name().to_string());
                self.agent = profile;
            }
        }
    }

    /// Dispatch a single tool call against the active agent's tools
    async fn dispatch_tool_call(
        &self,
        request: &ToolRequest,
    ) -> (AgentResult<String>, Option<AgentProfile>) {
        let call = match &request.tool_call {
            Ok(call) => call,
            Err(error) => return (Err(error.clone()), None),
        };

        let handler = match self.agent.tool(&call.name) {
            Some(handler) => handler,
            None => return (Err(AgentError::ToolNotFound(call.name.clone())), None),
        };

        if let Err(error) = validate_arguments(&handler.spec().parameters, &call.arguments) {
            return (Err(error), None);
        }

        match handler.call(call.arguments.clone()).await {
            Ok(ToolOutput::Text(text)) => (Ok(text), None),
            Ok(ToolOutput::Handoff(profile)) => (
                Ok(format!("Transferred to agent '{}'.", profile.name())),
                Some(profile),
            ),
            Err(error) => (Err(error), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::FnTool;
    use crate::models::role::Role;
    use crate::models::tool::ToolCall;
    use crate::providers::mock::{FailingProvider, MockProvider};
    use crate::schema::{ParamKind, ParamSpec};
    use serde_json::json;
    use std::sync::Arc;

    fn conversation_agent() -> AgentProfile {
        AgentProfile::builder("conversation", "gpt-4o-mini")
            .instructions("You chat with the user about learning a language.")
            .tool(Arc::new(FnTool::new(
                "echo",
                "reply with the input",
                &[ParamSpec::required(
                    "message",
                    "The message to echo",
                    ParamKind::String,
                )],
                |args| {
                    let message = args.get("message").and_then(|v| v.as_str()).unwrap_or("");
                    Ok(ToolOutput::Text(message.to_string()))
                },
            )))
            .build()
            .unwrap()
    }

    fn exercise_agent() -> AgentProfile {
        AgentProfile::builder("exercises", "gpt-4o-mini")
            .instructions("You generate language exercises.")
            .build()
            .unwrap()
    }

    fn agent_with_escalation() -> AgentProfile {
        let exercises = exercise_agent();
        AgentProfile::builder("conversation", "gpt-4o-mini")
            .instructions("You chat with the user about learning a language.")
            .tool(Arc::new(FnTool::new(
                "escalate",
                "Hand the session to the exercise generator",
                &[],
                move |_args| Ok(ToolOutput::Handoff(exercises.clone())),
            )))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_simple_response_grows_transcript_by_two() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("Salut!")]);
        let mut session = Session::new(Box::new(provider), conversation_agent());

        let outcome = session.turn("Hi").await.unwrap();

        assert_eq!(outcome.reply, "Salut!");
        assert!(outcome.handoff.is_none());
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.transcript()[0].role, Role::User);
        assert_eq!(session.transcript()[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_tool_call_round() {
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("1", Ok(ToolCall::new("echo", json!({"message": "test"})))),
            Message::assistant().with_text("Done!"),
        ]);
        let mut session = Session::new(Box::new(provider), conversation_agent());

        let outcome = session.turn("Echo test").await.unwrap();

        assert_eq!(outcome.reply, "Done!");
        // user, assistant with call, tool result, closing assistant
        assert_eq!(session.transcript().len(), 4);
        let response = session.transcript()[2].content[0].as_tool_response().unwrap();
        assert_eq!(response.id, "1");
        assert_eq!(response.tool_result.as_deref(), Ok("test"));
    }

    #[tokio::test]
    async fn test_multiple_tool_calls_in_one_round() {
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("1", Ok(ToolCall::new("echo", json!({"message": "first"}))))
                .with_tool_request("2", Ok(ToolCall::new("echo", json!({"message": "second"})))),
            Message::assistant().with_text("All done!"),
        ]);
        let mut session = Session::new(Box::new(provider), conversation_agent());

        let outcome = session.turn("Two calls").await.unwrap();

        assert_eq!(outcome.reply, "All done!");
        // user, assistant, two tool results, closing assistant
        assert_eq!(session.transcript().len(), 5);
        assert_eq!(session.transcript()[2].role, Role::Tool);
        assert_eq!(session.transcript()[3].role, Role::Tool);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_and_session_survives() {
        let provider = MockProvider::new(vec![
            Message::assistant().with_tool_request("1", Ok(ToolCall::new("bogus", json!({})))),
            Message::assistant().with_text("Sorry about that."),
            Message::assistant().with_text("Still here!"),
        ]);
        let mut session = Session::new(Box::new(provider), conversation_agent());

        let outcome = session.turn("Use the bogus tool").await.unwrap();
        assert_eq!(outcome.reply, "Sorry about that.");

        let response = session.transcript()[2].content[0].as_tool_response().unwrap();
        assert!(matches!(
            response.tool_result,
            Err(AgentError::ToolNotFound(_))
        ));

        // The next turn still works
        let outcome = session.turn("Are you ok?").await.unwrap();
        assert_eq!(outcome.reply, "Still here!");
    }

    #[tokio::test]
    async fn test_argument_validation_failure() {
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("1", Ok(ToolCall::new("echo", json!({"message": 42})))),
            Message::assistant().with_text("Let me try again."),
        ]);
        let mut session = Session::new(Box::new(provider), conversation_agent());

        session.turn("Echo a number").await.unwrap();

        let response = session.transcript()[2].content[0].as_tool_response().unwrap();
        assert!(matches!(
            response.tool_result,
            Err(AgentError::ToolArgumentError(_))
        ));
    }

    #[tokio::test]
    async fn test_handoff_switches_agent_and_keeps_transcript() {
        let provider = MockProvider::new(vec![
            Message::assistant().with_tool_request("1", Ok(ToolCall::new("escalate", json!({})))),
            Message::assistant().with_text("Time for some exercises!"),
        ]);
        let call_log = provider.call_log();
        let mut session = Session::new(Box::new(provider), agent_with_escalation());

        let outcome = session.turn("I want to learn French").await.unwrap();

        assert_eq!(session.agent().name(), "exercises");
        assert_eq!(outcome.handoff.as_deref(), Some("exercises"));
        // user, assistant with call, tool result, assistant from the new agent
        assert_eq!(session.transcript().len(), 4);

        let calls = call_log.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].system.contains("chat with the user"));
        assert!(calls[0].tool_names.contains(&"escalate".to_string()));
        // The completion after the handoff uses the new agent's instructions
        // and still sends the pre-handoff conversation as context
        assert!(calls[1].system.contains("generate language exercises"));
        assert!(calls[1].tool_names.is_empty());
        assert_eq!(calls[1].message_count, 3);
    }

    #[tokio::test]
    async fn test_sibling_tool_call_after_handoff_uses_issuing_agent() {
        let exercises = exercise_agent();
        let agent = AgentProfile::builder("conversation", "gpt-4o-mini")
            .instructions("You chat with the user about learning a language.")
            .tool(Arc::new(FnTool::new(
                "escalate",
                "Hand the session to the exercise generator",
                &[],
                move |_args| Ok(ToolOutput::Handoff(exercises.clone())),
            )))
            .tool(Arc::new(FnTool::new(
                "echo",
                "reply with the input",
                &[ParamSpec::required(
                    "message",
                    "The message to echo",
                    ParamKind::String,
                )],
                |args| {
                    let message = args.get("message").and_then(|v| v.as_str()).unwrap_or("");
                    Ok(ToolOutput::Text(message.to_string()))
                },
            )))
            .build()
            .unwrap();

        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("1", Ok(ToolCall::new("escalate", json!({}))))
                .with_tool_request("2", Ok(ToolCall::new("echo", json!({"message": "hi"})))),
            Message::assistant().with_text("Let's practice!"),
        ]);
        let mut session = Session::new(Box::new(provider), agent);

        let outcome = session.turn("Quiz me and echo hi").await.unwrap();

        // The echo call was issued under the conversation agent, so it still
        // resolves even though the escalate call before it handed off
        let echo_response = session.transcript()[3].content[0].as_tool_response().unwrap();
        assert_eq!(echo_response.id, "2");
        assert_eq!(echo_response.tool_result.as_deref(), Ok("hi"));
        assert_eq!(session.agent().name(), "exercises");
        assert_eq!(outcome.handoff.as_deref(), Some("exercises"));
    }

    #[tokio::test]
    async fn test_handoff_persists_into_next_turn() {
        let provider = MockProvider::new(vec![
            Message::assistant().with_tool_request("1", Ok(ToolCall::new("escalate", json!({})))),
            Message::assistant().with_text("Exercises ready."),
            Message::assistant().with_text("Question one..."),
        ]);
        let call_log = provider.call_log();
        let mut session = Session::new(Box::new(provider), agent_with_escalation());

        session.turn("I want to learn French").await.unwrap();
        let before = session.transcript().len();
        session.turn("Quiz me").await.unwrap();

        let calls = call_log.lock().unwrap();
        assert!(calls[2].system.contains("generate language exercises"));
        // Earlier history is still sent as context
        assert_eq!(calls[2].message_count, before + 1);
    }

    #[tokio::test]
    async fn test_remote_failure_rolls_back_and_is_bounded() {
        let provider = FailingProvider::new();
        let attempts = provider.attempt_counter();
        let mut session =
            Session::new(Box::new(provider), conversation_agent()).with_max_remote_attempts(2);

        let error = session.turn("Hello?").await.unwrap_err();

        assert!(matches!(error, ProviderError::RemoteCall(_)));
        assert_eq!(*attempts.lock().unwrap(), 2);
        // Rolled back: the failed turn leaves no trace
        assert!(session.transcript().is_empty());
    }
}
