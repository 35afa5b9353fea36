//! The built-in tutor agents and their tools.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::json;

use lingo::agents::{AgentProfile, FnTool, ToolOutput};
use lingo::errors::AgentResult;
use lingo::exercise::exercise_set_schema;
use lingo::schema::{ParamKind, ParamSpec};

/// What the conversation agent has learned about the user so far. Shared with
/// the `save_learner_profile` tool; the session loop is single-threaded so the
/// mutex is only there to satisfy the tool closure bounds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LearnerProfile {
    pub target_language: Option<String>,
    pub level: Option<String>,
    pub learning_focus: Option<String>,
}

pub type SharedLearnerProfile = Arc<Mutex<LearnerProfile>>;

pub const EXERCISE_AGENT: &str = "exercises";

pub fn exercise_agent(model: &str) -> AgentResult<AgentProfile> {
    AgentProfile::builder(EXERCISE_AGENT, model)
        .instructions(
            "You are an AI language tutor generating language exercises. \
             Tailor every exercise to the learner's target language, level and \
             learning focus, and explain answers in English.",
        )
        .output_schema(exercise_set_schema())
        .temperature(0.9)
        .build()
}

/// The agent a session starts with: a conversationalist that records what the
/// learner wants and can hand the session over to the exercise generator.
pub fn conversation_agent(model: &str, learner: SharedLearnerProfile) -> AgentResult<AgentProfile> {
    let save_profile = {
        let learner = Arc::clone(&learner);
        FnTool::new(
            "save_learner_profile",
            "Record the learner's target language, level and learning focus",
            &[
                ParamSpec::required(
                    "target_language",
                    "The language the learner wants to study",
                    ParamKind::String,
                ),
                ParamSpec::optional(
                    "level",
                    "How well the learner already knows the language",
                    ParamKind::String,
                    json!("beginner"),
                )
                .one_of(&["beginner", "intermediate", "advanced"]),
                ParamSpec::optional(
                    "learning_focus",
                    "What the learner wants to practice",
                    ParamKind::String,
                    json!("vocabulary"),
                ),
            ],
            move |args| {
                let mut profile = learner.lock().unwrap();
                if let Some(language) = args.get("target_language").and_then(|v| v.as_str()) {
                    profile.target_language = Some(language.to_string());
                }
                if let Some(level) = args.get("level").and_then(|v| v.as_str()) {
                    profile.level = Some(level.to_string());
                }
                if let Some(focus) = args.get("learning_focus").and_then(|v| v.as_str()) {
                    profile.learning_focus = Some(focus.to_string());
                }
                Ok(ToolOutput::Text(format!(
                    "Saved learner profile: {}",
                    serde_json::to_string(&*profile).unwrap_or_default()
                )))
            },
        )
    };

    let exercises = exercise_agent(model)?;
    let start_exercises = FnTool::new(
        "start_exercises",
        "Hand the session to the exercise generator once the learner is ready to practice",
        &[],
        move |_args| Ok(ToolOutput::Handoff(exercises.clone())),
    );

    AgentProfile::builder("conversation", model)
        .instructions(
            "You are a smooth conversationalist and your role is to chat with the \
             user about how to learn a new language. Begin by asking some basic \
             questions: what language they want to learn, how well they currently \
             understand it, and what proficiency level they want to reach. Save \
             what you learn with the save_learner_profile tool, and when the user \
             is ready to practice, call start_exercises.",
        )
        .tool(Arc::new(save_profile))
        .tool(Arc::new(start_exercises))
        .build()
}
