//! Language exercises: the structured-output target for the exercise agent.
//!
//! The JSON shape (`type`, `question`, `options`, `correctAnswer`,
//! `explanation`) is what the exercise prompts ask the model for, and
//! [`exercise_set_schema`] is the matching schema handed to
//! [`generate_structured`](crate::generate::generate_structured).

use indoc::formatdoc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    SingleChoice,
    MultipleChoice,
    FillInTheBlank,
    Matching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    /// Conversation themes suitable for the level
    pub fn themes(&self) -> &'static [&'static str] {
        match self {
            Level::Beginner => &["Greetings", "Family", "Food", "Colors", "Numbers"],
            Level::Intermediate => &["Travel", "Work", "Hobbies", "Weather", "Shopping"],
            Level::Advanced => &[
                "Politics",
                "Environment",
                "Technology",
                "Literature",
                "Philosophy",
            ],
        }
    }

    pub fn grammar_topics(&self) -> &'static [&'static str] {
        match self {
            Level::Beginner => &[
                "Nouns and Pronouns",
                "Basic Verb Conjugation",
                "Present Tense",
                "Adjectives and Opposites",
                "Asking Simple Questions",
            ],
            Level::Intermediate => &[
                "Past and Future Tenses",
                "Modal Verbs",
                "Reflexive Verbs",
                "Conditional Sentences",
                "Reported Speech",
            ],
            Level::Advanced => &[
                "Subjunctive Mood",
                "Passive Voice",
                "Idiomatic Expressions",
                "Cleft Sentences",
                "Ellipsis and Substitution",
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    #[serde(rename = "type")]
    pub kind: ExerciseKind,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(rename = "correctAnswer")]
    pub correct_answer: String,
    pub explanation: String,
}

impl Exercise {
    /// Grade an answer locally. Comparison ignores case and surrounding
    /// whitespace so "soy" and " Soy " both pass.
    pub fn check(&self, answer: &str) -> bool {
        answer.trim().eq_ignore_ascii_case(self.correct_answer.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSet {
    pub exercises: Vec<Exercise>,
}

/// The schema advertised for exercise generation. Stable for a given build so
/// it can be cached and compared in tests.
pub fn exercise_set_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "exercises": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "type": {
                            "type": "string",
                            "enum": ["single_choice", "multiple_choice", "fill_in_the_blank", "matching"]
                        },
                        "question": {"type": "string"},
                        "options": {
                            "type": "array",
                            "items": {"type": "string"}
                        },
                        "correctAnswer": {"type": "string"},
                        "explanation": {"type": "string"}
                    },
                    "required": ["type", "question", "correctAnswer", "explanation"]
                }
            }
        },
        "required": ["exercises"]
    })
}

/// Build the generation prompt for a set of exercises
pub fn exercise_prompt(language: &str, level: Level, theme: &str, count: usize) -> String {
    formatdoc! {"
        You are an expert language exercise creator for {language}.
        Design engaging exercises suitable for {level} learners.

        Create {count} DIFFERENT exercises about the theme '{theme}'.
        Each exercise must have:
        - a question, with its English translation in brackets on the next line
        - a list of at least 4 answer options where the type calls for options
        - the correct answer
        - an explanation in English

        Respond with a single JSON object of the form:
        {{\"exercises\": [{{\"type\": \"single_choice\", \"question\": \"...\",
        \"options\": [\"...\"], \"correctAnswer\": \"...\", \"explanation\": \"...\"}}]}}

        Allowed type values: single_choice, multiple_choice, fill_in_the_blank, matching.
        Only include the JSON, no additional text.
    "}
}
