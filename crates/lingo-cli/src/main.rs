mod tutors;

use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use bat::PrettyPrinter;
use clap::Parser;
use cliclack::{input, spinner};
use console::style;
use dotenv::dotenv;
use rand::seq::SliceRandom;

use lingo::exercise::{exercise_prompt, exercise_set_schema, ExerciseSet, Level};
use lingo::generate::{generate_structured, Generated, ProviderGenerator, DEFAULT_MAX_ATTEMPTS};
use lingo::providers::configs::{
    OllamaProviderConfig, OpenAiProviderConfig, ProviderConfig, DEFAULT_OPENAI_HOST,
};
use lingo::providers::factory::get_provider;
use lingo::session::Session;

use tutors::{conversation_agent, SharedLearnerProfile, EXERCISE_AGENT};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Provider option (openai or ollama)
    #[arg(short, long, default_value = "open-ai")]
    #[arg(value_enum)]
    provider: ProviderVariant,

    /// OpenAI API key (can also be set via OPENAI_API_KEY environment variable)
    #[arg(long)]
    api_key: Option<String>,

    /// Override the provider host
    #[arg(long)]
    host: Option<String>,

    /// Model to use
    #[arg(short, long, default_value = "gpt-4o-mini")]
    model: String,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ProviderVariant {
    OpenAi,
    Ollama,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let provider = get_provider(provider_config(&cli)?)?;

    let learner = SharedLearnerProfile::default();
    let conversation = conversation_agent(&cli.model, learner.clone())?;
    let mut session = Session::new(provider, conversation);

    println!(
        "lingo language tutor {}",
        style("- type \"exit\" to end the session").dim()
    );
    println!();

    loop {
        let message_text: String = input("You:").placeholder("").interact()?;

        if message_text.trim().eq_ignore_ascii_case("exit") {
            break;
        }

        let spin = spinner();
        spin.start("thinking");

        match session.turn(&message_text).await {
            Ok(outcome) => {
                spin.stop("");
                render(&outcome.reply).await;

                if outcome.handoff.as_deref() == Some(EXERCISE_AGENT) {
                    run_exercise_round(&session, &learner, &cli.model).await?;
                }
            }
            Err(error) => {
                spin.stop("");
                println!(
                    "{}",
                    style(format!("The tutor is unreachable right now: {}", error)).red()
                );
            }
        }

        println!();
    }
    Ok(())
}

fn provider_config(cli: &Cli) -> Result<ProviderConfig> {
    match cli.provider {
        ProviderVariant::OpenAi => {
            let api_key = cli
                .api_key
                .clone()
                .or_else(|| env::var("OPENAI_API_KEY").ok())
                .context(
                    "API key must be provided via --api-key or OPENAI_API_KEY environment variable",
                )?;
            let host = cli
                .host
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_HOST.to_string());
            Ok(ProviderConfig::OpenAi(OpenAiProviderConfig::new(
                host, api_key,
            )))
        }
        ProviderVariant::Ollama => {
            let config = match &cli.host {
                Some(host) => OllamaProviderConfig::new(host.clone()),
                None => OllamaProviderConfig::from_env()?,
            };
            Ok(ProviderConfig::Ollama(config))
        }
    }
}

/// Generate a set of exercises for the current learner, quiz them, and grade
/// the answers locally.
async fn run_exercise_round(
    session: &Session,
    learner: &SharedLearnerProfile,
    model: &str,
) -> Result<()> {
    let profile = learner.lock().unwrap().clone();
    let language = profile
        .target_language
        .unwrap_or_else(|| "French".to_string());
    let level = profile
        .level
        .and_then(|level| Level::from_str(&level).ok())
        .unwrap_or(Level::Beginner);
    let theme = level
        .themes()
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Everyday Conversation");

    let spin = spinner();
    spin.start(format!("preparing {} exercises about {}", level, theme));

    let generator = ProviderGenerator::new(
        session.provider(),
        model,
        "You are an AI language tutor generating language exercises.",
    )
    .with_output_schema(exercise_set_schema())
    .with_temperature(0.9);

    let prompt = exercise_prompt(&language, level, theme, 3);
    let generated: Generated<ExerciseSet> =
        generate_structured(&generator, &prompt, &exercise_set_schema(), DEFAULT_MAX_ATTEMPTS)
            .await;

    spin.stop("");

    let Some(set) = generated.into_value() else {
        println!(
            "{}",
            style("I couldn't put together valid exercises this time, let's keep chatting.")
                .yellow()
        );
        return Ok(());
    };

    let mut score = 0;
    for (number, exercise) in set.exercises.iter().enumerate() {
        println!();
        println!("{}", style(format!("Exercise {}", number + 1)).bold());
        println!("{}", exercise.question);
        for option in &exercise.options {
            println!("  - {}", option);
        }

        let answer: String = input("Answer:").placeholder("").interact()?;
        if exercise.check(&answer) {
            score += 1;
            println!("{}", style("Correct!").green());
        } else {
            println!(
                "{} The answer is '{}'.",
                style("Not quite.").red(),
                exercise.correct_answer
            );
        }
        println!("{}", style(&exercise.explanation).dim());
    }

    println!();
    println!(
        "{}",
        style(format!("Score: {}/{}", score, set.exercises.len())).bold()
    );
    Ok(())
}

async fn render(content: &str) {
    if content.is_empty() {
        return;
    }
    PrettyPrinter::new()
        .input_from_bytes(content.as_bytes())
        .language("markdown")
        .print()
        .unwrap();
    println!();
}
