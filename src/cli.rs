use anyhow::{Context as _, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strum::IntoEnumIterator;

use crate::completion::{CompletionClient, OpenAiClient, RetryingClient, ScriptedClient};
use crate::config::Config;
use crate::event::{Event, UserProfile};
use crate::growth::GrowthAdvisor;
use crate::pipeline::Pipeline;
use crate::prompt::{PromptName, PromptRegistry};
use crate::store::{ContextStore, InMemoryStore, OutcomeStore};

/// `nudge` - personalization pipeline for store events.
#[derive(Parser, Debug)]
#[command(name = "nudge")]
#[command(version = "0.1.0")]
#[command(about = "Decides, drafts and quality-checks personalized outreach.", long_about = None)]
pub struct Cli {
    /// Path to a TOML config file (built-in defaults apply when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one behavioral event through the pipeline
    Process {
        /// JSON file holding the event
        #[arg(short, long)]
        event: PathBuf,

        /// JSON user profile to seed the context store
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Use canned replies instead of the completion API
        #[arg(long)]
        offline: bool,
    },

    /// Inspect the prompt templates
    Prompts {
        #[command(subcommand)]
        prompt_command: PromptCommands,
    },

    /// Analyze a customer profile for growth opportunities
    Growth {
        /// JSON file holding the user profile
        #[arg(short, long)]
        profile: PathBuf,

        /// Use canned replies instead of the completion API
        #[arg(long)]
        offline: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum PromptCommands {
    /// List the registered templates and their versions
    List,

    /// Print one template body
    Show {
        /// Template name (decision_agent, text_generator, quality_checker)
        name: String,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Process {
            event,
            profile,
            offline,
        } => process(&config, &event, profile.as_deref(), offline).await,
        Commands::Prompts { prompt_command } => prompts(&prompt_command),
        Commands::Growth { profile, offline } => growth(&config, &profile, offline).await,
    }
}

async fn process(
    config: &Config,
    event_path: &Path,
    profile_path: Option<&Path>,
    offline: bool,
) -> Result<()> {
    let event: Event = read_json(event_path)?;
    let store = Arc::new(InMemoryStore::new());
    if let Some(path) = profile_path {
        let profile: UserProfile = read_json(path)?;
        store.seed_profile(profile);
    }

    let pipeline = Pipeline::new(
        build_client(config, offline),
        PromptRegistry::with_defaults(),
        Arc::clone(&store) as Arc<dyn ContextStore>,
        store as Arc<dyn OutcomeStore>,
        config,
    );
    let outcome = pipeline
        .process(&event)
        .await
        .context("persisting the outcome")?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn prompts(command: &PromptCommands) -> Result<()> {
    let registry = PromptRegistry::with_defaults();
    match command {
        PromptCommands::List => {
            for name in PromptName::iter() {
                println!("{name}  v{}", registry.get(name).version);
            }
        }
        PromptCommands::Show { name } => {
            let parsed = name.parse::<PromptName>().map_err(|_| {
                anyhow!(
                    "unknown template `{name}`, expected one of: {}",
                    PromptName::iter()
                        .map(|n| n.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })?;
            print!("{}", registry.get(parsed).body);
        }
    }
    Ok(())
}

async fn growth(config: &Config, profile_path: &Path, offline: bool) -> Result<()> {
    let profile: UserProfile = read_json(profile_path)?;
    let advisor = GrowthAdvisor::new(build_client(config, offline), &config.llm);
    let opportunities = advisor
        .analyze(&profile)
        .await
        .context("analyzing growth opportunities")?;
    println!("{}", serde_json::to_string_pretty(&opportunities)?);
    Ok(())
}

fn build_client(config: &Config, offline: bool) -> Arc<dyn CompletionClient> {
    match (&config.llm.api_key, offline) {
        (Some(key), false) => Arc::new(RetryingClient::new(
            OpenAiClient::new(&config.llm.api_base, key, config.llm.request_timeout_secs),
            config.llm.retry.clone(),
        )),
        (None, false) => {
            tracing::warn!("no API key configured, using canned offline replies");
            Arc::new(ScriptedClient::offline_demo())
        }
        (_, true) => Arc::new(ScriptedClient::offline_demo()),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
