//! Command-line interface parsing and dispatch.

pub mod model_list;

use std::error::Error;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::core::config::Config;
use crate::core::settings::GenerationSettings;
use crate::core::workspace::Workspace;
use crate::server::backend::OpenAiCompatBackend;
use crate::server::bot::UserAgentBotDetector;
use crate::server::AppState;
use crate::ui::chat_loop::{run_chat, ChatLoopOptions};
use crate::ui::render::RenderConfig;
use crate::ui::theme::Theme;
use crate::utils::logging::TranscriptLog;

#[derive(Parser)]
#[command(name = "chorus")]
#[command(about = "Side-by-side streaming chat with multiple AI models")]
#[command(
    long_about = "Chorus opens one chat panel per selected model and streams their \
answers side by side. A shared input box sends the same prompt everywhere; \
unlink it to talk to panels individually.\n\n\
Controls:\n\
  Type              Enter your message in the input field\n\
  Enter             Send to the focused panel\n\
  Ctrl+B            Send to all panels (linked mode)\n\
  Tab / Shift+Tab   Move focus between panels\n\
  Ctrl+L            Link/unlink the input box\n\
  Ctrl+N / Ctrl+X   Add the next catalog model / remove the focused panel\n\
  Ctrl+R            Expand/collapse reasoning traces\n\
  Ctrl+Up/Down      Raise/lower the sampling temperature\n\
  Up/Down           Scroll the focused panel\n\
  Ctrl+C            Quit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model id to open a panel for (repeatable)
    #[arg(short = 'm', long = "model", value_name = "MODEL")]
    pub models: Vec<String>,

    /// Give each panel its own input box instead of one shared box
    #[arg(long)]
    pub unlinked: bool,

    /// Relay endpoint base URL the panels post to
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Append finished turns to this transcript log file
    #[arg(short = 'l', long = "log", value_name = "FILE")]
    pub log_file: Option<String>,

    /// Show reasoning traces expanded instead of collapsed
    #[arg(long)]
    pub expand_reasoning: bool,

    /// System prompt shared by every panel
    #[arg(long, value_name = "PROMPT")]
    pub system: Option<String>,

    /// Sampling temperature (0..=1)
    #[arg(short = 't', long, value_name = "TEMP")]
    pub temperature: Option<f64>,

    /// Cap on response length, in tokens
    #[arg(long, value_name = "TOKENS")]
    pub max_output_tokens: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the relay endpoint that panels (and anything else) post chats to
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:3000")]
        bind: String,
        /// Base URL of the OpenAI-compatible provider API
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
        /// Environment variable holding the provider API key
        #[arg(long, value_name = "VAR")]
        api_key_env: Option<String>,
    },
    /// List the model catalog
    Models,
}

pub async fn run() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load()?;

    match args.command {
        Some(Commands::Models) => {
            model_list::list_models();
            Ok(())
        }
        Some(Commands::Serve {
            bind,
            base_url,
            api_key_env,
        }) => serve(&config, &bind, base_url, api_key_env).await,
        None => chat(&config, args).await,
    }
}

async fn serve(
    config: &Config,
    bind: &str,
    base_url: Option<String>,
    api_key_env: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let base_url = base_url.unwrap_or_else(|| config.provider_base_url());
    let api_key_env = api_key_env.unwrap_or_else(|| config.api_key_env());
    let api_key = std::env::var(&api_key_env).map_err(|_| {
        format!(
            "❌ No API key found: the {api_key_env} environment variable is not set\n\n\
             export {api_key_env}=\"your-api-key-here\""
        )
    })?;

    let state = AppState {
        backend: Arc::new(OpenAiCompatBackend::new(
            reqwest::Client::new(),
            base_url,
            api_key,
        )),
        bots: Arc::new(UserAgentBotDetector),
    };
    crate::server::serve(bind, state).await
}

async fn chat(config: &Config, args: Args) -> Result<(), Box<dyn Error>> {
    let models = if !args.models.is_empty() {
        args.models.clone()
    } else {
        config.default_models.clone()
    };
    let linked = if args.unlinked {
        false
    } else {
        config.linked_inputs_or_default()
    };

    let mut settings = GenerationSettings::default();
    if let Some(prompt) = args.system {
        settings.system_prompt = prompt;
    }
    if let Some(temperature) = args.temperature {
        settings.temperature = temperature.clamp(0.0, 1.0);
    }
    if args.max_output_tokens.is_some() {
        settings.max_output_tokens = args.max_output_tokens;
    }

    let workspace = Workspace::new(&models, linked, settings)?;
    let theme = Theme::named(config.theme.as_deref().unwrap_or("dark"));
    let render = RenderConfig {
        markdown: config.markdown.unwrap_or(true),
        syntax: config.syntax.unwrap_or(true),
        expand_reasoning: args.expand_reasoning,
    };
    let log = TranscriptLog::new(args.log_file.clone())?;

    run_chat(
        workspace,
        ChatLoopOptions {
            endpoint: args.endpoint.unwrap_or_else(|| config.endpoint_or_default()),
            theme,
            render,
            log,
        },
    )
    .await
}
