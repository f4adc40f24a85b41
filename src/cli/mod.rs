//! Command-line interface parsing and handling
//!
//! This module parses arguments, sets up logging for the chosen surface and
//! dispatches to the interactive chat or one of the plain subcommands.

pub mod model_list;
pub mod prompt_list;
pub mod say;
pub mod settings;


use std::error::Error;

use clap::{Parser, Subcommand};

use crate::cli::model_list::list_models;
use crate::cli::prompt_list::list_prompts;
use crate::cli::say::run_say;
use crate::cli::settings::{print_settings, set_setting, unset_setting};
use crate::core::config::{Config, SettingsStore};
use crate::ui::chat_loop::{run_chat, ChatOptions};
use crate::utils::logging::{init_logging, LogSurface};

#[derive(Parser)]
#[command(name = "chatstream", version)]
#[command(about = "A terminal chat client that streams replies and renders them as markdown")]
#[command(
    long_about = "chatstream is a full-screen terminal client for a chat backend. Replies stream \
in as they are generated and are rendered as markdown; token usage reported by the backend \
is totalled per session.\n\n\
Controls:\n\
  Enter             Send the message\n\
  Alt+Enter         Insert a newline\n\
  PageUp/PageDown   Scroll the transcript\n\
  F2                Choose model and system prompt\n\
  Ctrl+L            Clear the conversation\n\
  Ctrl+C            Quit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Base URL of the chat backend
    #[arg(short = 's', long, global = true, env = "CHATSTREAM_SERVER", value_name = "URL")]
    pub server: Option<String>,

    /// Model to chat with for this run
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Prompt id to use as the system prompt for this run
    #[arg(short = 'p', long, global = true, value_name = "PROMPT")]
    pub prompt: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Start the chat interface (default)
    Chat,
    /// List the models offered by the backend
    Models {
        /// Only list models that cost nothing to use
        #[arg(long)]
        free: bool,
    },
    /// List available system prompts
    Prompts,
    /// Send one message and stream the reply to stdout
    Say {
        /// Message text; multiple words are joined with spaces
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Set a configuration value
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set; multiple words are joined with spaces
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Restore a configuration value to its default
    Unset {
        /// Configuration key to unset
        key: String,
    },
    /// Show the effective configuration
    Config,
}

impl Args {
    /// Command-line flags win over saved settings.
    pub fn chat_options(&self, config: &Config) -> ChatOptions {
        let mut options = ChatOptions::from_config(config);
        if let Some(server) = self.server.as_ref().filter(|s| !s.trim().is_empty()) {
            options.server_url = server.trim().to_string();
        }
        if let Some(model) = &self.model {
            options.model = model.clone();
        }
        if let Some(prompt) = &self.prompt {
            options.prompt = Some(prompt.clone());
        }
        options
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    tokio::runtime::Runtime::new()?.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let store = SettingsStore::open_default()?;
    let config = store.load()?;
    let command = args.command.clone().unwrap_or(Commands::Chat);

    let surface = match command {
        Commands::Chat => LogSurface::Interactive,
        _ => LogSurface::Plain,
    };
    if let Err(err) = init_logging(&config.logging, surface) {
        eprintln!("⚠️  Logging disabled: {err}");
    }

    let options = args.chat_options(&config);
    match command {
        Commands::Chat => run_chat(options, config, store).await,
        Commands::Models { free } => list_models(&options.server_url, free).await,
        Commands::Prompts => {
            list_prompts(&config, &options.server_url, options.prompt.as_deref()).await
        }
        Commands::Say { text } => {
            let reply = run_say(&text.join(" "), &options, &config).await;
            if let Err(err) = reply {
                eprintln!("❌ {err}");
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Set { key, value } => set_setting(&store, &key, &value.join(" ")),
        Commands::Unset { key } => unset_setting(&store, &key),
        Commands::Config => print_settings(&store),
    }
}
