use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use parley_core::{
    AiService, AiServices, ChatMemory, ToolRegistry, config, memory, providers, tools,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod onboard;

const CLI_MEMORY_ID: &str = "cli";

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "parley - streaming chat with memory and tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive setup of provider, API key and model
    Onboard,
    /// Chat with the assistant, one message or an interactive session
    Chat {
        #[arg(short, long)]
        message: Option<String>,
        /// Do not remember earlier turns
        #[arg(long)]
        no_memory: bool,
    },
    /// Forget the saved conversation
    Reset,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let command = cli.command.unwrap_or_else(|| {
        if !config::config_exists() {
            Commands::Onboard
        } else {
            Commands::Chat {
                message: None,
                no_memory: false,
            }
        }
    });

    match command {
        Commands::Onboard => {
            let onboard_config = onboard::run_onboard().map_err(|e| {
                eprintln!("{} Onboarding failed: {}", style("✗").red(), e);
                anyhow::anyhow!("Onboarding failed: {}", e)
            })?;
            config::ensure_parley_dir()?;
            finish_onboarding(&onboard_config, &config::get_config_path())?;
        }
        Commands::Chat { message, no_memory } => {
            let mut config = config::Config::load_or_init()?;
            if no_memory {
                config.memory.enabled = false;
            }
            run_chat(&config, message).await?;
        }
        Commands::Reset => {
            let config = config::Config::load_or_init()?;
            if reset_conversation(&config)? {
                println!("{} Conversation cleared", style("✓").green());
            } else {
                println!(
                    "{} Nothing to clear: conversations are not saved (memory.persist = false)",
                    style("•").dim()
                );
            }
        }
    }

    Ok(())
}

fn finish_onboarding(config: &config::Config, config_path: &Path) -> Result<()> {
    config::save_config_to(config, config_path)?;
    onboard::print_saved(config_path);
    Ok(())
}

/// Deletes the saved CLI conversation. Returns `false` when conversations
/// are kept in process memory only, so there is nothing on disk to clear.
fn reset_conversation(config: &config::Config) -> Result<bool> {
    if !config.memory.persist {
        return Ok(false);
    }

    let mut config = config.clone();
    config.memory.enabled = true;
    match memory::create_memory(&config, CLI_MEMORY_ID)? {
        Some(memory) => {
            memory.clear()?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn build_assistant(config: &config::Config) -> Result<(AiService, Option<Arc<dyn ChatMemory>>)> {
    if config.memory.persist {
        std::fs::create_dir_all(&config.workspace_dir).with_context(|| {
            format!(
                "Could not create workspace at {}",
                config.workspace_dir.display()
            )
        })?;
    }

    let provider = providers::create_provider(config)?;
    let chat_memory = memory::create_memory(config, CLI_MEMORY_ID)?;

    let tool_registry = Arc::new(ToolRegistry::new());
    tool_registry.register(Arc::new(tools::SquareRootTool));

    let mut builder = AiServices::builder()
        .streaming_model(provider)
        .tools(tool_registry)
        .max_tool_rounds(config.max_tool_rounds);
    if let Some(memory) = &chat_memory {
        builder = builder.chat_memory(memory.clone());
    }
    if let Some(system_message) = &config.system_message {
        builder = builder.system_message(system_message.clone());
    }

    Ok((builder.build()?, chat_memory))
}

async fn ask(assistant: &AiService, streaming: bool, message: &str) -> Result<()> {
    if streaming {
        assistant
            .chat(message)
            .on_next(|token| {
                print!("{}", token);
                let _ = std::io::stdout().flush();
            })
            .collect()
            .await?;
        println!();
    } else {
        println!("{}", assistant.chat_blocking(message).await?);
    }
    Ok(())
}

async fn run_chat(config: &config::Config, message: Option<String>) -> Result<()> {
    let (assistant, chat_memory) = build_assistant(config)?;
    let streaming = config.stream.enabled;

    if let Some(msg) = message {
        if let Err(e) = ask(&assistant, streaming, &msg).await {
            eprintln!("{} Error: {:#}", style("✗").red(), e);
            anyhow::bail!("Chat failed: {}", e);
        }
        return Ok(());
    }

    println!("{}", style("parley").cyan().bold());
    println!("Type your message (/clear to forget, Ctrl+D to exit)\n");

    let mut editor = DefaultEditor::new().context("Failed to start line editor")?;
    let history_path = config::get_parley_dir().join("history.txt");
    let _ = editor.load_history(&history_path);

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(input);

                if input == "/clear" {
                    if let Some(memory) = &chat_memory {
                        memory.clear()?;
                    }
                    println!("{} Conversation cleared\n", style("✓").green());
                    continue;
                }

                if let Err(e) = ask(&assistant, streaming, input).await {
                    eprintln!("{} Error: {:#}", style("✗").red(), e);
                }
                println!();
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Line editor failed");
                break;
            }
        }
    }

    if config::ensure_parley_dir().is_ok() {
        let _ = editor.save_history(&history_path);
    }

    Ok(())
}
