//! Modulus CLI

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use modulus_chat::{ChatEvent, ChatProvider, ChatRequest};
use modulus_console_logging::ConsoleLoggingProvider;
use modulus_runtime::prelude::Event;
use modulus_runtime::{Host, HostConfig, LogFormat, ModuleInfo};
use modulus_settings::SettingsProvider;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_CONFIG: &str = "modulus.yaml";

#[derive(Parser)]
#[command(name = "modulus")]
#[command(about = "Modulus component host", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file (YAML, TOML or JSON)
    #[arg(short, long, global = true, env = "MODULUS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level or filter directive, overrides the configuration
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the chat module over stdin
    Chat,

    /// List registered modules
    Modules {
        /// Load the configured modules before listing
        #[arg(long)]
        load: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List known event kinds
    Events {
        /// Print JSON instead of a list
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file (defaults to modulus.yaml)
    Validate,

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Chat => {
            let config = load_config(cli.config.as_deref())?;
            init_tracing(cli.log_level.as_deref(), &config)?;
            chat(build_host(config)?).await
        }

        Commands::Modules { load, json } => {
            let config = load_config(cli.config.as_deref())?;
            init_tracing(cli.log_level.as_deref(), &config)?;

            let host = build_host(config)?;
            if load {
                host.modules().autoload().await?;
            }

            let infos = host.modules().infos();
            if json {
                println!("{}", serde_json::to_string_pretty(&infos)?);
            } else {
                print_modules(&infos);
            }

            host.shutdown().await?;
            Ok(())
        }

        Commands::Events { json } => {
            let config = load_config(cli.config.as_deref())?;
            init_tracing(cli.log_level.as_deref(), &config)?;

            let host = build_host(config)?;
            let kinds = host.events().kinds();
            if json {
                println!("{}", serde_json::to_string_pretty(&kinds)?);
            } else {
                for kind in kinds {
                    println!("{:<24} {}", kind.name, kind.type_name);
                }
            }
            Ok(())
        }

        Commands::Validate => {
            let config = cli.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
            tracing_subscriber::fmt().with_target(false).init();

            tracing::info!("Validating configuration: {}", config.display());

            match HostConfig::load_from_file(&config) {
                Ok(cfg) => {
                    tracing::info!("✓ Configuration is valid");
                    tracing::info!(
                        "  Application: {}",
                        cfg.application_name.as_deref().unwrap_or("<default>")
                    );
                    tracing::info!("  Unload grace: {:?}", cfg.unload_grace);
                    match &cfg.autoload {
                        Some(modules) => tracing::info!("  Autoload: {} module(s)", modules.len()),
                        None => tracing::info!("  Autoload: all modules"),
                    }
                    tracing::info!("  Settings: {} module(s)", cfg.settings.len());
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("✗ Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }

        Commands::Version => {
            println!("Modulus component host");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<HostConfig> {
    match path {
        Some(path) => HostConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(HostConfig::default()),
    }
}

fn build_host(config: HostConfig) -> Result<Host> {
    let settings = SettingsProvider::new(config.settings.clone());

    let host = Host::builder()
        .config(config)
        .provider(ConsoleLoggingProvider::default())
        .provider(settings)
        .provider(ChatProvider)
        .event::<ChatEvent>()
        .build()?;

    Ok(host)
}

async fn chat(host: Host) -> Result<()> {
    let loaded = host.modules().autoload().await?;
    tracing::info!(modules = ?loaded, "Modules loaded");

    println!("...");
    println!("Hello! I'm a chatbot, {}", modulus_chat::opener());
    println!("...");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if matches!(line, "exit" | "quit") {
            break;
        }

        let mut event = ChatEvent::request(line);
        if !host.can_handle(&event) {
            println!("(no module can answer)");
            continue;
        }

        host.handle(&mut event).await;
        match event.output.as_ref() {
            Some(output) if event.handled() => println!("{}", output.response),
            _ => println!("(no answer)"),
        }
    }

    let unloaded = host.shutdown().await?;
    tracing::info!(modules = ?unloaded, "Modules unloaded");
    Ok(())
}

fn print_modules(infos: &[ModuleInfo]) {
    println!(
        "{:<18} {:<9} {:<12} {:>10} {:>8} {:>10}  DEPENDENCIES",
        "NAME", "VERSION", "STATE", "LOAD_FIRST", "LOAD_PRI", "HANDLE_PRI"
    );
    for info in infos {
        let descriptor = &info.descriptor;
        let dependencies = descriptor
            .dependencies
            .iter()
            .map(|name| name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        println!(
            "{:<18} {:<9} {:<12} {:>10} {:>8} {:>10}  {}",
            descriptor.name.as_str(),
            descriptor.version.to_string(),
            info.state.to_string(),
            descriptor.load_first,
            descriptor.load_priority,
            descriptor.handle_priority,
            if dependencies.is_empty() { "-" } else { dependencies.as_str() }
        );
    }
}

fn init_tracing(level: Option<&str>, config: &HostConfig) -> Result<()> {
    let directive = level.unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_new(directive)
        .with_context(|| format!("Invalid log filter '{directive}'"))?;

    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_modules_flags() {
        let cli = Cli::parse_from(["modulus", "modules", "--json", "--config", "host.yaml"]);
        assert_eq!(cli.config, Some(PathBuf::from("host.yaml")));
        assert!(matches!(
            cli.command,
            Commands::Modules {
                load: false,
                json: true
            }
        ));
    }

    #[tokio::test]
    async fn test_build_host_registers_modules_and_events() {
        let host = build_host(HostConfig::default()).unwrap();

        let names: Vec<String> = host
            .modules()
            .names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        assert_eq!(names, vec!["console-logging", "settings", "chat"]);
        assert!(host.events().contains("chat.message"));

        host.modules().load(None).await.unwrap();
        let mut event = ChatEvent::request("hello");
        host.handle(&mut event).await;
        assert!(event.handled());

        host.shutdown().await.unwrap();
    }
}
