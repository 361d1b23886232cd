use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use voice_dispatch::commands::{self, PatternRegistry};
use voice_dispatch::{
    CommandHandler, CommandService, Config, HandlerError, HandlerReply, InitOptions,
    PendingConfirmation, ProcessOptions, ResourceMode, ShutdownOptions, publish_mode,
    resource_channel,
};

/// voxd - Voice command interpretation and dispatch shell
#[derive(Parser)]
#[command(name = "voxd", version, about)]
struct Cli {
    /// Path to config file (default: ~/.config/voice-dispatch/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Allow commands without a security validator (development only)
    #[arg(long)]
    insecure_dev_mode: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Read utterances from stdin and dispatch them
    Run,
    /// Show which pattern an utterance matches, without running it
    Match {
        /// Utterance text
        text: String,
        /// Context to match in
        #[arg(long)]
        context: Option<String>,
    },
    /// List configured command patterns
    Patterns,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,voice_dispatch=info",
        1 => "info,voice_dispatch=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if cli.insecure_dev_mode {
        config.security.insecure_dev_mode = true;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_shell(config).await,
        Command::Match { text, context } => cmd_match(&config, &text, context.as_deref()),
        Command::Patterns => cmd_patterns(&config),
    }
}

/// Handler used by the shell for every configured handler name
///
/// The shell has no real actions to run, so it reports what would be run.
struct ShellHandler {
    name: String,
}

#[async_trait]
impl CommandHandler for ShellHandler {
    async fn handle(&self, params: &[String], context: &str) -> Result<HandlerReply, HandlerError> {
        let summary = if params.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, params.join(", "))
        };
        Ok(HandlerReply::ok(&format!("{summary} [{context}]")).with_announce(&summary))
    }
}

async fn run_shell(config: Config) -> anyhow::Result<()> {
    let (resource_tx, resource_rx) = resource_channel();

    let mut options = InitOptions::new().resource_signal(resource_rx);
    for entry in &config.patterns {
        let name = entry.config.handler.trim().to_string();
        options = options.handler(&name, Arc::new(ShellHandler { name: name.clone() }));
    }

    let service = CommandService::new(config);
    let init = service.initialize(options)?;
    tracing::info!(patterns = init.patterns, "shell ready");

    let mut events = service.subscribe();
    let event_printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::debug!(event_type = event.kind.as_str(), data = %event.data, "event");
        }
    });

    let mut pending: Option<PendingConfirmation> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(meta) = line.strip_prefix(':') {
            let mut parts = meta.splitn(2, ' ');
            let verb = parts.next().unwrap_or_default();
            let arg = parts.next().map(str::trim).unwrap_or_default();

            match verb {
                "quit" | "q" => break,
                "mode" => match ResourceMode::parse(arg) {
                    Some(mode) => {
                        if publish_mode(&resource_tx, mode) {
                            println!("resource mode: {mode}");
                        }
                    }
                    None => println!("usage: :mode normal|minimal|critical"),
                },
                "context" => {
                    if !arg.is_empty() {
                        service.set_command_context(arg);
                    }
                    println!("context: {}", service.command_context());
                }
                "history" => {
                    let limit = arg.parse().unwrap_or(10);
                    for record in service.command_history(limit) {
                        println!(
                            "{}  [{}]  {}",
                            record.timestamp.to_rfc3339(),
                            record.context,
                            record.text
                        );
                    }
                }
                "stats" => {
                    let metrics = service.metrics();
                    println!("{}", serde_json::to_string_pretty(&metrics)?);
                    println!("success rate: {:.1}%", metrics.success_rate() * 100.0);
                }
                "patterns" => {
                    for pattern in service.registered_patterns() {
                        println!(
                            "{:<32} -> {} ({}, {})",
                            pattern.pattern, pattern.handler, pattern.category, pattern.importance
                        );
                    }
                }
                "confirm" => match pending.take() {
                    Some(p) => {
                        let result = service.confirm(&p).await?;
                        println!("{}", serde_json::to_string(&result)?);
                    }
                    None => println!("nothing to confirm"),
                },
                _ => println!("commands: :mode :context :history :stats :patterns :confirm :quit"),
            }
            continue;
        }

        let result = service.process_command(line, ProcessOptions::default()).await?;
        pending.clone_from(&result.pending);
        println!("{}", serde_json::to_string(&result)?);
    }

    let summary = service.shutdown(ShutdownOptions::default());
    event_printer.abort();
    println!(
        "processed {} commands ({} succeeded, {} failed)",
        summary.metrics.total_commands, summary.metrics.succeeded, summary.metrics.failed
    );

    Ok(())
}

fn build_registry(config: &Config) -> anyhow::Result<PatternRegistry> {
    let mut registry = PatternRegistry::new();
    for entry in &config.patterns {
        registry.register(&entry.pattern, entry.config.clone())?;
    }
    Ok(registry)
}

fn cmd_match(config: &Config, text: &str, context: Option<&str>) -> anyhow::Result<()> {
    let registry = build_registry(config)?;
    let context = context.map_or_else(|| config.default_context.clone(), commands::normalize);

    match commands::match_command(&registry, &commands::normalize(text), &context) {
        Some(m) => {
            println!("pattern:    {}", m.pattern.pattern);
            println!("handler:    {}", m.pattern.handler);
            println!("category:   {}", m.pattern.category);
            println!("importance: {}", m.pattern.importance);
            println!("params:     {:?}", m.params);
        }
        None => println!("no pattern matches {text:?} in context {context:?}"),
    }
    Ok(())
}

fn cmd_patterns(config: &Config) -> anyhow::Result<()> {
    let registry = build_registry(config)?;
    if registry.is_empty() {
        println!("no patterns configured");
        return Ok(());
    }

    for pattern in registry.patterns() {
        let contexts = if pattern.contexts.is_empty() {
            "any".to_string()
        } else {
            pattern.contexts.iter().cloned().collect::<Vec<_>>().join(",")
        };
        println!(
            "{:<32} -> {:<20} {:<16} {:<9} confirm={} contexts={}",
            pattern.pattern,
            pattern.handler.as_str(),
            pattern.category.as_str(),
            pattern.importance.as_str(),
            pattern.requires_confirmation,
            contexts
        );
    }
    Ok(())
}
