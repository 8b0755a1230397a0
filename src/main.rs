//! webai-relay - Streaming relay for on-device AI text capabilities
//!
//! Entry point for the relay binary. Wires the persona store, capability
//! registry and background relay together, then drives either the
//! interactive stdin loop or a one-shot command.

mod capability;
mod cli;
mod config;
mod consumer;
mod error;
mod logging;
mod persona;
mod protocol;
mod relay;
mod storage;
mod version;

use std::io::Write as _;
use std::sync::Arc;

use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::capability::{CapabilityFactory, CapabilityKind, CapabilityRegistry};
use crate::cli::{Cli, Commands, ConfigSubcommand, LevelsSubcommand};
use crate::config::RelayConfig;
use crate::consumer::{Debouncer, DisplayState};
use crate::error::{Error, Result};
use crate::persona::PersonaStore;
use crate::protocol::{Message, MessageEnvelope};
use crate::relay::{Relay, RelayHandle};
use crate::storage::JsonStore;

fn main() -> Result<()> {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    // Commands that don't need the full logging stack
    match &cli.command {
        Commands::Version => {
            version::print_version();
            return Ok(());
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            return handle_config_command(subcommand.clone());
        }
        Commands::Levels { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            return handle_levels_command(subcommand.clone());
        }
        _ => {}
    }

    let config_path = match &cli.command {
        Commands::Run { config, .. } => config.clone(),
        Commands::Translate { config, .. } => config.clone(),
        Commands::Detect { config, .. } => config.clone(),
        _ => None,
    };

    let config = match RelayConfig::load(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprint!("{}", e.format_for_terminal());
            std::process::exit(e.exit_code());
        }
    };

    // The guards must be kept alive for the lifetime of the program
    let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    let build = version::build_info();
    info!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        "Starting webai-relay"
    );

    let outcome = match cli.command {
        Commands::Run {
            level,
            selection,
            kind,
            html,
            ..
        } => {
            let kind = kind.parse::<CapabilityKind>().map_err(Error::Config)?;
            run_relay(config, level, selection, kind, html)
        }
        Commands::Translate {
            text,
            source,
            target,
            ..
        } => run_translate(config, text, source, target),
        Commands::Detect { text, .. } => run_detect(config, text),
        Commands::Version | Commands::Config { .. } | Commands::Levels { .. } => {
            // Already handled above
            unreachable!();
        }
    };

    if let Err(e) = outcome {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// Command Entry Points
// ─────────────────────────────────────────────────────────────────

/// Run the relay, interactive or one-shot.
fn run_relay(
    config: RelayConfig,
    start_level: Option<u32>,
    selection: Option<String>,
    kind: CapabilityKind,
    html: bool,
) -> Result<()> {
    info!(
        provider = %config.capability.provider,
        data_dir = %config.storage.data_dir,
        "Configuration loaded"
    );

    ensure_data_dir(&config)?;
    let runtime = build_runtime(&config)?;

    match selection {
        Some(text) => {
            let languages = configured_pair_for(&config, kind);
            let display = runtime.block_on(one_shot_session(
                config,
                start_level,
                kind,
                text,
                languages,
                html,
            ))?;
            finish_one_shot(display)
        }
        None => runtime.block_on(interactive_session(config, start_level, html)),
    }
}

/// Translate one text and exit.
fn run_translate(
    config: RelayConfig,
    text: Option<String>,
    source: Option<String>,
    target: Option<String>,
) -> Result<()> {
    let input = read_input(text)?;
    let source =
        source.unwrap_or_else(|| config.capability.translator.source_language.clone());
    let target =
        target.unwrap_or_else(|| config.capability.translator.target_language.clone());

    ensure_data_dir(&config)?;
    let runtime = build_runtime(&config)?;
    let display = runtime.block_on(one_shot_session(
        config,
        None,
        CapabilityKind::Translator,
        input,
        Some((source, target)),
        false,
    ))?;
    finish_one_shot(display)
}

/// Detect the language of one text and exit.
fn run_detect(config: RelayConfig, text: Option<String>) -> Result<()> {
    let input = read_input(text)?;

    ensure_data_dir(&config)?;
    let runtime = build_runtime(&config)?;
    let display = runtime.block_on(one_shot_session(
        config,
        None,
        CapabilityKind::LanguageDetector,
        input,
        None,
        false,
    ))?;
    finish_one_shot(display)
}

// ─────────────────────────────────────────────────────────────────
// Relay Wiring
// ─────────────────────────────────────────────────────────────────

/// A running relay and the handles to talk to it.
struct RelayParts {
    handle: RelayHandle,
    ui_rx: mpsc::UnboundedReceiver<MessageEnvelope>,
    task: tokio::task::JoinHandle<()>,
    personas: Arc<PersonaStore>,
}

/// Build the storage, persona store and capability registry, then spawn
/// the relay task. Must be called within a runtime.
fn start_relay(config: &RelayConfig) -> Result<RelayParts> {
    let storage = JsonStore::new(config.data_dir());
    let personas = Arc::new(PersonaStore::new(storage));
    let registry = build_registry(config)?;

    let (relay, handle, ui_rx) =
        Relay::new(config.relay_options(), registry, Arc::clone(&personas));
    let task = tokio::spawn(relay.run());

    Ok(RelayParts {
        handle,
        ui_rx,
        task,
        personas,
    })
}

/// Register a capability for every kind from the configured provider.
fn build_registry(config: &RelayConfig) -> Result<Arc<CapabilityRegistry>> {
    let registry = CapabilityRegistry::new();
    let mock = config.mock_config();

    for kind in CapabilityKind::all() {
        let capability = CapabilityFactory::create_with_mock_config(
            &config.capability.provider,
            *kind,
            mock.clone(),
        )?;
        registry.register_arc(*kind, capability);
    }

    Ok(Arc::new(registry))
}

fn build_runtime(config: &RelayConfig) -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(config.runtime.resolved_worker_threads())
        .thread_name("webai-relay")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))
}

/// Ensure the storage directory exists.
fn ensure_data_dir(config: &RelayConfig) -> Result<()> {
    let path = config.data_dir();
    if !path.exists() {
        std::fs::create_dir_all(&path).map_err(|e| Error::IoWrite {
            path: path.clone(),
            source: e,
        })?;
        info!(path = %path.display(), "Created storage directory");
    }
    Ok(())
}

/// Persist a starting level requested on the command line.
fn persist_start_level(personas: &PersonaStore, ordinal: u32) -> Result<()> {
    let level = personas.get(ordinal);
    if level.level != ordinal {
        warn!(
            requested = ordinal,
            using = level.level,
            "Unknown level; falling back to the first table entry"
        );
    }
    personas.save_current(&level)?;
    info!(level = level.level, name = %level.name, "Current level persisted");
    Ok(())
}

/// Configured language pair, for kinds that need one.
fn configured_pair_for(config: &RelayConfig, kind: CapabilityKind) -> Option<(String, String)> {
    if kind == CapabilityKind::Translator {
        let translator = &config.capability.translator;
        Some((
            translator.source_language.clone(),
            translator.target_language.clone(),
        ))
    } else {
        None
    }
}

// ─────────────────────────────────────────────────────────────────
// One-shot Mode
// ─────────────────────────────────────────────────────────────────

/// Run a single session to completion, printing the answer as it streams.
async fn one_shot_session(
    config: RelayConfig,
    start_level: Option<u32>,
    kind: CapabilityKind,
    input: String,
    languages: Option<(String, String)>,
    html: bool,
) -> Result<DisplayState> {
    let RelayParts {
        handle,
        mut ui_rx,
        task,
        personas,
    } = start_relay(&config)?;

    if let Some(ordinal) = start_level {
        persist_start_level(&personas, ordinal)?;
    }

    match languages {
        Some((source, target)) => handle.trigger_translation(input, source, target).await?,
        None => handle.trigger(kind, input).await?,
    }

    let mut display = DisplayState::new();
    while let Some(envelope) = ui_rx.recv().await {
        let applied = print_ui_message(&envelope, &mut display, html);
        if applied
            && matches!(
                envelope.payload,
                Message::StreamComplete | Message::Error { .. }
            )
        {
            break;
        }
    }

    handle.shutdown().await;
    if let Err(e) = task.await {
        warn!(error = %e, "Relay task join failed");
    }

    Ok(display)
}

/// One-shot output was already printed while streaming; all that is left
/// is the exit status.
fn finish_one_shot(display: DisplayState) -> Result<()> {
    if display.failed() {
        std::process::exit(1);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// Interactive Mode
// ─────────────────────────────────────────────────────────────────

enum ConsoleOutcome {
    Continue,
    Quit,
}

/// Read selections from stdin and stream answers until EOF or Ctrl+C.
async fn interactive_session(
    config: RelayConfig,
    start_level: Option<u32>,
    html: bool,
) -> Result<()> {
    let RelayParts {
        handle,
        mut ui_rx,
        task,
        personas,
    } = start_relay(&config)?;

    if let Some(ordinal) = start_level {
        persist_start_level(&personas, ordinal)?;
    }

    let current = personas.load_current();
    println!("webai-relay interactive session");
    println!(
        "Level {} ({}) | provider '{}'",
        current.level, current.name, config.capability.provider
    );
    println!(
        "Type a selection to process it. Commands: :kind <capability>, :level <n>, :levels, :status, :clear, :quit"
    );
    println!();

    let mut display = DisplayState::new();
    let mut debouncer = Debouncer::new(config.ui.trigger_debounce_ms);
    let mut kind = CapabilityKind::Summarizer;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    let shutdown_signal = tokio::signal::ctrl_c();
    tokio::pin!(shutdown_signal);

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Shutdown signal received");
                break;
            }

            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }

                        if let Some(command) = line.strip_prefix(':') {
                            match console_command(command, &handle, &personas, &mut display, &mut kind).await? {
                                ConsoleOutcome::Continue => continue,
                                ConsoleOutcome::Quit => break,
                            }
                        }

                        if !debouncer.allow() {
                            debug!("Trigger dropped by debounce");
                            continue;
                        }

                        trigger_selection(&handle, &config, kind, line.to_string()).await?;
                    }
                    Ok(None) => {
                        info!("Input closed");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read input");
                        break;
                    }
                }
            }

            envelope = ui_rx.recv() => {
                match envelope {
                    Some(envelope) => {
                        print_ui_message(&envelope, &mut display, html);
                    }
                    None => {
                        warn!("UI channel closed");
                        break;
                    }
                }
            }
        }
    }

    handle.shutdown().await;
    if let Err(e) = task.await {
        warn!(error = %e, "Relay task join failed");
    }

    Ok(())
}

/// Handle a `:command` console line.
async fn console_command(
    command: &str,
    handle: &RelayHandle,
    personas: &PersonaStore,
    display: &mut DisplayState,
    kind: &mut CapabilityKind,
) -> Result<ConsoleOutcome> {
    let mut parts = command.split_whitespace();

    match parts.next() {
        Some("quit") | Some("q") | Some("exit") => return Ok(ConsoleOutcome::Quit),

        Some("clear") => {
            display.clear();
            println!("(display cleared)");
        }

        Some("levels") => {
            for level in personas.list() {
                println!("  {}. {} - {}", level.level, level.name, level.description);
            }
        }

        Some("level") => match parts.next().and_then(|v| v.parse::<u32>().ok()) {
            Some(ordinal) => {
                let level = personas.get(ordinal);
                if level.level != ordinal {
                    println!(
                        "Unknown level {}; using {} ({})",
                        ordinal, level.level, level.name
                    );
                }
                let envelope =
                    MessageEnvelope::new(level.level, Message::SetLevel { level: level.clone() });
                handle.deliver(envelope).await?;
                println!("Level set to {} ({})", level.level, level.name);
            }
            None => println!("Usage: :level <n>"),
        },

        Some("kind") => match parts.next() {
            Some(value) => match value.parse::<CapabilityKind>() {
                Ok(parsed) => {
                    *kind = parsed;
                    println!("Capability set to {}", parsed);
                }
                Err(e) => println!("{}", e),
            },
            None => println!("Current capability: {}", kind),
        },

        Some("status") => {
            let status = handle.status().await?;
            println!(
                "Phase: {:?} | completed {} failed {} cancelled {}",
                status.phase, status.completed, status.failed, status.cancelled
            );
        }

        Some(other) => println!("Unknown command ':{}'", other),
        None => {}
    }

    Ok(ConsoleOutcome::Continue)
}

/// Send a selection to the relay under the active capability.
async fn trigger_selection(
    handle: &RelayHandle,
    config: &RelayConfig,
    kind: CapabilityKind,
    input: String,
) -> Result<()> {
    match configured_pair_for(config, kind) {
        Some((source, target)) => handle.trigger_translation(input, source, target).await,
        None => handle.trigger(kind, input).await,
    }
}

// ─────────────────────────────────────────────────────────────────
// UI Output
// ─────────────────────────────────────────────────────────────────

/// Apply an envelope to the display and echo it to the terminal.
///
/// Returns whether the display accepted the message; stale traffic from
/// superseded sessions is discarded silently.
fn print_ui_message(envelope: &MessageEnvelope, display: &mut DisplayState, html: bool) -> bool {
    if !display.apply(envelope) {
        return false;
    }

    match &envelope.payload {
        Message::StreamResponse { text, is_first } => {
            if *is_first {
                println!();
            } else if !text.is_empty() {
                print!("{}", text);
                let _ = std::io::stdout().flush();
            }
        }
        Message::StreamComplete => {
            println!();
            if html {
                println!("{}", display.rendered());
            }
        }
        Message::Error { code, message } => {
            println!();
            eprintln!("[{}] {}", code, message);
        }
        Message::AiInitiate { .. } => {
            if let Some(progress) = display.download() {
                print!("\rDownloading model... {:.0}%", progress.percent());
                let _ = std::io::stdout().flush();
            }
        }
        Message::AiReady => {
            println!("\rModel ready                   ");
        }
        Message::SetLevel { .. } => {}
    }

    true
}

// ─────────────────────────────────────────────────────────────────
// Simple Commands
// ─────────────────────────────────────────────────────────────────

/// Text from the argument, or stdin when omitted.
fn read_input(text: Option<String>) -> Result<String> {
    match text {
        Some(text) => Ok(text),
        None => {
            let buffer = std::io::read_to_string(std::io::stdin())?;
            let trimmed = buffer.trim().to_string();
            if trimmed.is_empty() {
                return Err(Error::Config(
                    "No input text given (pass an argument or pipe stdin)".to_string(),
                ));
            }
            Ok(trimmed)
        }
    }
}

/// Handle configuration subcommands.
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = RelayConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            config::init_config(path.as_deref(), force)?;
        }
        ConfigSubcommand::Validate { config } => match RelayConfig::load(config.as_deref()) {
            Ok(_) => {
                println!("Configuration is valid.");
            }
            Err(e) => {
                eprint!("{}", e.format_for_terminal());
                std::process::exit(e.exit_code());
            }
        },
    }

    Ok(())
}

/// Handle reading level subcommands.
fn handle_levels_command(subcommand: LevelsSubcommand) -> Result<()> {
    match subcommand {
        LevelsSubcommand::List => {
            println!("Built-in reading levels:");
            for level in persona::builtin_levels() {
                println!("  {}. {} - {}", level.level, level.name, level.description);
            }
        }
        LevelsSubcommand::Show { config } => {
            let store = open_persona_store(config.as_deref())?;
            let current = store.load_current();
            let selected = store.load_selected();
            println!("Current level:  {}. {}", current.level, current.name);
            println!("Selected level: {}. {}", selected.level, selected.name);
        }
        LevelsSubcommand::Set { level, config } => {
            let store = open_persona_store(config.as_deref())?;
            if !store.list().iter().any(|l| l.level == level) {
                return Err(Error::Config(format!(
                    "Unknown level {} (valid: 1-{})",
                    level,
                    store.list().len()
                )));
            }
            let entry = store.get(level);
            store.save_current(&entry)?;
            store.save_selected(&entry)?;
            println!("Level set to {}. {}", entry.level, entry.name);
        }
    }

    Ok(())
}

fn open_persona_store(config_path: Option<&str>) -> Result<PersonaStore> {
    let config = RelayConfig::load(config_path)?;
    ensure_data_dir(&config)?;
    Ok(PersonaStore::new(JsonStore::new(config.data_dir())))
}
