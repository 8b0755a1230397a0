//! Configuration management for the relay
//!
//! Configuration sources, in priority order:
//! 1. Environment variables (WEBAI_*)
//! 2. Configuration file (TOML)
//! 3. Built-in defaults
//!
//! The file is searched in the usual places (`webai-relay.toml`,
//! `config.toml`, the platform config dir, `~/.webai-relay/`,
//! `/etc/webai-relay/`) unless an explicit path is given.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::capability::{
    Availability, CapabilityFactory, MockConfig, SummaryFormat, SummaryLength, SummaryType,
};
use crate::error::{Error, Result};
use crate::relay::RelayOptions;

// ─────────────────────────────────────────────────────────────────
// Main Configuration
// ─────────────────────────────────────────────────────────────────

/// Complete relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Session lifecycle settings
    pub relay: RelaySettings,

    /// Capability provider and per-kind options
    pub capability: CapabilitySettings,

    /// Durable storage settings
    pub storage: StorageSettings,

    /// UI consumer settings
    pub ui: UiSettings,

    /// Async runtime settings
    pub runtime: RuntimeSettings,

    /// Logging settings
    pub logging: LoggingSettings,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            relay: RelaySettings::default(),
            capability: CapabilitySettings::default(),
            storage: StorageSettings::default(),
            ui: UiSettings::default(),
            runtime: RuntimeSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Section Settings
// ─────────────────────────────────────────────────────────────────

/// Session lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Pause before a session starts, covering the answer panel opening (ms)
    pub panel_open_delay_ms: u64,

    /// Selections longer than this log a warning before processing
    pub max_input_chars: usize,

    /// Command channel capacity
    pub queue_size: usize,

    /// Whether a new trigger cancels the session it supersedes
    pub cancel_superseded: bool,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            panel_open_delay_ms: 500,
            max_input_chars: 4000,
            queue_size: 64,
            cancel_superseded: true,
        }
    }
}

/// Capability provider and per-kind options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilitySettings {
    /// Provider backing all capability kinds
    pub provider: String,

    /// Summarizer style options
    pub summarizer: SummarizerSettings,

    /// Prompt session sampling options
    pub prompt: PromptSettings,

    /// Default translation language pair
    pub translator: TranslatorSettings,

    /// Mock provider behavior
    pub mock: MockSettings,
}

impl Default for CapabilitySettings {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            summarizer: SummarizerSettings::default(),
            prompt: PromptSettings::default(),
            translator: TranslatorSettings::default(),
            mock: MockSettings::default(),
        }
    }
}

/// Summarizer style options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerSettings {
    /// Summary style: "tldr", "key-points", "teaser" or "headline"
    pub summary_type: SummaryType,

    /// Output format: "markdown" or "plain-text"
    pub format: SummaryFormat,

    /// Target length: "short", "medium" or "long"
    pub length: SummaryLength,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            summary_type: SummaryType::default(),
            format: SummaryFormat::default(),
            length: SummaryLength::default(),
        }
    }
}

/// Prompt session sampling options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Sampling temperature (provider default when unset)
    pub temperature: Option<f32>,

    /// Top-k sampling cutoff (provider default when unset)
    pub top_k: Option<u32>,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            temperature: None,
            top_k: None,
        }
    }
}

/// Default translation language pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorSettings {
    /// BCP 47 tag of the expected source language
    pub source_language: String,

    /// BCP 47 tag of the target language
    pub target_language: String,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            source_language: "en".to_string(),
            target_language: "es".to_string(),
        }
    }
}

/// Mock provider behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockSettings {
    /// Availability the mock reports for every kind
    pub availability: Availability,

    /// Delay between streamed chunks (ms)
    pub chunk_latency_ms: u64,

    /// Words per streamed chunk
    pub words_per_chunk: usize,

    /// Simulated model size when a download is required (bytes)
    pub download_total_bytes: u64,

    /// Progress reports during a simulated download
    pub download_steps: u32,

    /// Emit cumulative chunks instead of deltas
    pub cumulative_chunks: bool,

    /// Fixed response text instead of the generated one
    pub fixed_response: Option<String>,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            availability: Availability::Available,
            chunk_latency_ms: 40,
            words_per_chunk: 3,
            download_total_bytes: 4096,
            download_steps: 4,
            cumulative_chunks: false,
            fixed_response: None,
        }
    }
}

/// Durable storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding the local and sync record areas
    pub data_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.webai-relay/storage".to_string(),
        }
    }
}

/// UI consumer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    /// Minimum interval between accepted triggers (ms)
    pub trigger_debounce_ms: u64,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            trigger_debounce_ms: 500,
        }
    }
}

/// Async runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Worker threads for the async runtime (0 = automatic)
    pub worker_threads: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self { worker_threads: 0 }
    }
}

impl RuntimeSettings {
    /// Resolve the worker thread count, capping the automatic choice.
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            num_cpus::get().min(8)
        } else {
            self.worker_threads
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (logs to console only when unset)
    pub file: Option<String>,

    /// Maximum log file size before rotation (MB)
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Use JSON format for log output
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Loading
// ─────────────────────────────────────────────────────────────────

impl RelayConfig {
    /// Load configuration from a file, environment, and defaults.
    ///
    /// An explicit `config_path` must exist; without one, the first file
    /// found in the search locations is used, falling back to defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = if let Some(path) = config_path {
            let path = Path::new(path);
            if !path.exists() {
                return Err(Error::config_not_found(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            Self::from_file(path)?
        } else if let Some(found) = Self::find_config_file() {
            info!(path = %found.display(), "Loading configuration file");
            Self::from_file(&found)?
        } else {
            debug!("No configuration file found; using built-in defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.expand_paths()?;
        config.validate()?;

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| Error::ConfigNotFound {
            path: path.to_path_buf(),
            source: Some(e),
        })?;

        toml::from_str(&contents).map_err(|e| Error::ConfigParse {
            message: format!("{}: {}", path.display(), e),
            source: Some(e),
        })
    }

    /// Search the standard locations for a configuration file.
    fn find_config_file() -> Option<PathBuf> {
        let mut candidates = vec![
            PathBuf::from("webai-relay.toml"),
            PathBuf::from("config.toml"),
        ];

        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("webai-relay").join("config.toml"));
        }
        if let Some(dir) = dirs::home_dir() {
            candidates.push(dir.join(".webai-relay").join("config.toml"));
        }
        candidates.push(PathBuf::from("/etc/webai-relay/config.toml"));

        candidates.into_iter().find(|path| path.exists())
    }

    /// Apply WEBAI_* environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("WEBAI_PROVIDER") {
            self.capability.provider = val;
        }

        if let Ok(val) = env::var("WEBAI_PANEL_DELAY_MS") {
            if let Ok(ms) = val.parse() {
                self.relay.panel_open_delay_ms = ms;
            }
        }

        if let Ok(val) = env::var("WEBAI_MAX_INPUT_CHARS") {
            if let Ok(chars) = val.parse() {
                self.relay.max_input_chars = chars;
            }
        }

        if let Ok(val) = env::var("WEBAI_CANCEL_SUPERSEDED") {
            self.relay.cancel_superseded = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = env::var("WEBAI_SOURCE_LANGUAGE") {
            self.capability.translator.source_language = val;
        }

        if let Ok(val) = env::var("WEBAI_TARGET_LANGUAGE") {
            self.capability.translator.target_language = val;
        }

        if let Ok(val) = env::var("WEBAI_DATA_DIR") {
            self.storage.data_dir = val;
        }

        if let Ok(val) = env::var("WEBAI_DEBOUNCE_MS") {
            if let Ok(ms) = val.parse() {
                self.ui.trigger_debounce_ms = ms;
            }
        }

        if let Ok(val) = env::var("WEBAI_WORKER_THREADS") {
            if let Ok(threads) = val.parse() {
                self.runtime.worker_threads = threads;
            }
        }

        if let Ok(val) = env::var("WEBAI_LOG_LEVEL") {
            self.logging.level = val;
        }

        if let Ok(val) = env::var("WEBAI_LOG_FILE") {
            self.logging.file = Some(val);
        }

        if let Ok(val) = env::var("WEBAI_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Expand `~` and environment variables in path settings.
    fn expand_paths(&mut self) -> Result<()> {
        self.storage.data_dir = expand_path(&self.storage.data_dir)?;

        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file)?);
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "warning", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "'{}' is not a valid log level (expected one of: {})",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        if !CapabilityFactory::PROVIDERS.contains(&self.capability.provider.as_str()) {
            return Err(Error::config_field_invalid(
                "capability.provider",
                format!(
                    "unknown provider '{}' (available: {})",
                    self.capability.provider,
                    CapabilityFactory::PROVIDERS.join(", ")
                ),
            ));
        }

        if self.relay.queue_size == 0 {
            return Err(Error::config_field_invalid(
                "relay.queue_size",
                "queue size must be at least 1",
            ));
        }

        if self.relay.max_input_chars == 0 {
            return Err(Error::config_field_invalid(
                "relay.max_input_chars",
                "input limit must be at least 1",
            ));
        }

        if self.relay.panel_open_delay_ms > 60_000 {
            return Err(Error::config_field_invalid(
                "relay.panel_open_delay_ms",
                "panel delay must be 60000 ms or less",
            ));
        }

        if self.ui.trigger_debounce_ms > 10_000 {
            return Err(Error::config_field_invalid(
                "ui.trigger_debounce_ms",
                "trigger debounce must be 10000 ms or less",
            ));
        }

        let translator = &self.capability.translator;
        if translator.source_language.trim().is_empty()
            || translator.target_language.trim().is_empty()
        {
            return Err(Error::config_field_invalid(
                "capability.translator",
                "source_language and target_language must not be empty",
            ));
        }

        if self.capability.mock.download_steps == 0 {
            return Err(Error::config_field_invalid(
                "capability.mock.download_steps",
                "download progress needs at least one step",
            ));
        }

        if self.runtime.worker_threads > 256 {
            return Err(Error::config_field_invalid(
                "runtime.worker_threads",
                "worker threads must be 256 or fewer (0 selects an automatic count)",
            ));
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Derived Values
    // ─────────────────────────────────────────────────────────────

    /// Storage data directory as a path.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir)
    }

    /// Relay options derived from the relay and capability sections.
    pub fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            panel_open_delay_ms: self.relay.panel_open_delay_ms,
            max_input_chars: self.relay.max_input_chars,
            queue_size: self.relay.queue_size,
            cancel_superseded: self.relay.cancel_superseded,
            summary_type: self.capability.summarizer.summary_type,
            summary_format: self.capability.summarizer.format,
            summary_length: self.capability.summarizer.length,
            prompt_temperature: self.capability.prompt.temperature,
            prompt_top_k: self.capability.prompt.top_k,
        }
    }

    /// Mock provider configuration derived from the mock section.
    pub fn mock_config(&self) -> MockConfig {
        MockConfig {
            availability: self.capability.mock.availability,
            chunk_latency_ms: self.capability.mock.chunk_latency_ms,
            words_per_chunk: self.capability.mock.words_per_chunk,
            download_total_bytes: self.capability.mock.download_total_bytes,
            download_steps: self.capability.mock.download_steps,
            cumulative_chunks: self.capability.mock.cumulative_chunks,
            fixed_response: self.capability.mock.fixed_response.clone(),
            ..MockConfig::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────

/// Expand `~` and `$VAR` references in a path string.
fn expand_path(path: &str) -> Result<String> {
    shellexpand::full(path)
        .map(|expanded| expanded.to_string())
        .map_err(|e| Error::Config(format!("Failed to expand path '{}': {}", path, e)))
}

/// Create a default configuration file at the given path.
pub fn init_config(path: Option<&str>, force: bool) -> Result<()> {
    let path = Path::new(path.unwrap_or("webai-relay.toml"));

    if path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file '{}' already exists (use --force to overwrite)",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    fs::write(path, generate_default_config())?;
    println!("Created configuration file: {}", path.display());

    Ok(())
}

/// Generate the default configuration file contents.
pub fn generate_default_config() -> String {
    r#"# webai-relay configuration
#
# All values shown are the defaults. Environment variables (WEBAI_*)
# override file values.

[relay]
# Pause before a session starts, covering the answer panel opening (ms)
panel_open_delay_ms = 500

# Selections longer than this log a warning before processing
max_input_chars = 4000

# Command channel capacity
queue_size = 64

# Whether a new trigger cancels the session it supersedes
cancel_superseded = true

[capability]
# Provider backing all capability kinds
provider = "mock"

[capability.summarizer]
# Summary style: "tldr", "key-points", "teaser" or "headline"
summary_type = "tldr"

# Output format: "markdown" or "plain-text"
format = "markdown"

# Target length: "short", "medium" or "long"
length = "medium"

[capability.prompt]
# Sampling temperature and top-k cutoff (provider defaults when unset)
# temperature = 0.7
# top_k = 40

[capability.translator]
# Default translation language pair (BCP 47 tags)
source_language = "en"
target_language = "es"

[capability.mock]
# Availability the mock reports: "available", "downloadable",
# "downloading" or "unavailable"
availability = "available"

# Delay between streamed chunks (ms)
chunk_latency_ms = 40

# Words per streamed chunk
words_per_chunk = 3

# Simulated model download: total size (bytes) and progress steps
download_total_bytes = 4096
download_steps = 4

# Emit cumulative chunks instead of deltas
cumulative_chunks = false

# Fixed response text instead of the generated one
# fixed_response = "A canned answer."

[storage]
# Directory holding the local and sync record areas
data_dir = "~/.webai-relay/storage"

[ui]
# Minimum interval between accepted triggers (ms)
trigger_debounce_ms = 500

[runtime]
# Worker threads for the async runtime (0 = automatic)
worker_threads = 0

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (console only when unset)
# file = "~/.webai-relay/logs/relay.log"

# Rotation: maximum file size (MB) and files to keep
max_file_size_mb = 100
max_files = 5

# Use JSON format for log output
json_format = false
"#
    .to_string()
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
