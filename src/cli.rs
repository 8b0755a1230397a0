//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the relay.

use clap::{Parser, Subcommand};

/// webai-relay - Streaming relay for on-device AI text capabilities
///
/// Takes a text selection, runs it through a capability (summarizer,
/// translator, language detector or prompt session) pitched at a chosen
/// reading level, and streams the answer back chunk by chunk.
#[derive(Parser, Debug)]
#[command(name = "webai-relay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay (reads selections from stdin and streams answers)
    Run {
        /// Path to configuration file
        #[arg(short, long, env = "WEBAI_CONFIG")]
        config: Option<String>,

        /// Start at this reading level (persisted for later runs)
        #[arg(short, long)]
        level: Option<u32>,

        /// Process this one selection and exit instead of reading stdin
        #[arg(long)]
        selection: Option<String>,

        /// Capability for --selection: summarizer, translator,
        /// language-detector, prompt-session
        #[arg(short = 'k', long, default_value = "summarizer")]
        kind: String,

        /// Print finished answers as rendered HTML
        #[arg(long)]
        html: bool,
    },

    /// Translate text between a language pair
    Translate {
        /// Text to translate (reads stdin when omitted)
        text: Option<String>,

        /// Source language tag (defaults to the configured pair)
        #[arg(short, long)]
        source: Option<String>,

        /// Target language tag (defaults to the configured pair)
        #[arg(short, long)]
        target: Option<String>,

        /// Path to configuration file
        #[arg(short, long, env = "WEBAI_CONFIG")]
        config: Option<String>,
    },

    /// Detect the language of a text
    Detect {
        /// Text to examine (reads stdin when omitted)
        text: Option<String>,

        /// Path to configuration file
        #[arg(short, long, env = "WEBAI_CONFIG")]
        config: Option<String>,
    },

    /// Display version and build information
    Version,

    /// Reading level management
    Levels {
        #[command(subcommand)]
        subcommand: LevelsSubcommand,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Reading level subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum LevelsSubcommand {
    /// List the built-in reading levels
    List,

    /// Show the persisted current level
    Show {
        /// Path to configuration file
        #[arg(short, long, env = "WEBAI_CONFIG")]
        config: Option<String>,
    },

    /// Persist a new current level
    Set {
        /// Level ordinal (1-5)
        level: u32,

        /// Path to configuration file
        #[arg(short, long, env = "WEBAI_CONFIG")]
        config: Option<String>,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        // Verifies that the CLI definition is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::parse_from(["webai-relay", "run"]);
        match cli.command {
            Commands::Run {
                config,
                level,
                selection,
                kind,
                html,
            } => {
                assert!(config.is_none());
                assert!(level.is_none());
                assert!(selection.is_none());
                assert_eq!(kind, "summarizer");
                assert!(!html);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_with_config() {
        let cli = Cli::parse_from(["webai-relay", "run", "--config", "/path/to/config.toml"]);
        match cli.command {
            Commands::Run { config, .. } => {
                assert_eq!(config, Some("/path/to/config.toml".to_string()));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_one_shot_selection() {
        let cli = Cli::parse_from([
            "webai-relay",
            "run",
            "--selection",
            "some selected text",
            "--kind",
            "prompt-session",
            "--level",
            "3",
        ]);
        match cli.command {
            Commands::Run {
                selection,
                kind,
                level,
                ..
            } => {
                assert_eq!(selection, Some("some selected text".to_string()));
                assert_eq!(kind, "prompt-session");
                assert_eq!(level, Some(3));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_translate_args() {
        let cli = Cli::parse_from([
            "webai-relay",
            "translate",
            "good morning",
            "--source",
            "en",
            "--target",
            "ja",
        ]);
        match cli.command {
            Commands::Translate {
                text,
                source,
                target,
                ..
            } => {
                assert_eq!(text, Some("good morning".to_string()));
                assert_eq!(source, Some("en".to_string()));
                assert_eq!(target, Some("ja".to_string()));
            }
            _ => panic!("Expected Translate command"),
        }
    }

    #[test]
    fn test_detect_without_text_reads_stdin() {
        let cli = Cli::parse_from(["webai-relay", "detect"]);
        match cli.command {
            Commands::Detect { text, .. } => assert!(text.is_none()),
            _ => panic!("Expected Detect command"),
        }
    }

    #[test]
    fn test_levels_list() {
        let cli = Cli::parse_from(["webai-relay", "levels", "list"]);
        match cli.command {
            Commands::Levels {
                subcommand: LevelsSubcommand::List,
            } => {}
            _ => panic!("Expected Levels List command"),
        }
    }

    #[test]
    fn test_levels_set() {
        let cli = Cli::parse_from(["webai-relay", "levels", "set", "4"]);
        match cli.command {
            Commands::Levels {
                subcommand: LevelsSubcommand::Set { level, config },
            } => {
                assert_eq!(level, 4);
                assert!(config.is_none());
            }
            _ => panic!("Expected Levels Set command"),
        }
    }

    #[test]
    fn test_verbose_flags() {
        let cli = Cli::parse_from(["webai-relay", "-vv", "version"]);
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_quiet_flag() {
        let cli = Cli::parse_from(["webai-relay", "--quiet", "version"]);
        assert!(cli.quiet);
    }

    #[test]
    fn test_config_show() {
        let cli = Cli::parse_from(["webai-relay", "config", "show"]);
        match cli.command {
            Commands::Config {
                subcommand: ConfigSubcommand::Show { config },
            } => assert!(config.is_none()),
            _ => panic!("Expected Config Show command"),
        }
    }

    #[test]
    fn test_config_init() {
        let cli = Cli::parse_from(["webai-relay", "config", "init", "--force"]);
        match cli.command {
            Commands::Config {
                subcommand: ConfigSubcommand::Init { path, force },
            } => {
                assert!(path.is_none());
                assert!(force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }
}
