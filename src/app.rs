//! Application orchestration and command routing.
//!
//! Parses the command line, sets up logging and configuration, and delegates
//! to the command handlers.

use crate::commands;
use crate::config::VoxclipConfig;
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;

/// Record short titled audio clips and upload them to a clip collector
#[derive(Parser)]
#[command(name = "voxclip")]
#[command(version)]
#[command(about = "Record short titled audio clips and upload them to a clip collector")]
#[command(long_about = "Record short titled audio clips in the terminal, watch live level bars while\nrecording, and upload them to a clip collector server.\n\nDEFAULT COMMAND:\n    If no command is specified, 'record' is used.\n\nEXAMPLES:\n    # Record against a local collector\n    $ voxclip\n\n    # Record against another collector\n    $ VOXCLIP_BASE_URL=https://clips.example.com voxclip\n\n    # List uploaded clips as JSON\n    $ voxclip list --json\n\n    # Play the second clip\n    $ voxclip play 2\n\n    # Stop a running recording from a hotkey daemon\n    $ pkill -USR1 voxclip")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/voxclip/voxclip.toml\n    Logs:               ~/.local/state/voxclip/voxclip.log.*\n    Collector URL:      --base-url or VOXCLIP_BASE_URL overrides server.base_url"
)]
struct Cli {
    /// Collector base URL, overriding server.base_url from the config file
    #[arg(long, global = true, env = "VOXCLIP_BASE_URL", value_name = "URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record and upload clips (default)
    ///
    /// Type a title and press Enter to record. Space pauses, Enter stops,
    /// Enter again uploads, Escape discards.
    #[command(visible_alias = "r")]
    Record,

    /// List clips stored by the collector
    #[command(visible_alias = "ls")]
    List {
        /// Print the raw records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Play an uploaded clip with the system audio player
    #[command(visible_alias = "p")]
    Play {
        /// Clip number as shown by `voxclip list` (default 1)
        #[arg(value_name = "N")]
        index: Option<usize>,
    },

    /// Open the configuration file in your editor
    ///
    /// Uses $EDITOR or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config {
        /// Print the effective configuration instead of editing it
        #[arg(long)]
        show: bool,
    },

    /// List available audio input devices
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries
    Logs {
        /// Number of lines to show
        #[arg(short = 'n', long, default_value_t = commands::logs::DEFAULT_LINES)]
        lines: usize,
    },

    /// Generate shell completion script
    ///
    /// Examples:
    ///   voxclip completions bash > voxclip.bash
    ///   voxclip completions zsh > _voxclip
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs voxclip for the parsed command line.
///
/// # Errors
/// - If logging initialization fails
/// - If the configuration is invalid
/// - If the command fails
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Commands that need neither logging nor a valid config
    match cli.command {
        Some(Commands::Completions { shell }) => {
            generate(shell, &mut Cli::command(), "voxclip", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => return commands::handle_list_devices(),
        Some(Commands::Logs { lines }) => return commands::handle_logs(lines),
        _ => {}
    }

    logging::init_logging()?;

    if let Some(Commands::Config { show }) = cli.command {
        return commands::handle_config(show, cli.base_url);
    }

    let config = VoxclipConfig::load()
        .and_then(|config| config.with_base_url(cli.base_url))
        .map_err(|e| {
            tracing::error!("Failed to load configuration: {e}");
            anyhow::anyhow!("Configuration error: {e}\n\nCheck ~/.config/voxclip/voxclip.toml (or run 'voxclip config').")
        })?;

    match cli.command {
        None | Some(Commands::Record) => commands::handle_record(config).await,
        Some(Commands::List { json }) => commands::handle_list(&config, json).await,
        Some(Commands::Play { index }) => commands::handle_play(&config, index).await,
        Some(Commands::Config { .. })
        | Some(Commands::Completions { .. })
        | Some(Commands::ListDevices)
        | Some(Commands::Logs { .. }) => unreachable!("handled before config loading"),
    }
}
