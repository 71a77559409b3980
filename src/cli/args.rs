//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Instant HTML previews of editor projects
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: instaview.toml, searched upward)
    #[arg(short = 'C', long, global = true, default_value = "instaview.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Compile a project directory into one HTML document
    #[command(visible_alias = "c")]
    Compile {
        /// Project directory
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: PathBuf,

        /// Write the document here instead of stdout
        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        output: Option<PathBuf>,

        /// Print document metadata as JSON instead of HTML
        #[arg(long)]
        json: bool,
    },

    /// Print the detected framework of a project directory
    #[command(visible_alias = "d")]
    Detect {
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: PathBuf,
    },

    /// Keep a preview file painted while the project changes
    #[command(visible_alias = "w")]
    Watch {
        #[command(flatten)]
        args: WatchArgs,
    },

    /// Run the compile authority (HTTP + room protocol)
    #[command(visible_alias = "s")]
    Serve {
        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<std::net::IpAddr>,

        /// HTTP port number
        #[arg(short, long)]
        port: Option<u16>,

        /// WebSocket port number
        #[arg(long)]
        ws_port: Option<u16>,

        /// Directory holding one sub-directory per project
        #[arg(long, value_hint = clap::ValueHint::DirPath)]
        projects: Option<PathBuf>,
    },
}

/// Watch command arguments.
#[derive(clap::Args, Debug, Clone)]
pub struct WatchArgs {
    /// Project directory
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub dir: PathBuf,

    /// Preview file to keep painted (default: <DIR>/.instaview/preview.html)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Compile through the remote authority configured in [sync]
    #[arg(short, long)]
    pub remote: bool,

    /// Debounce window in milliseconds
    #[arg(short, long)]
    pub debounce: Option<u64>,

    /// Compile on every change (false: only on explicit refresh)
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub hot_reload: Option<bool>,

    /// Start from an empty preview cache
    #[arg(long)]
    pub no_cache: bool,
}

#[allow(unused)]
impl Cli {
    pub const fn is_watch(&self) -> bool {
        matches!(self.command, Commands::Watch { .. })
    }
    pub const fn is_serve(&self) -> bool {
        matches!(self.command, Commands::Serve { .. })
    }
}
