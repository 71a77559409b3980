//! instaview - instant HTML previews of editor projects.

mod cache;
mod cli;
mod compiler;
mod config;
mod core;
mod detect;
mod embed;
mod engine;
mod error;
mod freshness;
mod logger;
mod sync;
mod tree;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::PreviewConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = PreviewConfig::load(&cli)?;
    if !config.config_path.as_os_str().is_empty() {
        debug!("config"; "using {}", config.config_path.display());
    }

    match &cli.command {
        Commands::Compile { dir, output, json } => cli::compile::compile_project(dir, output.as_deref(), *json),
        Commands::Detect { dir } => cli::detect::detect_project(dir),
        Commands::Watch { args } => cli::watch::watch(args, &config),
        Commands::Serve { .. } => cli::serve::serve(&config),
    }
}
