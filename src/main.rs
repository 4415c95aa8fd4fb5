//! docsmith - Markdown documentation sites with a live-reloading dev server.

#![allow(dead_code)]

mod cli;
mod config;
mod embed;
mod logger;
mod reload;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::SiteConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    match &cli.command {
        Commands::New { name } => cli::new::new_project(name.as_deref(), &cli.config),
        Commands::Build { .. } => {
            let config = SiteConfig::load(&cli)?;
            cli::build::build_site(&config, config.build.dirty).map(|_| ())
        }
        Commands::Serve { .. } => {
            let config = SiteConfig::load(&cli)?;
            cli::serve::serve_site(&config)
        }
    }
}
