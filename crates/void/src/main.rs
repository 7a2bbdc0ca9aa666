//! Void CLI - bundles void components and pages into a single script.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "void")]
#[command(about = "Build tool for void projects")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a void project into public/app.js
    Compile {
        /// Project folder to compile
        path: PathBuf,

        /// Enable html generation for pages
        #[arg(short, long)]
        generate_html: bool,

        /// Compile sources in file name order
        #[arg(long)]
        sorted: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Compile {
            path,
            generate_html,
            sorted,
        } => {
            commands::compile::run(path, generate_html, sorted)?;
        }
    }

    Ok(())
}
