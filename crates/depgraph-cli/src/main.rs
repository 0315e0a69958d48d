//! Depgraph CLI - run demo lazy-function graphs and build demo rig relations.

mod commands;
mod demo;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use depgraph_config::Config;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "depgraph")]
#[command(author, version, about = "Lazy-function graphs and dependency relations", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./depgraph.toml, then the user config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, overrides the configured one (RUST_LOG wins over both)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a demo graph
    Eval(commands::eval::EvalArgs),

    /// Export a demo graph as Graphviz DOT
    Dot(commands::dot::DotArgs),

    /// Build the relations of a demo rig and print the evaluation order
    Rig(commands::rig::RigArgs),

    /// Show and manage the configuration file
    Config(commands::config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;

    let filter = cli.log.as_deref().unwrap_or(config.logging.filter.as_str());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Eval(args) => commands::eval::run(args, &config),
        Commands::Dot(args) => commands::dot::run(args, &config),
        Commands::Rig(args) => commands::rig::run(args, &config),
        Commands::Config(args) => commands::config::run(args, &config, cli.config.as_deref()),
    }
}
