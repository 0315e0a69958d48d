//! Configuration management commands.

use std::path::{Path, PathBuf};

use anyhow::bail;
use clap::{Args, Subcommand};
use depgraph_config::{Config, default_config_path, find_config};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Print which configuration file is used
    Path,

    /// Write the default configuration to a file
    Init {
        /// Target file (defaults to the user configuration file)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Check a configuration file
    Validate {
        /// File to check (defaults to the file in use)
        path: Option<PathBuf>,
    },
}

pub fn run(args: ConfigArgs, config: &Config, explicit: Option<&Path>) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        ConfigCommand::Path => {
            match find_config(explicit) {
                Some(path) => println!("{}", path.display()),
                None => println!("(defaults, no file at {})", default_config_path().display()),
            }
            Ok(())
        }
        ConfigCommand::Init { path, force } => init(path.unwrap_or_else(default_config_path), force),
        ConfigCommand::Validate { path } => {
            let Some(path) = path.or_else(|| find_config(explicit)) else {
                bail!("no configuration file found");
            };
            Config::load(&path)?;
            println!("{} is valid", path.display());
            Ok(())
        }
    }
}

fn init(path: PathBuf, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Config::default().save(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
