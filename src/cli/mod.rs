use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::Workspace;
use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};
use crate::storage;

pub mod commands;
pub mod shell;

use self::commands::{CategoryArgs, NoteArgs};

#[derive(Parser, Debug)]
#[command(
    name = "journal",
    version,
    about = "Tabbed note journal with rename-on-edit"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over JOURNAL_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over JOURNAL_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive session (default)
    Shell,
    /// Manage categories
    Category(CategoryArgs),
    /// Manage notes
    Note(NoteArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;
    let store = storage::init(loader.paths(), &config.storage)?;
    tracing::debug!(db = %store.database_path().display(), "journal store ready");

    let mut workspace = Workspace::load(Box::new(store), &config.debounce);
    let command = cli.command.unwrap_or(Commands::Shell);
    match command {
        Commands::Shell => shell::run_interactive(&mut workspace),
        Commands::Category(args) => commands::handle_category_command(&mut workspace, args),
        Commands::Note(args) => commands::handle_note_command(&mut workspace, args),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
