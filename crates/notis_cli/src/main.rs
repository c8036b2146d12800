mod commands;

use clap::{Parser, Subcommand};
use notis_core::{EntryKind, ImportConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "notis", about = "Import Evernote exports into a task/note store", version)]
struct Cli {
    /// YAML config file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Config profile overlaid on `base`
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Database path, overrides the config value
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum KindArg {
    Task,
    Note,
}

impl From<KindArg> for EntryKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Task => EntryKind::Task,
            KindArg::Note => EntryKind::Note,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Import an .enex export
    Import {
        /// Path to the export file
        enex: PathBuf,
        /// Stop after this many notes
        #[arg(long)]
        max_notes: Option<usize>,
    },

    /// Show row counts
    Stats,

    /// List imported entries
    List {
        /// Only tasks or only notes
        #[arg(long)]
        kind: Option<KindArg>,
        /// Maximum rows
        #[arg(long, default_value = "50")]
        limit: u32,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<ImportConfig> {
    let mut config = match cli.config.as_ref() {
        Some(path) => ImportConfig::from_file(path, cli.profile.as_deref())?,
        None if cli.profile.is_some() => {
            anyhow::bail!("--profile requires --config");
        }
        None => ImportConfig::default(),
    };
    if let Some(db) = cli.db.as_ref() {
        config.database.path = db.clone();
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    notis_core::init_logging(&config.logging).map_err(anyhow::Error::msg)?;
    log::debug!(
        "event=cli_start module=cli status=ok core_version={} db={}",
        notis_core::core_version(),
        config.database.path.display()
    );

    match cli.command {
        Command::Import { ref enex, max_notes } => {
            commands::import::run(&config, enex, max_notes, &cli.format)?;
        }
        Command::Stats => {
            commands::stats::run(&config, &cli.format)?;
        }
        Command::List { kind, limit } => {
            commands::list::run(&config, kind.map(EntryKind::from), limit, &cli.format)?;
        }
    }

    Ok(())
}
