use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Workspace;

#[derive(Parser)]
#[command(name = "ghostwriter")]
#[command(about = "Ghostwriter - turn rough ideas into finished paragraphs", long_about = None)]
struct Cli {
    /// Directory holding config.toml and secret.json
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Document storage directory (overrides `[storage] dir`)
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List documents, most recently updated first
    List,
    /// Create an empty document
    New { name: String },
    /// Rename a document
    Rename { id: String, name: String },
    /// Delete a document and its versions
    Delete { id: String },
    /// Show the version history of a document
    History { id: String },
    /// Export the current version of a document as plain text
    Export {
        id: String,
        /// Output file (defaults to a name derived from the document)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Send one paragraph through the completion service
    Complete {
        text: String,
        /// Standing instructions placed before the paragraph
        #[arg(short, long)]
        instructions: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,ghostwriter=info")),
        )
        .init();

    let cli = Cli::parse();
    let workspace = Workspace::load(cli.config_dir.as_deref(), cli.storage_dir.as_deref())?;

    match cli.command {
        Commands::List => commands::documents::list(&workspace).await?,
        Commands::New { name } => commands::documents::create(&workspace, &name).await?,
        Commands::Rename { id, name } => commands::documents::rename(&workspace, &id, &name).await?,
        Commands::Delete { id } => commands::documents::delete(&workspace, &id).await?,
        Commands::History { id } => commands::documents::history(&workspace, &id).await?,
        Commands::Export { id, output } => {
            commands::documents::export(&workspace, &id, output).await?
        }
        Commands::Complete { text, instructions } => {
            commands::complete::run(&workspace, &text, instructions.as_deref()).await?
        }
    }

    Ok(())
}
