use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use textbook_rag::config::Config;
use textbook_rag::embeddings::EmbeddingClient;
use textbook_rag::ingest::IngestionPipeline;
use textbook_rag::server::run_server;
use textbook_rag::vector_store::VectorStoreClient;

#[derive(Parser)]
#[command(name = "textbook-rag")]
#[command(about = "Retrieval-augmented question answering over a textbook corpus")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "textbook-rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP question answering service
    Serve,
    /// Ingest crawled pages (JSON lines of {url, text}) into the vector store
    Ingest {
        /// Input JSONL file of crawled pages
        input: PathBuf,
    },
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            run_server(config).await?;
        }
        Commands::Ingest { input } => {
            let embeddings = EmbeddingClient::new(&config.embedding)?;
            let store = VectorStoreClient::new(&config.vector_store)?;
            let stats = IngestionPipeline::new(embeddings, store)
                .ingest_file(&input)
                .await?;
            println!(
                "Ingested {} pages: {} chunks created, {} stored, {} errors",
                stats.pages_processed,
                stats.chunks_created,
                stats.chunks_stored,
                stats.errors_encountered
            );
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["textbook-rag", "serve"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            matches!(parsed.command, Commands::Serve);
        }
    }

    #[test]
    fn ingest_command_with_input() {
        let cli = Cli::try_parse_from(["textbook-rag", "ingest", "pages.jsonl"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest { input } = parsed.command {
                assert_eq!(input, PathBuf::from("pages.jsonl"));
            }
        }
    }

    #[test]
    fn config_path_override() {
        let cli = Cli::try_parse_from(["textbook-rag", "--config", "/tmp/rag.toml", "config"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.config, PathBuf::from("/tmp/rag.toml"));
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["textbook-rag", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }
}
