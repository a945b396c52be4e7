// CLI Interface
//
// Command-line entry point: run the server or try a search from the shell.

use anyhow::{Context, Result as AnyhowResult};
use clap::{Parser, Subcommand};
use krishisearch::SearchEngine;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::server::KrishiServer;

/// KrishiSahay - Agricultural Assistant Server
#[derive(Parser, Debug)]
#[command(name = "krishiserve")]
#[command(author = "KrishiSahay Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Answer farmers' questions over HTTP and WebSocket", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(global = true, long = "config", short = 'c')]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(global = true, long = "verbose", short = 'v')]
    pub verbose: bool,

    /// Subcommand to execute (defaults to `serve`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP/WebSocket server
    Serve {
        /// Host address to bind to
        #[arg(long = "host")]
        host: Option<String>,

        /// Port to listen on
        #[arg(long = "port")]
        port: Option<u16>,
    },

    /// Search the knowledge base and print ranked results
    Search {
        /// Search query
        #[arg(value_name = "QUERY")]
        query: String,

        /// Maximum number of results to print
        #[arg(long = "top-k", default_value = "10")]
        top_k: usize,
    },
}

impl Cli {
    /// Run the CLI
    pub async fn run(self) -> AnyhowResult<()> {
        let mut config = load_config(self.config.as_ref())?;
        if self.verbose {
            config.log_level = "debug".to_string();
        }
        init_logging(&config.log_level);

        match self.command.unwrap_or(Commands::Serve { host: None, port: None }) {
            Commands::Serve { host, port } => cmd_serve(config, host, port).await,
            Commands::Search { query, top_k } => cmd_search(&config, &query, top_k),
        }
    }
}

/// Defaults, then the optional file, then the environment
pub fn load_config(path: Option<&PathBuf>) -> AnyhowResult<ServerConfig> {
    let mut config = match path {
        Some(path) => ServerConfig::load(path).map_err(anyhow::Error::msg)?,
        None => ServerConfig::default(),
    };
    config.apply_env();
    Ok(config)
}

/// Install the stderr fmt subscriber; `RUST_LOG` overrides `level`
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

async fn cmd_serve(mut config: ServerConfig, host: Option<String>, port: Option<u16>) -> AnyhowResult<()> {
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let server = KrishiServer::new(config).context("Failed to start server")?;
    info!("WebSocket endpoint: {}", server.websocket_url());
    server.start().await.context("Server stopped with an error")?;
    Ok(())
}

fn cmd_search(config: &ServerConfig, query: &str, top_k: usize) -> AnyhowResult<()> {
    let kb = config.load_knowledge_base()?;
    let search_config = config.load_search_config()?;
    let engine = SearchEngine::from_config(&search_config).context("Failed to build search engine")?;

    let outcome = engine.search(query, &kb, None);

    if outcome.total_results == 0 {
        println!("No results found for: {}", query);
        return Ok(());
    }

    println!(
        "\nFound {} result(s) for: '{}' (intent: {}{})\n",
        outcome.total_results,
        query,
        outcome.intent.topic,
        outcome
            .intent
            .action
            .as_deref()
            .map(|a| format!(", action: {}", a))
            .unwrap_or_default()
    );
    for (i, result) in outcome.results.iter().take(top_k).enumerate() {
        println!(
            "{}. {} ({})",
            i + 1,
            result.key,
            result.entry.category.as_deref().unwrap_or("uncategorized")
        );
        println!("   Score: {:.2}", result.score);
        if let Some(solution) = &result.entry.solution {
            println!("   Solution: {}", solution);
        }
        println!();
    }

    if !outcome.suggestions.is_empty() {
        println!("Suggestions:");
        for suggestion in &outcome.suggestions {
            println!("  - {}", suggestion);
        }
    }

    Ok(())
}
