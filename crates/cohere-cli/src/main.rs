use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cohere", about = "cohere sharded key-value store CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Manager gRPC address
    #[arg(long, default_value = "http://127.0.0.1:50051", global = true)]
    server: String,

    /// Manager HTTP address
    #[arg(long, default_value = "http://127.0.0.1:8080", global = true)]
    http: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Get the value stored under a key
    Get {
        key: String,
    },
    /// Store a value under a key
    Set {
        key: String,
        value: String,
    },
    /// Delete a key
    Delete {
        key: String,
    },
    /// List registered storage nodes
    Servers,
    /// Check manager liveness
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("cohere=info")
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Get { key } => commands::kv::get(&cli.server, &key).await?,
        Commands::Set { key, value } => commands::kv::set(&cli.server, &key, &value).await?,
        Commands::Delete { key } => commands::kv::delete(&cli.server, &key).await?,
        Commands::Servers => commands::cluster::servers(&cli.http).await?,
        Commands::Health => commands::cluster::health(&cli.http).await?,
    }

    Ok(())
}
