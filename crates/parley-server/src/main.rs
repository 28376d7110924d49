//! Parley server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start with self-signed certificate and in-memory claims (development)
//! parley-server --bind 0.0.0.0:4433
//!
//! # Start with TLS certificate and durable username claims
//! parley-server --cert cert.pem --key key.pem --registrations names.redb
//! ```

use clap::Parser;
use parley_server::{
    DriverConfig, MAX_CONNECTIONS_LIMIT, MemoryRegistrations, PrivateJoin, RedbRegistrations,
    RegistrationStore, Server, ServerRuntimeConfig,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parley chat server
#[derive(Parser, Debug)]
#[command(name = "parley-server")]
#[command(about = "Parley presence and room router")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:4433")]
    bind: String,

    /// Path to TLS certificate (PEM format)
    #[arg(short, long)]
    cert: Option<String>,

    /// Path to TLS private key (PEM format)
    #[arg(short, long)]
    key: Option<String>,

    /// Redb file holding claimed usernames (in memory when absent)
    #[arg(long)]
    registrations: Option<String>,

    /// Maximum number of identified users (capped so the user list fits in one frame)
    #[arg(long, default_value_t = MAX_CONNECTIONS_LIMIT)]
    max_connections: usize,

    /// How the target of a private chat joins (on-request, immediate)
    #[arg(long, default_value = "on-request")]
    private_join: PrivateJoin,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Parley server starting");
    tracing::info!("Binding to {}", args.bind);

    if args.cert.is_none() || args.key.is_none() {
        tracing::warn!("No TLS certificate provided - using self-signed certificate");
    }

    if args.max_connections > MAX_CONNECTIONS_LIMIT {
        tracing::warn!(
            "--max-connections {} exceeds the limit, using {}",
            args.max_connections,
            MAX_CONNECTIONS_LIMIT
        );
    }

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        cert_path: args.cert,
        key_path: args.key,
        registrations_path: args.registrations,
        driver: DriverConfig {
            max_connections: args.max_connections,
            private_join: args.private_join,
        },
    };

    match config.registrations_path.clone() {
        Some(path) => {
            tracing::info!("Username claims stored in {}", path);
            serve(config, RedbRegistrations::open(path)?).await
        },
        None => serve(config, MemoryRegistrations::new()).await,
    }
}

async fn serve<R: RegistrationStore>(
    config: ServerRuntimeConfig,
    registrations: R,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = Server::bind(config, registrations)?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
