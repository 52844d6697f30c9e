use anyhow::{ensure, Result};
use clap::{Parser, Subcommand};
use colored::*;
use meshroom::defaults::{DEFAULT_CAPACITY, DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2};
use meshroom::model::IceServerConfig;
use meshroom::server::{serve, ServerConfig};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meshroom")]
#[command(about = "Signaling server for a shared multi-streamer video room")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the signaling server.
    Serve {
        #[arg(long, env = "MESHROOM_BIND", default_value = "0.0.0.0:5050")]
        bind: SocketAddr,

        /// Number of streamer slots.
        #[arg(long, env = "MESHROOM_CAPACITY", default_value_t = DEFAULT_CAPACITY)]
        capacity: usize,

        /// STUN urls pushed to clients. Repeat or comma-separate.
        #[arg(long, env = "MESHROOM_STUN", value_delimiter = ',')]
        stun: Vec<String>,

        /// Bound of the room mailbox.
        #[arg(long, env = "MESHROOM_MAILBOX", default_value_t = 100)]
        mailbox: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Serve {
            bind,
            capacity,
            stun,
            mailbox,
        } => {
            let config = server_config(bind, capacity, stun, mailbox)?;

            println!("{}", "📡 Starting Meshroom signaling server...".green().bold());
            println!("   🔌 Listening: {}", config.bind_addr);
            println!("   🎥 Streamer slots: {}", config.capacity);
            for server in &config.ice_servers {
                println!("   🧭 ICE: {}", server.urls.join(", "));
            }

            serve(config).await?;
        }
    }

    Ok(())
}

fn server_config(
    bind: SocketAddr,
    capacity: usize,
    stun: Vec<String>,
    mailbox: usize,
) -> Result<ServerConfig> {
    ensure!(capacity > 0, "capacity must be at least 1");
    ensure!(mailbox > 0, "mailbox must be at least 1");

    let urls = if stun.is_empty() {
        vec![DEFAULT_STUN_ADDR.to_owned(), DEFAULT_STUN_ADDR_2.to_owned()]
    } else {
        stun
    };

    Ok(ServerConfig {
        bind_addr: bind,
        capacity,
        ice_servers: vec![IceServerConfig {
            urls,
            username: None,
            credential: None,
        }],
        mailbox_size: mailbox,
    })
}
