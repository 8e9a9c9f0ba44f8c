mod persistence;
mod settings;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use mediaconnect_core::client::{Collaborators, ConnectionManager, ConnectionOutcome};
use mediaconnect_core::ServerDescriptor;
use std::path::PathBuf;
use std::sync::Arc;

use crate::persistence::{get_config_dir, JsonCredentialStore};
use crate::settings::load_or_init_settings;

#[derive(Parser)]
#[command(name = "mediaconnect", version, about = "Find and connect to media servers")]
struct Cli {
    /// Directory holding settings.json and credentials.json
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover servers and connect to the best one
    Connect {
        /// Server address, with or without scheme
        #[arg(short, long, conflicts_with = "server")]
        address: Option<String>,
        /// Id of a saved server
        #[arg(short, long)]
        server: Option<String>,
    },
    /// Sign out of every server and reconnect
    Logout,
    /// List saved servers, most recently used first
    Servers,
    /// Send wake-on-LAN to every saved server
    Wake,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config_dir = cli.config_dir.unwrap_or_else(get_config_dir);
    let settings = load_or_init_settings(&config_dir);
    let store = Arc::new(JsonCredentialStore::in_dir(&config_dir));
    log::debug!("Using credentials at {}", store.path().display());

    let collaborators = Collaborators::standard(&settings.client, store);
    let manager = ConnectionManager::new(settings.client, collaborators);

    match cli.command {
        Command::Connect {
            address: Some(address),
            ..
        } => print_outcome(&manager.connect_address(&address).await?),
        Command::Connect {
            server: Some(id), ..
        } => {
            let Some(server) = manager.saved_servers().into_iter().find(|s| s.id == id) else {
                bail!("no saved server with id {}", id);
            };
            print_outcome(&manager.connect_server(server).await);
        }
        Command::Connect { .. } => print_outcome(&manager.connect().await),
        Command::Logout => print_outcome(&manager.logout().await),
        Command::Servers => {
            let servers = manager.saved_servers();
            if servers.is_empty() {
                println!("No saved servers");
            }
            for server in &servers {
                print_server(server);
            }
        }
        Command::Wake => {
            let report = manager.wake_all_servers().await;
            println!("Sent {} wake packets, {} failed", report.sent, report.failed);
        }
    }

    Ok(())
}

fn print_outcome(outcome: &ConnectionOutcome) {
    println!("{}", outcome.state.display_name());
    if let Some(client) = &outcome.client {
        println!("  via {} ({:?})", client.address(), client.mode());
    }
    for server in &outcome.servers {
        print_server(server);
    }
}

fn print_server(server: &ServerDescriptor) {
    let signed_in = if server.has_access_token() { "*" } else { " " };
    println!(
        "{} {:<24} {:<36} local={} remote={}",
        signed_in,
        server.name,
        server.id,
        server.local_address().unwrap_or("-"),
        server.remote_address().unwrap_or("-"),
    );
}
