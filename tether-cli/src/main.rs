mod printer;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use printer::PrintingObserver;
use std::net::SocketAddr;
use std::sync::Arc;
use tether_client::{ClientConfig, RtcEngine, TetherClient};
use tether_core::{Contact, IceServerConfig};
use tether_server::ServerConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Peer-to-peer calls over a tiny signaling relay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: SocketAddr,

        /// ICE servers handed to clients; defaults to a public STUN server.
        #[arg(long = "ice")]
        ice_servers: Vec<String>,
    },

    /// Join a room and chat with whoever is there.
    Join {
        #[arg(long, default_value = "ws://127.0.0.1:8080/ws")]
        url: String,

        #[arg(long)]
        room: String,

        #[arg(long)]
        user: String,

        /// Display name; defaults to the user id.
        #[arg(long)]
        name: Option<String>,

        /// Call this contact right after joining.
        #[arg(long)]
        call: Option<String>,

        #[arg(long)]
        video: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    match Cli::parse().command {
        Commands::Serve { addr, ice_servers } => serve(addr, ice_servers).await,
        Commands::Join {
            url,
            room,
            user,
            name,
            call,
            video,
        } => {
            let name = name.unwrap_or_else(|| user.clone());
            join(url, room, Contact::new(user, name), call, video).await
        }
    }
}

async fn serve(addr: SocketAddr, ice_servers: Vec<String>) -> Result<()> {
    let mut config = ServerConfig::new(addr);
    if !ice_servers.is_empty() {
        config.ice_servers = ice_servers.into_iter().map(IceServerConfig::stun).collect();
    }

    info!("Starting relay on {} with {} ICE servers", addr, config.ice_servers.len());
    println!(
        "{} {}",
        "Relay listening on".green().bold(),
        format!("ws://{addr}/ws").cyan()
    );
    tether_server::serve(config).await
}

async fn join(
    url: String,
    room: String,
    user: Contact,
    call: Option<String>,
    video: bool,
) -> Result<()> {
    let mut config = ClientConfig::new(url, user);
    config.auto_call_video = video;

    info!("Joining room '{}' at {}", room, config.transport.url);
    let engine = RtcEngine::new().context("Failed to set up the media engine")?;
    let client = TetherClient::new(config, Arc::new(engine), Arc::new(PrintingObserver));

    client
        .join_room(&room)
        .await
        .with_context(|| format!("Failed to join room '{room}'"))?;
    println!(
        "{} {} {}",
        "Joined".green().bold(),
        room.cyan(),
        format!("as {}", client.local_contact()).dimmed()
    );

    if let Some(id) = call {
        let contact = Contact::unnamed(id.into());
        println!("{} {}", "Calling".yellow(), contact.id);
        client.call(&contact, video).await?;
    }

    println!(
        "{}",
        "Type to chat. /contacts, /hangup, /mic, /camera, /desktop, /stats and /quit are commands."
            .dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match line.trim() {
            "" => {}
            "/quit" => break,
            "/hangup" => {
                if let Err(e) = client.hangup().await {
                    println!("{} {}", "!".red(), e);
                }
            }
            "/contacts" => {
                for contact in client.contacts().await? {
                    println!("  {} {}", contact.id.as_str().cyan(), contact.display_name);
                }
            }
            command if command.starts_with('/') => {
                if let Err(e) = run_toggle(&client, command).await {
                    println!("{} {}", "!".red(), e);
                }
            }
            text => {
                if let Err(e) = client.send_message(text, None).await {
                    println!("{} {}", "!".red(), e);
                }
            }
        }
    }

    client.logout().await?;
    println!("{}", "Bye".green());
    Ok(())
}

/// `/mic on`, `/camera off`, `/desktop on`, `/stats off` and friends.
async fn run_toggle(client: &TetherClient, command: &str) -> Result<()> {
    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or_default();
    let active = match words.next() {
        Some("on") => true,
        Some("off") => false,
        _ => anyhow::bail!("usage: {name} on|off"),
    };

    match name {
        "/mic" => client.set_microphone_active(active).await?,
        "/camera" => client.set_camera_active(active).await?,
        "/desktop" => client.set_desktop_active(active).await?,
        "/stats" => client.enable_stats(active).await?,
        other => {
            warn!("Unknown command {}", other);
            anyhow::bail!("unknown command {other}");
        }
    }
    println!("{} {} {}", "*".cyan(), name.trim_start_matches('/'), if active { "on" } else { "off" });
    Ok(())
}
