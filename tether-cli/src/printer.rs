use async_trait::async_trait;
use colored::*;
use tether_client::{ConnectionStats, Error, RemoteTrack, SessionObserver};
use tether_core::{ChatMessage, ConnectionState, Contact, NegotiationState};

/// Prints session events to stdout.
pub struct PrintingObserver;

#[async_trait]
impl SessionObserver for PrintingObserver {
    async fn on_contact_joined(&self, contact: &Contact) {
        println!("{} {}", "+".green().bold(), contact);
    }

    async fn on_contact_left(&self, contact: &Contact) {
        println!("{} {}", "-".red().bold(), contact);
    }

    async fn on_negotiation_state(&self, contact: &Contact, state: NegotiationState) {
        println!("{} {:?}", format!("[{}]", contact.id).dimmed(), state);
    }

    async fn on_connection_state(&self, contact: &Contact, state: ConnectionState) {
        let line = format!("[{}] link {:?}", contact.id, state);
        match state {
            ConnectionState::Connected => println!("{}", line.green()),
            ConnectionState::Failed | ConnectionState::Disconnected => println!("{}", line.red()),
            _ => println!("{}", line.dimmed()),
        }
    }

    async fn on_remote_track(&self, contact: &Contact, track: RemoteTrack) {
        println!(
            "{} {:?} track from {}",
            "~".cyan(),
            track.kind,
            contact.display_name
        );
    }

    async fn on_remote_track_removed(&self, contact: &Contact, track: RemoteTrack) {
        println!(
            "{} {:?} track from {} ended",
            "~".dimmed(),
            track.kind,
            contact.display_name
        );
    }

    async fn on_stats(&self, contact: &Contact, stats: ConnectionStats) {
        println!(
            "{} sent {} B / {} pkts, received {} B / {} pkts",
            format!("[{}]", contact.id).dimmed(),
            stats.bytes_sent,
            stats.packets_sent,
            stats.bytes_received,
            stats.packets_received
        );
    }

    async fn on_message(&self, contact: &Contact, message: ChatMessage) {
        println!("{}: {}", contact.display_name.bold(), message.text);
    }

    async fn on_error(&self, contact: Option<&Contact>, error: &Error) {
        match contact {
            Some(contact) => println!("{} {}: {}", "!".red().bold(), contact.id, error),
            None => println!("{} {}", "!".red().bold(), error),
        }
    }
}
