use anyhow::{anyhow, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::env;
use std::path::PathBuf;

mod credentials;
mod utils;

use crate::credentials::{load_credentials, save_credentials, Credentials};
use zapdesk::evolution::send::SendText;
use zapdesk::evolution::{AuthConfig, EvolutionClient};

/// Command line arguments for zapdesk
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "zapdesk: a CLI CRM client for Evolution API WhatsApp instances.",
    long_about = "zapdesk talks to an Evolution API gateway, unifies its chat \
    records into one contact per real identity, and normalizes message history.\n\n\
    Credentials can be supplied via EVOLUTION_URL, EVOLUTION_INSTANCE and \
    EVOLUTION_API_KEY, or interactively on `zapdesk login`."
)]
struct Args {
    /// Override the directory used for stored credentials
    #[arg(long, value_name = "PATH")]
    config_dir: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log more (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify credentials against the gateway and store them
    Login,
    /// Show the instance connection / pairing state
    Connect,
    /// List unified contacts, most recently active first
    Chats,
    /// Show one thread's messages in chronological order
    Messages {
        /// Contact id: a phone number or JID
        id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 25)]
        limit: u32,
    },
    /// Send a text message
    Send {
        /// Destination number or JID
        number: String,
        /// Message body
        text: String,
    },
}

/// Prompts the user for gateway credentials or uses environment variables
fn prompt_credentials() -> (String, String, String) {
    let base_url = env::var("EVOLUTION_URL").unwrap_or_else(|_| {
        eprintln!("Enter Evolution API base URL (e.g., https://api.example.com):");
        utils::read_line().unwrap_or_default()
    });

    let instance_name = env::var("EVOLUTION_INSTANCE").unwrap_or_else(|_| {
        eprintln!("Enter instance name:");
        utils::read_line().unwrap_or_default()
    });

    let api_key = env::var("EVOLUTION_API_KEY").unwrap_or_else(|_| {
        eprintln!("Enter api key:");
        utils::read_line().unwrap_or_default()
    });

    (base_url, instance_name, api_key)
}

fn stored_auth_config() -> Result<AuthConfig> {
    match load_credentials()? {
        Some(stored) => stored
            .to_auth_config()
            .ok_or_else(|| anyhow!("Stored credentials have no api key; run `zapdesk login` again")),
        None => Err(anyhow!("No stored credentials; run `zapdesk login` first")),
    }
}

async fn run_login() -> Result<()> {
    let (base_url, instance_name, api_key) = prompt_credentials();
    let config = AuthConfig {
        base_url: base_url.clone(),
        instance_name: instance_name.clone(),
        api_key: api_key.clone(),
    };

    let client = EvolutionClient::new(config);
    client.verify_credentials().await?;

    save_credentials(&Credentials::new(&base_url, &instance_name, &api_key))?;
    println!("Credentials verified and saved for instance {}", instance_name);
    Ok(())
}

async fn run_connect() -> Result<()> {
    let client = EvolutionClient::new(stored_auth_config()?);
    let payload = client.connect_instance().await?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

async fn run_chats() -> Result<()> {
    let client = EvolutionClient::new(stored_auth_config()?);
    let contacts = client.fetch_chats().await?;

    if contacts.is_empty() {
        println!("No chats found.");
        return Ok(());
    }

    for contact in &contacts {
        let unread = if contact.unread_count > 0 {
            format!(" [{}]", contact.unread_count)
        } else {
            String::new()
        };
        let kind = if contact.is_group { " (group)" } else { "" };
        println!(
            "{:<20} {}{}{}  {}  {}",
            contact.number, contact.name, kind, unread, contact.last_message_time, contact.last_message
        );
    }
    println!("{} contacts", contacts.len());
    Ok(())
}

async fn run_messages(id: &str, page: u32, limit: u32) -> Result<()> {
    let client = EvolutionClient::new(stored_auth_config()?);
    let messages = client.fetch_messages(id, page, limit).await?;

    if messages.is_empty() {
        println!("No messages on page {}.", page);
        return Ok(());
    }

    for message in &messages {
        println!(
            "[{}] {:>4} ({}): {}",
            message.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            message.sender,
            message.status,
            message.text
        );
    }
    Ok(())
}

async fn run_send(number: &str, text: &str) -> Result<()> {
    let client = EvolutionClient::new(stored_auth_config()?);
    client.send_text(&SendText::new(number, text)).await?;
    println!("Message sent to {}", number);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(dir) = &args.config_dir {
        credentials::set_config_dir_override(dir.clone());
    }

    let level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    utils::setup_logging(args.log_file.as_deref(), level)?;

    match args.command {
        Command::Login => run_login().await,
        Command::Connect => run_connect().await,
        Command::Chats => run_chats().await,
        Command::Messages { id, page, limit } => run_messages(&id, page, limit).await,
        Command::Send { number, text } => run_send(&number, &text).await,
    }
}
