//! Giftbox CLI - command-line front end for the encrypted gift store.
//!
//! This binary is a thin stand-in for a request-handling layer: every
//! subcommand maps onto one operation of the core's request boundary and
//! prints the result as JSON.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Password;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use giftbox_core::{config, GiftStore, VERSION};

/// Giftbox - an encrypted, single-file gift-claiming store
#[derive(Parser)]
#[command(name = "giftbox")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the encrypted store file
    #[arg(short, long, global = true, env = "GIFTBOX_PATH", default_value = "giftbox.store")]
    store: PathBuf,

    /// Bearer token from a previous register/login
    #[arg(short, long, global = true, env = "GIFTBOX_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the store file (a no-op if it already exists)
    Init,

    /// Register a new user and print the bearer token
    Register {
        /// Phone number used as the login key
        phone: String,

        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Log in and print a fresh bearer token
    Login {
        phone: String,

        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Show the user behind the current token
    Whoami,

    /// Gift operations
    #[command(subcommand)]
    Gift(GiftCommands),

    /// Session maintenance
    #[command(subcommand)]
    Sessions(SessionCommands),

    /// Write the raw encrypted envelope to a file (admin)
    Backup {
        /// Destination path
        #[arg(value_name = "PATH")]
        output: PathBuf,
    },

    /// Print the decrypted document with secrets stripped (admin)
    Export {
        /// Account password, re-verified before disclosure (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Replace the whole document from a JSON file (admin)
    Restore {
        /// JSON file with { users, gifts, sessions }
        #[arg(value_name = "PATH")]
        input: PathBuf,

        /// Account password, re-verified first (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
enum GiftCommands {
    /// Create a gift (admin)
    Add {
        /// Gift kind: link, text, qr, or any other tag
        kind: String,

        /// The reward content (URL, message, QR payload)
        content: String,
    },

    /// List gifts through the viewer's visibility filter
    List,

    /// Claim a gift and print its content
    Claim {
        /// Gift id
        id: Uuid,

        /// Your own phone number (must match the token's user)
        phone: String,

        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Remove expired sessions (admin)
    Cleanup,
}

fn prompt_password(supplied: Option<String>) -> Result<String> {
    match supplied {
        Some(password) => Ok(password),
        None => Password::new()
            .with_prompt("Password")
            .interact()
            .context("Failed to read password"),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let passphrase = config::passphrase_from_env();
    let store = GiftStore::open(&cli.store, &passphrase)
        .with_context(|| format!("Failed to open store at {}", cli.store.display()))?;

    let token = cli.token.as_deref();

    match cli.command {
        Commands::Init => {
            println!("Store ready at {}", cli.store.display());
        }

        Commands::Register { phone, password } => {
            let password = prompt_password(password)?;
            let grant = store.register(&phone, &password)?;
            print_json(&grant)?;
        }

        Commands::Login { phone, password } => {
            let password = prompt_password(password)?;
            let grant = store.login(&phone, &password)?;
            print_json(&grant)?;
        }

        Commands::Whoami => {
            let user = store.authenticate(token)?;
            print_json(&user)?;
        }

        Commands::Gift(GiftCommands::Add { kind, content }) => {
            let gift = store.create_gift(token, &kind, &content)?;
            print_json(&gift)?;
        }

        Commands::Gift(GiftCommands::List) => {
            let views = store.list_gifts(token)?;
            print_json(&views)?;
        }

        Commands::Gift(GiftCommands::Claim { id, phone, password }) => {
            let password = prompt_password(password)?;
            let outcome = store.claim_gift(token, id, &phone, &password)?;
            print_json(&outcome)?;
        }

        Commands::Sessions(SessionCommands::Cleanup) => {
            let stats = store.cleanup_sessions(token)?;
            print_json(&stats)?;
        }

        Commands::Backup { output } => {
            let bytes = store.download_encrypted(token)?;
            fs::write(&output, &bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Wrote {} bytes to {}", bytes.len(), output.display());
        }

        Commands::Export { password } => {
            let password = prompt_password(password)?;
            let sanitized = store.download_decrypted(token, &password)?;
            print_json(&sanitized)?;
        }

        Commands::Restore { input, password } => {
            let password = prompt_password(password)?;
            let raw: serde_json::Value = serde_json::from_slice(
                &fs::read(&input)
                    .with_context(|| format!("Failed to read {}", input.display()))?,
            )
            .context("Restore input is not valid JSON")?;
            let stats = store.restore(token, &password, raw)?;
            print_json(&stats)?;
        }
    }

    Ok(())
}
