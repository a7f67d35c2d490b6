//! Ekozir CLI
//!
//! Terminal front-end for the hybrid messaging codec:
//!
//! 1. **Keys**: derive and print the public key a password registers,
//!    normalize a pasted key, check a password against the policy.
//!
//! 2. **Seal**: encrypt a message for a set of recipient keys and print the
//!    transport records (one per recipient, each carrying the sender copy).
//!
//! 3. **Open**: decrypt a stored message record with your password.
//!
//! Results go to stdout; logs go to stderr.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};
use ekozir_core::{
    parse_and_validate, validate_password, CoreConfig, EkozirCore, MessageRecord, Session,
};

/// Shown in place of a message that cannot be decrypted
const UNREADABLE: &str = "could not decrypt";

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "ekozir", version, about = "Ekozir hybrid encryption toolkit")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the public key derived from a password
    PublicKey {
        /// Account password
        #[arg(long, env = "EKOZIR_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Check a password against the strength policy
    CheckPassword {
        /// Password to check
        password: String,
    },

    /// Print the canonical form of a pasted public key
    NormalizeKey {
        /// Key JSON, as pasted
        text: String,
    },

    /// Encrypt a message for one or more recipients
    Seal {
        /// Sender's password
        #[arg(long, env = "EKOZIR_SENDER_PASSWORD", hide_env_values = true)]
        password: String,

        /// Recipient public key JSON (repeatable)
        #[arg(short, long = "recipient", required = true)]
        recipients: Vec<String>,

        /// Message text
        message: String,
    },

    /// Decrypt a stored message record
    Open {
        /// Reader's password
        #[arg(long, env = "EKOZIR_PASSWORD", hide_env_values = true)]
        password: String,

        /// File holding the record JSON (stdin if omitted)
        #[arg(long)]
        record: Option<PathBuf>,
    },
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "ekozir_cli=debug,ekozir_core=debug"
    } else {
        "ekozir_cli=info,ekozir_core=info"
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    EkozirCore::initialize(CoreConfig {
        verbose_logging: cli.verbose,
    })?;

    run(cli.command, &mut io::stdin().lock(), &mut io::stdout().lock()).await
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn run(command: Command, input: &mut impl Read, out: &mut impl Write) -> Result<ExitCode> {
    match command {
        Command::PublicKey { password } => {
            let session = Session::unlock_async(password).await?;
            writeln!(out, "{}", session.public_key_json())?;
        }

        Command::CheckPassword { password } => {
            let check = validate_password(&password);
            writeln!(out, "{}", serde_json::to_string_pretty(&check)?)?;

            if !check.valid {
                tracing::info!("Password is missing: {}", check.unmet().join(", "));
                return Ok(ExitCode::FAILURE);
            }
        }

        Command::NormalizeKey { text } => match parse_and_validate(&text) {
            Some(canonical) => writeln!(out, "{}", canonical)?,
            None => {
                writeln!(out, "not a valid P-256 public key")?;
                return Ok(ExitCode::FAILURE);
            }
        },

        Command::Seal {
            password,
            recipients,
            message,
        } => {
            let session = Session::unlock_async(password).await?;
            let plan = session.build_send_plan(&message, &recipients)?;

            for failure in &plan.failures {
                tracing::warn!("Not sent to {}: {}", failure.recipient, failure.error);
            }
            tracing::info!(
                sent = plan.success_count(),
                skipped = plan.failure_count(),
                "Message sealed"
            );

            let outgoing = plan.outgoing_messages()?;
            writeln!(out, "{}", serde_json::to_string_pretty(&outgoing)?)?;

            if outgoing.is_empty() {
                return Ok(ExitCode::FAILURE);
            }
        }

        Command::Open { password, record } => {
            let text = match record {
                Some(path) => fs::read_to_string(&path)
                    .wrap_err_with(|| format!("reading {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    input.read_to_string(&mut buf)?;
                    buf
                }
            };
            let record: MessageRecord = serde_json::from_str(&text)
                .map_err(|e| eyre!("record is not a message JSON object: {}", e))?;

            let session = Session::unlock_async(password).await?;
            match session.try_open_message(&record) {
                Some(plaintext) => writeln!(out, "{}", plaintext)?,
                None => {
                    writeln!(out, "{}", UNREADABLE)?;
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
