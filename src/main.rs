use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use wallet_vault::config::{self, parse_store, DEFAULT_STORE_PATH};
use wallet_vault::models::SecretKind;
use wallet_vault::quiz::{MnemonicQuiz, QuizOutcome};
use wallet_vault::secrets::StoreBackend;
use wallet_vault::wallet::generate_mnemonic;
use wallet_vault::{AppController, AuthState, ErrorReport, Result, VaultConfig, VaultError};

#[derive(Parser)]
#[command(name = "wallet-vault", version, about = "Password-protected wallet credential vault")]
struct Cli {
    /// Secure storage backend (keyring, file, memory)
    #[arg(long, global = true)]
    store: Option<String>,

    /// Path of the file store
    #[arg(long, global = true)]
    store_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show whether a wallet is stored
    Status,
    /// Generate a new recovery phrase, verify it and store the wallet
    Create {
        #[arg(long, env = "WALLET_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        confirm: Option<String>,
    },
    /// Import a 12-word recovery phrase
    ImportMnemonic {
        #[arg(long)]
        phrase: String,
        #[arg(long, env = "WALLET_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        confirm: Option<String>,
    },
    /// Import a raw private key
    ImportKey {
        #[arg(long)]
        key: String,
        #[arg(long, env = "WALLET_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        confirm: Option<String>,
    },
    /// Unlock and print the wallet address
    Unlock {
        #[arg(long, env = "WALLET_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Print a stored secret
    Reveal {
        #[arg(long, env = "WALLET_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, value_enum, default_value = "private-key")]
        what: RevealTarget,
    },
    /// Re-encrypt the wallet under a new password
    ChangePassword {
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: Option<String>,
    },
    /// Delete the stored wallet
    Logout,
}

#[derive(Clone, Copy, ValueEnum)]
enum RevealTarget {
    PrivateKey,
    Mnemonic,
}

impl From<RevealTarget> for SecretKind {
    fn from(target: RevealTarget) -> Self {
        match target {
            RevealTarget::PrivateKey => SecretKind::PrivateKey,
            RevealTarget::Mnemonic => SecretKind::Mnemonic,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    config::load_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            let report = ErrorReport::from(e);
            match serde_json::to_string(&report) {
                Ok(json) => eprintln!("{}", json),
                Err(_) => eprintln!("{}: {}", report.code, report.message),
            }
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<VaultConfig> {
    let mut config = VaultConfig::from_env()?;

    if let Some(store) = &cli.store {
        let path = cli
            .store_path
            .clone()
            .or_else(|| match &config.store {
                StoreBackend::File(p) => Some(p.clone()),
                _ => None,
            })
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));
        config.store = parse_store(store, path)?;
    } else if let Some(path) = &cli.store_path {
        config.store = StoreBackend::File(path.clone());
    }

    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let mut app = AppController::from_config(&config);
    let state = app.bootstrap().await;

    match cli.command {
        Command::Status => {
            match state {
                AuthState::NoWallet => println!("no wallet"),
                _ => println!("locked"),
            }
            Ok(())
        }
        Command::Create { password, confirm } => {
            let confirm = confirm.unwrap_or_else(|| password.clone());
            let mnemonic = generate_mnemonic()?;

            println!("Write down your recovery phrase:\n");
            for (i, word) in mnemonic.split(' ').enumerate() {
                println!("{:>2}. {}", i + 1, word);
            }
            println!();

            run_quiz(&mnemonic).await?;
            let session = app.create_wallet(&mnemonic, &password, &confirm).await?;
            println!("{}", session.address());
            Ok(())
        }
        Command::ImportMnemonic {
            phrase,
            password,
            confirm,
        } => {
            let confirm = confirm.unwrap_or_else(|| password.clone());
            let session = app.import_mnemonic(&phrase, &password, &confirm).await?;
            println!("{}", session.address());
            Ok(())
        }
        Command::ImportKey {
            key,
            password,
            confirm,
        } => {
            let confirm = confirm.unwrap_or_else(|| password.clone());
            let session = app.import_private_key(&key, &password, &confirm).await?;
            println!("{}", session.address());
            Ok(())
        }
        Command::Unlock { password } => {
            let session = app.unlock(&password).await?;
            println!("{}", session.address());
            println!(
                "{} (chain {}, {})",
                session.network().name,
                session.network().chain_id,
                session.network().explorer_url
            );
            Ok(())
        }
        Command::Reveal { password, what } => {
            app.unlock(&password).await?;
            let secret = app.reveal(&password, what.into()).await?;
            println!("{}", secret.as_str());
            Ok(())
        }
        Command::ChangePassword { old, new, confirm } => {
            let confirm = confirm.unwrap_or_else(|| new.clone());
            app.unlock(&old).await?;
            app.open_password_change()?;
            app.verify_current_password(&old).await?;
            app.confirm_new_password(&new, &confirm).await?;
            println!("password changed");
            Ok(())
        }
        Command::Logout => {
            app.logout().await?;
            println!("wallet removed");
            Ok(())
        }
    }
}

/// Ask for three words of the phrase until each one is right
async fn run_quiz(mnemonic: &str) -> Result<()> {
    let mut quiz = MnemonicQuiz::new(mnemonic)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Confirm your phrase. Choose from: {}", quiz.pool().join(" "));

    while let Some(position) = quiz.prompt_position() {
        println!("Word #{}:", position);
        let line = lines
            .next_line()
            .await
            .map_err(|e| VaultError::InvalidState(format!("failed to read stdin: {}", e)))?
            .ok_or_else(|| VaultError::InvalidState("verification aborted".to_string()))?;

        match quiz.select(line.trim()) {
            QuizOutcome::Mismatch => {
                if let Some(message) = quiz.error() {
                    println!("{}", message);
                }
            }
            QuizOutcome::Advanced | QuizOutcome::Completed => {}
        }
    }
    Ok(())
}
