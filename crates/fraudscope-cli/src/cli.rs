//! Command-line interface definition.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password prompted unless FRAUDSCOPE_PASSWORD is set)
//! fraudscope login -e analyst@example.com
//!
//! # Second page of the transaction list
//! fraudscope tx list --page 2 --per-page 50
//!
//! # Flag a transaction as legitimate
//! fraudscope tx mark-fraud 42 --legit
//!
//! # Classify two images with a custom threshold
//! fraudscope image batch a.jpg b.jpg --threshold 0.7
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use fraudscope_core::config::StorageBackend;
use fraudscope_core::models::{PaginationParams, UpdateProfileRequest};

/// Fraudscope CLI arguments.
#[derive(Parser, Debug)]
#[command(
    name = "fraudscope",
    version,
    about = "Fraud-detection and image-classification dashboard in the terminal",
    propagate_version = true
)]
pub struct Cli {
    /// Override the backend base URL
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Override the credential storage (file, keychain, memory)
    #[arg(long, global = true, value_name = "BACKEND")]
    pub storage: Option<StorageBackend>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and store the session.
    Login {
        /// Account email; defaults to the last one used.
        #[arg(short, long, env = "FRAUDSCOPE_EMAIL")]
        email: Option<String>,

        /// Account password; prompted when absent.
        #[arg(long, env = "FRAUDSCOPE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out and forget the local session.
    Logout,

    /// Create an account (prompts for details).
    Register,

    /// Show the stored user.
    Whoami,

    /// Change password.
    Passwd,

    /// Show the profile, or update it when any field is given.
    Profile(ProfileArgs),

    /// Transactions.
    #[command(subcommand)]
    Tx(TxCommand),

    /// Fraud model.
    #[command(subcommand)]
    Predict(PredictCommand),

    /// Image model.
    #[command(subcommand)]
    Image(ImageCommand),

    /// Health and model readiness.
    Health,

    /// Everything at a glance.
    Dashboard,
}

#[derive(Args, Debug, Default)]
pub struct ProfileArgs {
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    #[arg(long)]
    pub username: Option<String>,
}

impl ProfileArgs {
    pub fn changes(&self) -> UpdateProfileRequest {
        UpdateProfileRequest {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            username: self.username.clone(),
        }
    }
}

#[derive(Args, Debug, Default, Clone, Copy)]
pub struct PagingArgs {
    #[arg(long)]
    pub page: Option<u32>,
    #[arg(long)]
    pub per_page: Option<u32>,
}

impl PagingArgs {
    /// `None` when neither value was given, so the backend defaults apply.
    pub fn params(&self) -> Option<PaginationParams> {
        match (self.page, self.per_page) {
            (None, None) => None,
            (page, per_page) => Some(PaginationParams { page, per_page }),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum TxCommand {
    /// All transactions.
    List(PagingArgs),
    /// Transactions of the signed-in user.
    My(PagingArgs),
    /// Transactions flagged as fraudulent.
    Fraud(PagingArgs),
    /// Global statistics.
    Stats,
    /// Statistics for the signed-in user.
    MyStats,
    /// One transaction.
    Show { id: i64 },
    /// Transactions of one account.
    Account {
        account_no: i64,
        #[command(flatten)]
        paging: PagingArgs,
    },
    /// Search by amount range.
    Search {
        #[arg(long)]
        min: Option<f64>,
        #[arg(long)]
        max: Option<f64>,
        #[command(flatten)]
        paging: PagingArgs,
    },
    /// Create a transaction from a JSON file.
    Create { file: PathBuf },
    /// Update a transaction from a JSON file.
    Update { id: i64, file: PathBuf },
    /// Delete a transaction.
    Delete { id: i64 },
    /// Flag a transaction as fraudulent (or legitimate with --legit).
    MarkFraud {
        id: i64,
        #[arg(long)]
        legit: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum PredictCommand {
    /// Fraud model status.
    Status,
    /// Reload the fraud model, optionally from other files.
    Reload {
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        scaler: Option<String>,
        #[arg(long)]
        stats: Option<String>,
    },
    /// Score one feature set read from a JSON file.
    Run { file: PathBuf },
    /// Score and explain one feature set read from a JSON file.
    Explain { file: PathBuf },
    /// Score a batch read from a JSON file.
    Batch { file: PathBuf },
    /// Score a stored transaction.
    Existing { id: i64 },
    /// Score every pending transaction.
    Pending,
}

#[derive(Subcommand, Debug)]
pub enum ImageCommand {
    /// Image model status.
    Status,
    /// Reload the image model.
    Reload { model_path: Option<String> },
    /// Classify one image.
    Predict {
        file: PathBuf,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Classify several images.
    Batch {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Classify an image already on the server.
    Path {
        path: String,
        #[arg(long)]
        threshold: Option<f64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(raw: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("fraudscope").chain(raw.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_paging_flags() {
        match parse(&["tx", "list", "--page", "2", "--per-page", "50"]).command {
            Command::Tx(TxCommand::List(paging)) => {
                let params = paging.params().unwrap();
                assert_eq!(params.page, Some(2));
                assert_eq!(params.per_page, Some(50));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_no_paging_flags_means_backend_defaults() {
        assert!(PagingArgs::default().params().is_none());
    }

    #[test]
    fn test_mark_fraud_legit_switch() {
        match parse(&["tx", "mark-fraud", "--legit", "7"]).command {
            Command::Tx(TxCommand::MarkFraud { id, legit }) => {
                assert_eq!(id, 7);
                assert!(legit);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_overrides_after_subcommand() {
        let cli = parse(&["health", "--storage", "memory", "--api-url", "http://localhost:8000"]);
        assert_eq!(cli.storage, Some(StorageBackend::Memory));
        assert_eq!(cli.api_url.as_deref(), Some("http://localhost:8000"));
    }

    #[test]
    fn test_image_batch_needs_files() {
        assert!(Cli::try_parse_from(["fraudscope", "image", "batch"]).is_err());
        match parse(&["image", "batch", "a.jpg", "b.jpg", "--threshold", "0.7"]).command {
            Command::Image(ImageCommand::Batch { files, threshold }) => {
                assert_eq!(files, vec![PathBuf::from("a.jpg"), PathBuf::from("b.jpg")]);
                assert_eq!(threshold, Some(0.7));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_flags_and_bad_ids_are_rejected() {
        assert!(Cli::try_parse_from(["fraudscope", "tx", "list", "--colour", "red"]).is_err());
        assert!(Cli::try_parse_from(["fraudscope", "tx", "show", "seven"]).is_err());
    }
}
