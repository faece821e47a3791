//! Command handlers. Each prints its result as pretty JSON on stdout.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use fraudscope_core::config::Config;
use fraudscope_core::models::{
    BatchPredictionRequest, CreateTransactionRequest, RegisterRequest, ReloadModelRequest,
    SearchParams, UpdateTransactionRequest,
};
use fraudscope_core::queries::ImageFile;
use fraudscope_core::{ApiResult, AppContext};

use crate::cli::{Command, ImageCommand, PredictCommand, ProfileArgs, TxCommand};

/// Run one parsed command against the application context.
pub async fn run(ctx: &AppContext, config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Login { email, password } => login(ctx, config, email, password).await,
        Command::Logout => logout(ctx).await,
        Command::Register => register(ctx).await,
        Command::Whoami => whoami(ctx),
        Command::Passwd => passwd(ctx).await,
        Command::Profile(args) => profile(ctx, &args).await,
        Command::Tx(command) => transactions(ctx, command).await,
        Command::Predict(command) => predict(ctx, command).await,
        Command::Image(command) => image(ctx, command).await,
        Command::Health => health(ctx).await,
        Command::Dashboard => dashboard(ctx).await,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Turn an API error into the message a user should see.
fn shown<T>(result: ApiResult<T>, fallback: &str) -> Result<T> {
    result.map_err(|e| {
        tracing::debug!(error = %e, "Command failed");
        anyhow!(e.user_message(fallback))
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_password(label: &str) -> Result<String> {
    rpassword::prompt_password(format!("{}: ", label)).context("Failed to read password")
}

// ============================================================================
// Session
// ============================================================================

async fn login(
    ctx: &AppContext,
    config: &Config,
    email: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt("Email")?,
    };
    let password = match password.filter(|p| !p.is_empty()) {
        Some(password) => password,
        None => prompt_password("Password")?,
    };

    let response = shown(ctx.auth().login(&email, &password).await, "Login failed")?;

    if let Err(e) = Config::remember_email(&email) {
        tracing::warn!(error = %e, "Failed to save config");
    }
    print_json(&json!({
        "message": response.message.unwrap_or_else(|| "Logged in".to_string()),
        "user": response.data.user,
    }))
}

async fn logout(ctx: &AppContext) -> Result<()> {
    let response = shown(ctx.auth().logout().await, "Logout failed")?;
    print_json(&json!({
        "message": response.message.unwrap_or_else(|| "Logged out".to_string())
    }))
}

async fn register(ctx: &AppContext) -> Result<()> {
    let request = RegisterRequest {
        email: prompt("Email")?,
        username: prompt("Username")?,
        first_name: prompt("First name")?,
        last_name: prompt("Last name")?,
        password: prompt_password("Password")?,
    };
    if prompt_password("Confirm password")? != request.password {
        bail!("Passwords do not match");
    }
    let response = shown(ctx.auth().register(&request).await, "Registration failed")?;
    print_json(&response)
}

fn whoami(ctx: &AppContext) -> Result<()> {
    match ctx.auth().current_user() {
        Some(user) => print_json(&user),
        None => bail!("Not logged in"),
    }
}

async fn passwd(ctx: &AppContext) -> Result<()> {
    let current = prompt_password("Current password")?;
    let new = prompt_password("New password")?;
    if prompt_password("Confirm new password")? != new {
        bail!("Passwords do not match");
    }
    let response = shown(
        ctx.auth().change_password(&current, &new).await,
        "Password change failed",
    )?;
    print_json(&response)
}

async fn profile(ctx: &AppContext, args: &ProfileArgs) -> Result<()> {
    let changes = args.changes();
    let response = if changes.is_empty() {
        shown(ctx.profile().get().await, "Could not load profile")?
    } else {
        shown(ctx.profile().update(&changes).await, "Profile update failed")?
    };
    print_json(&response.data)
}

// ============================================================================
// Transactions
// ============================================================================

async fn transactions(ctx: &AppContext, command: TxCommand) -> Result<()> {
    let txs = ctx.transactions();
    match command {
        TxCommand::List(paging) => {
            print_json(&shown(txs.list(paging.params()).await, "Could not load transactions")?)
        }
        TxCommand::My(paging) => {
            print_json(&shown(txs.my(paging.params()).await, "Could not load transactions")?)
        }
        TxCommand::Fraud(paging) => print_json(&shown(
            txs.fraud(paging.params()).await,
            "Could not load fraudulent transactions",
        )?),
        TxCommand::Stats => {
            print_json(&shown(txs.stats().await, "Could not load statistics")?.stats)
        }
        TxCommand::MyStats => {
            print_json(&shown(txs.my_stats().await, "Could not load statistics")?.stats)
        }
        TxCommand::Show { id } => {
            print_json(&shown(txs.detail(id).await, "Could not load transaction")?.data)
        }
        TxCommand::Account { account_no, paging } => print_json(&shown(
            txs.by_account(account_no, paging.params()).await,
            "Could not load account transactions",
        )?),
        TxCommand::Search { min, max, paging } => {
            let params = SearchParams {
                min_amount: min,
                max_amount: max,
                paging: paging.params().unwrap_or_default(),
            };
            print_json(&shown(txs.search(params).await, "Search failed")?)
        }
        TxCommand::Create { file } => {
            let data: CreateTransactionRequest = read_json(&file)?;
            let response = shown(txs.create(&data).await, "Error while creating the transaction")?;
            info!(id = response.data.id, "Created transaction");
            print_json(&response)
        }
        TxCommand::Update { id, file } => {
            let data: UpdateTransactionRequest = read_json(&file)?;
            print_json(&shown(txs.update(id, &data).await, "Error while updating the transaction")?)
        }
        TxCommand::Delete { id } => {
            print_json(&shown(txs.delete(id).await, "Error while deleting the transaction")?)
        }
        TxCommand::MarkFraud { id, legit } => print_json(&shown(
            txs.mark_fraud(id, !legit).await,
            "Error while marking the transaction",
        )?),
    }
}

// ============================================================================
// Fraud model
// ============================================================================

async fn predict(ctx: &AppContext, command: PredictCommand) -> Result<()> {
    let predictions = ctx.predictions();
    match command {
        PredictCommand::Status => {
            print_json(&shown(predictions.status().await, "Could not load model status")?)
        }
        PredictCommand::Reload { model, scaler, stats } => {
            let paths = ReloadModelRequest {
                model_path: model,
                scaler_path: scaler,
                stats_path: stats,
            };
            print_json(&shown(predictions.reload(&paths).await, "Model reload failed")?)
        }
        PredictCommand::Run { file } => {
            let features = read_json(&file)?;
            print_json(&shown(predictions.predict(&features).await, "Prediction failed")?)
        }
        PredictCommand::Explain { file } => {
            let features = read_json(&file)?;
            print_json(&shown(predictions.explain(&features).await, "Explanation failed")?)
        }
        PredictCommand::Batch { file } => {
            let batch: BatchPredictionRequest = read_json(&file)?;
            print_json(&shown(predictions.batch(&batch).await, "Batch prediction failed")?)
        }
        PredictCommand::Existing { id } => {
            print_json(&shown(predictions.predict_existing(id).await, "Prediction failed")?)
        }
        PredictCommand::Pending => print_json(&shown(
            predictions.predict_pending().await,
            "Pending predictions failed",
        )?),
    }
}

// ============================================================================
// Image model
// ============================================================================

async fn image(ctx: &AppContext, command: ImageCommand) -> Result<()> {
    let images = ctx.image_predictions();
    match command {
        ImageCommand::Status => {
            print_json(&shown(images.status().await, "Could not load model status")?)
        }
        ImageCommand::Reload { model_path } => print_json(&shown(
            images.reload(model_path.as_deref()).await,
            "Model reload failed",
        )?),
        ImageCommand::Predict { file, threshold } => {
            let file = ImageFile::read(&file)?;
            print_json(&shown(images.predict(file, threshold).await, "Image prediction failed")?)
        }
        ImageCommand::Batch { files, threshold } => {
            let files = files
                .iter()
                .map(ImageFile::read)
                .collect::<ApiResult<Vec<_>>>()?;
            print_json(&shown(images.batch(files, threshold).await, "Batch prediction failed")?)
        }
        ImageCommand::Path { path, threshold } => print_json(&shown(
            images.predict_from_path(&path, threshold).await,
            "Image prediction failed",
        )?),
    }
}

// ============================================================================
// System
// ============================================================================

async fn health(ctx: &AppContext) -> Result<()> {
    let system = ctx.system();
    let (health, models) = futures::join!(system.health(), system.model_status());
    let health = shown(health, "Health check failed")?;
    // Diagnostics are optional; readiness falls back to health alone.
    if let Err(e) = models {
        tracing::warn!(error = %e, "Model diagnostics unavailable");
    }
    print_json(&json!({
        "health": health,
        "checked": system.health_checked(),
        "readiness": system.readiness(),
    }))
}

async fn dashboard(ctx: &AppContext) -> Result<()> {
    let system = ctx.system();
    let txs = ctx.transactions();
    let predictions = ctx.predictions();
    let images = ctx.image_predictions();

    let (health, models, stats, my_stats, fraud_model, image_model) = futures::join!(
        system.health(),
        system.model_status(),
        txs.stats(),
        txs.my_stats(),
        predictions.status(),
        images.status(),
    );

    fn section<T: Serialize>(result: ApiResult<T>) -> serde_json::Value {
        match result {
            Ok(data) => serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
            Err(e) => json!({ "error": e.user_message("Unavailable") }),
        }
    }

    let readiness = system.readiness();
    print_json(&json!({
        "user": ctx.auth().current_user(),
        "readiness": readiness,
        "health_checked": system.health_checked(),
        "health": section(health),
        "model_diagnostics": section(models),
        "stats": section(stats.map(|s| s.stats)),
        "my_stats": section(my_stats.map(|s| s.stats)),
        "fraud_model": section(fraud_model),
        "image_model": section(image_model),
    }))
}
