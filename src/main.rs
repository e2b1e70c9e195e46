use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bank_ledger::api::{self, AppState};
use bank_ledger::auth::TokenSigner;
use bank_ledger::config::Config;
use bank_ledger::domain::{Email, Password, display_name};
use bank_ledger::store::{MemoryStore, StoreHandle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    match config.log_level {
        Some(log_level) => tracing_subscriber::fmt().with_max_level(log_level).init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init(),
    }

    let store = match &config.data_file {
        Some(path) => MemoryStore::open(path).context("opening account snapshot")?,
        None => MemoryStore::new(),
    };
    let store = StoreHandle::new(store)
        .with_timeout(config.store_timeout())
        .with_read_retries(config.read_retries);
    let signer = TokenSigner::new(config.token_secret.as_bytes(), config.token_ttl());
    let state = AppState::new(store, signer);

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        let seeded = state
            .accounts
            .seed_admin(
                display_name(&config.admin_name)?,
                Email::parse(email)?,
                Password::parse(password.clone())?,
            )
            .await?;
        if seeded.is_none() {
            info!(%email, "Administrator account already present");
        }
    }

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!(addr = %config.bind, "Ledger service listening");
    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}
