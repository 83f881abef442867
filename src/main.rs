use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::App;
use crate::azure::{ArmClient, ChainedCredential};
use crate::config::KeyResolver;
use crate::model::Scope;

mod app;
mod azure;
mod cache;
mod cli;
mod commands;
mod config;
mod dispatcher;
mod model;
mod navigation;
mod registry;
mod render;
mod search;
mod theme;
mod tui;
mod ui;

pub use theme::Theme;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = cli::Args::parse();
    let _guard = initialize_logging()?;
    info!(version = env!("CARGO_PKG_VERSION"), "Starting azct");

    let mut config = config::load()?;
    if let Some(ttl) = args.ttl {
        config.cache.ttl_secs = ttl;
    }

    let start = args
        .scope()
        .or_else(|| config.last_subscription.clone().map(Scope::subscription))
        .unwrap_or(Scope::Subscriptions);
    info!(scope = %start, "Starting scope");

    let resolver = Arc::new(KeyResolver::new(Arc::new(config.keybindings.clone())));
    let theme = theme::theme_from_name(&config.theme.name);
    let http = azure::build_client(Duration::from_secs(config.client.timeout_secs))?;
    let credential = Arc::new(ChainedCredential::default_chain(http));
    let client = Arc::new(ArmClient::new(&config.client, credential)?);

    let mut app = App::new(&config, client, resolver, theme, &start);
    app.run().await?;

    Ok(())
}

fn initialize_logging() -> Result<WorkerGuard> {
    let directory = dirs::data_local_dir().map_or_else(
        || std::path::PathBuf::from("logs"),
        |path| path.join("azct").join("logs"),
    );
    std::fs::create_dir_all(&directory)?;

    let file_appender = tracing_appender::rolling::daily(&directory, "azct.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true),
        )
        .init();

    Ok(guard)
}
