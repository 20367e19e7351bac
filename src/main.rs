mod analytics;
mod call_flow;
mod config;
mod db_types;
mod error;
mod handlers;
mod jobs;
mod menu;
mod prompts;
mod session;
mod store;
mod twilio_types;
mod types;
mod utils;
mod voice;

use crate::config::Config;
use crate::error::AppError;
use crate::jobs::PgJobRepository;
use crate::prompts::PromptCatalog;
use crate::store::PgSessionStore;
use crate::types::AppState;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

pub mod consts {
    pub const IVR_ROUTE_PREFIX: &str = "/api/ivr";
    pub const DEFAULT_LANGUAGE: &str = "hi";
    pub const MAX_SPOKEN_JOBS: usize = 3;
    pub const FACT_PAUSE_SECS: u16 = 2;
    pub const JOB_PAUSE_SECS: u16 = 1;
}

async fn setup() -> Result<(Config, Router), AppError> {
    let config = Config::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    let catalog = PromptCatalog::builtin()?;

    let app_state = Arc::new(AppState::new(
        Arc::new(PgSessionStore::new(pool.clone())),
        Arc::new(PgJobRepository::new(pool)),
        catalog,
        config.history_limit,
        config.gather_timeout_secs,
    ));
    Ok((config, handlers::router(app_state)))
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_file(true)
                .with_line_number(true),
        )
        .with(tracing_subscriber::filter::Targets::new().with_targets([
            ("hyper", tracing_subscriber::filter::LevelFilter::OFF),
            ("ivr_rs", tracing_subscriber::filter::LevelFilter::DEBUG),
            ("tower_http", tracing_subscriber::filter::LevelFilter::DEBUG),
        ]));
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let (config, app) = match setup().await {
        Ok(ready) => ready,
        Err(e) => {
            error!(error=%e, "startup failed");
            std::process::exit(1);
        }
    };

    info!(addr=%config.bind_addr, "listening");
    axum::Server::bind(&config.bind_addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}
