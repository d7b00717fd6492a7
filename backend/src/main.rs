use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use diesel::prelude::*;

mod ai;
mod auth;
mod config;
mod db;
mod error;
mod models;
mod rentcast;
mod routes;
mod schema;
mod storage;

use ai::OpenAiClient;
use config::AppConfig;
use rentcast::RentcastClient;
use routes::AppState;
use storage::PgStorage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let config = AppConfig::load()?;
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));

    // Smoke-test the database before accepting traffic.
    let mut conn = db::establish_connection(&config.database_url)?;
    let test_query: i32 =
        diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("1")).get_result(&mut conn)?;
    log::info!("Database test query result: {}", test_query);
    drop(conn);

    if config.rentcast_api_key.is_none() {
        log::warn!("RENTCAST_API_KEY not configured - searches will persist placeholder data");
    }
    if config.openai_api_key.is_none() {
        log::warn!("OPENAI_API_KEY not configured - analysis requests will fail");
    }

    let timeout = Duration::from_secs(config.http_timeout_secs);
    let rentcast = Arc::new(RentcastClient::new(config.rentcast_api_key.clone(), timeout)?);
    let analyzer = Arc::new(OpenAiClient::new(
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        timeout,
    )?);
    let storage = Arc::new(PgStorage::new(config.database_url.clone(), rentcast));

    let state = AppState {
        config,
        storage,
        analyzer,
    };
    let app = routes::router(state);

    log::info!("Starting server on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service(),
    )
    .await?;

    Ok(())
}
