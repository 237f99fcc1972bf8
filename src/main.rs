// src/main.rs
mod routes;
mod handlers;
mod models;
mod database;
mod middleware;
mod state;
mod dtos;
mod error;
mod auth;
mod config;
mod scan;
mod store;

use axum::{routing::get, Router};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::fmt::init as tracing_init;
use tokio::net::TcpListener;
use dotenvy::dotenv;
use std::net::SocketAddr;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_init();

    // Load environment variables
    dotenv().ok();

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return;
        }
    };
    if config.manager_badges.is_empty() {
        tracing::warn!("MANAGER_BADGES is empty; badge overrides will always be refused");
    }

    // Create database pool
    let db_pool = match database::create_pool(&config.database_url).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create database pool");
            return;
        }
    };

    // Create application state
    let app_state = state::AppState::new(db_pool, &config);

    // Build application under /WMS base path
    let api = routes::create_router(app_state.clone())
        .route("/", get(|| async { "Stock Check API" }))
        .route("/health", get(health_check));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let app = Router::new()
        .nest("/WMS", api)
        .layer(cors)
        .with_state(app_state);

    let host = config.host;
    let base_port = config.port;

    // Try base_port..base_port+20 to avoid crash when address is in use
    let listener = {
        let mut bound = None;
        for offset in 0u16..=20 {
            let port = base_port.saturating_add(offset);
            let addr = SocketAddr::from((host, port));
            match TcpListener::bind(addr).await {
                Ok(l) => { bound = Some((l, addr)); break; }
                Err(e) => {
                    if offset == 0 { tracing::warn!(%addr, error=%e, "Port in use, trying next"); }
                }
            }
        }
        match bound {
            Some((l, addr)) => {
                tracing::info!("Server running on {}", addr);
                l
            }
            None => {
                tracing::error!("Failed to bind to any port starting at {} on {}", base_port, host);
                return;
            }
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error=%e, "Server error");
    }
}

async fn health_check() -> &'static str {
    "OK"
}
