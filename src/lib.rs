#![allow(dead_code)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod core;
pub mod db;
pub mod leaderboard;
pub mod logging;
pub mod response;
pub mod routes;
pub mod search;
pub mod services;
pub mod state;
pub mod workers;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub async fn create_app() -> axum::Router {
    let db_proxy = match db::DatabaseProxy::from_env().await {
        Ok(proxy) => Some(proxy),
        Err(_) => None,
    };

    let state = AppState::from_env(db_proxy).await;

    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
