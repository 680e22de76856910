// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

mod auth;
mod handlers;
pub mod routes;

pub use auth::{CurrentUser, USER_ID_HEADER};
pub use routes::ApiResponse;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::{Config, FeedConfig};
use crate::media::MediaSigner;
use crate::notify::Notifier;
use crate::storage::Store;

/// Shared handles every handler can reach. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub notifier: Arc<dyn Notifier>,
    pub media: Arc<dyn MediaSigner>,
    pub feed: FeedConfig,
}

/// Builds the router with every route and its state, without transport
/// layers, so tests can drive it directly.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // General routes
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::get_metrics))
        // Relationship routes
        .route("/connections", get(handlers::connections::list_connections))
        .route(
            "/connections/request",
            post(handlers::connections::request_connection),
        )
        .route(
            "/connections/requests",
            get(handlers::connections::list_requests),
        )
        .route(
            "/connections/:id",
            delete(handlers::connections::remove_connection),
        )
        .route(
            "/connections/:id/accept",
            post(handlers::connections::accept_request),
        )
        .route(
            "/connections/:id/decline",
            post(handlers::connections::decline_request),
        )
        .route(
            "/connections/:id/cancel",
            delete(handlers::connections::cancel_request),
        )
        // Content routes
        .route("/posts", post(handlers::posts::create_post))
        .route("/posts/:id", get(handlers::posts::get_post))
        .route("/feed", get(handlers::posts::get_feed))
        .route("/media/presign-read", post(handlers::posts::presign_read))
        // Group routes
        .route("/groups", post(handlers::groups::create_group))
        .route("/groups/:id/join", post(handlers::groups::join_group))
        .route(
            "/groups/:id/join-requests",
            get(handlers::groups::list_join_requests),
        )
        .route(
            "/groups/:id/join-requests/:request_id/accept",
            post(handlers::groups::accept_join_request),
        )
        .route(
            "/groups/:id/join-requests/:request_id/decline",
            post(handlers::groups::decline_join_request),
        )
        .route("/groups/:id/members", get(handlers::groups::list_members))
        .route(
            "/groups/:id/members/:user_id/ban",
            post(handlers::groups::ban_member),
        )
        // Subnet routes
        .route("/subnets", post(handlers::subnets::create_subnet))
        .route(
            "/subnets/:id/members",
            get(handlers::subnets::list_members).post(handlers::subnets::add_members),
        )
        .route(
            "/subnets/:id/members/:user_id",
            delete(handlers::subnets::remove_member).patch(handlers::subnets::change_role),
        )
        // Round table routes
        .route(
            "/round-tables",
            post(handlers::round_tables::create_round_table),
        )
        .route("/round-tables/:id/join", post(handlers::round_tables::join))
        .route(
            "/round-tables/:id/join-requests",
            get(handlers::round_tables::list_join_requests),
        )
        .route(
            "/round-tables/:id/join-requests/:request_id/accept",
            post(handlers::round_tables::accept_join_request),
        )
        .route(
            "/round-tables/:id/join-requests/:request_id/decline",
            post(handlers::round_tables::decline_join_request),
        )
        .with_state(state)
}

/// Start the API server
pub async fn start_api_server(state: AppState) -> Result<()> {
    let config = Config::get();

    let app = build_router(state).layer(TraceLayer::new_for_http());
    let app = if config.api.enable_cors {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        app
    };

    let addr = format!("{}:{}", config.api.host, config.api.port).parse::<SocketAddr>()?;

    info!("Starting API server on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
