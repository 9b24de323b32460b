use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;
use super::auth::require_auth;
use super::handlers;

pub fn create_router(state: AppState) -> Router {
    // Public routes, no authentication required
    let public = Router::new()
        .route("/health", get(handlers::ops::health_check))
        .route("/metrics", get(handlers::ops::prometheus));

    // Protected API routes: Bearer token required when API_TOKEN is set
    let protected = Router::new()
        // Wallet tracker
        .route("/api/wallettracker/add", post(handlers::tracker::add))
        .route("/api/wallettracker/delete", delete(handlers::tracker::remove))
        .route("/api/wallettracker/list", get(handlers::tracker::list))
        .route("/api/wallettracker/metrics", get(handlers::tracker::metrics))
        .route("/api/wallettracker/shutdown", post(handlers::tracker::shutdown))
        // Stored scan results
        .route("/api/wallets/:scope/:address", get(handlers::wallets::detail))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
