pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod pnl;
pub mod services;
pub mod sources;
pub mod workerpool;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DocumentStore;
use crate::services::wallet_tracker::WalletTrackerManager;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: AppConfig,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    pub tracker: Arc<WalletTrackerManager>,
}
