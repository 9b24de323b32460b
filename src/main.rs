use std::sync::Arc;

use anyhow::Context;

use pnlscan::api::router::create_router;
use pnlscan::config::AppConfig;
use pnlscan::db::{self, DocumentStore, MemoryStore, PgDocumentStore};
use pnlscan::models::ScanRequest;
use pnlscan::pnl::{ScanError, ScanOutcome, WalletScanner};
use pnlscan::services::discovery::DiscoveryService;
use pnlscan::services::rescan::rescan_all_time;
use pnlscan::services::wallet_tracker::WalletTrackerManager;
use pnlscan::sources::{ActivityClient, ChainProfile};
use pnlscan::workerpool::{CancelReason, CancelSignal, WorkerPool};
use pnlscan::AppState;

const USAGE: &str = "usage: pnlscan [serve | scan <chain> <wallet> <days> | topholder <chain> <token> | toptrader <chain> <token> | rescan <chain>]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let store = build_store(&config).await?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        [] | ["serve"] => serve(config, store).await,
        ["scan", chain, wallet, days] => {
            let days: u32 = days.parse().context("days must be a non-negative integer")?;
            scan(&config, store, chain, wallet, days).await
        }
        ["topholder", chain, token] => {
            let service = discovery(&config, store, chain)?;
            let report = service.scan_top_holders(token).await?;
            tracing::info!(report = ?report, "Top holder scan done");
            Ok(())
        }
        ["toptrader", chain, token] => {
            let service = discovery(&config, store, chain)?;
            let report = service.scan_top_traders(token).await?;
            tracing::info!(report = ?report, "Top trader scan done");
            Ok(())
        }
        ["rescan", chain] => {
            let (scanner, _) = build_scanner(&config, store, chain)?;
            let pool = WorkerPool::new(config.scan_pool());
            let summary = rescan_all_time(&scanner, &pool).await?;
            pool.shutdown().await;
            tracing::info!(summary = ?summary, "Rescan done");
            Ok(())
        }
        _ => anyhow::bail!(USAGE),
    }
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = db::init_pool(url).await?;
            db::migrate(&pool).await?;
            tracing::info!("Database connected");
            Ok(Arc::new(PgDocumentStore::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, scan results are kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn build_scanner(
    config: &AppConfig,
    store: Arc<dyn DocumentStore>,
    chain: &str,
) -> anyhow::Result<(WalletScanner, Arc<ActivityClient>)> {
    let profile = ChainProfile::from_chain(chain)
        .with_context(|| format!("unsupported chain {chain}"))?
        .with_excluded(config.extra_excluded_tokens.iter().cloned());
    let client = Arc::new(ActivityClient::new(config.activity_client(&profile.chain))?);
    let scanner = WalletScanner::new(client.clone(), store, profile);
    Ok((scanner, client))
}

fn discovery(config: &AppConfig, store: Arc<dyn DocumentStore>, chain: &str) -> anyhow::Result<DiscoveryService> {
    let (scanner, client) = build_scanner(config, store, chain)?;
    let pool = WorkerPool::new(config.scan_pool());
    Ok(DiscoveryService::new(scanner, client, pool, config.discovery()))
}

async fn scan(
    config: &AppConfig,
    store: Arc<dyn DocumentStore>,
    chain: &str,
    wallet: &str,
    days: u32,
) -> anyhow::Result<()> {
    let (scanner, _) = build_scanner(config, store, chain)?;
    let request = ScanRequest::for_days(wallet, days);

    let cancel = CancelSignal::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel(CancelReason::Canceled);
        }
    });

    match scanner.scan_wallet(&request, &cancel).await {
        Ok(ScanOutcome::Completed(pnl)) => {
            tracing::info!(
                wallet = %pnl.wallet_address,
                win_rate = %pnl.summary_review.win_rate,
                "Scan stored"
            );
            Ok(())
        }
        Ok(ScanOutcome::AlreadyScanned) => Ok(()),
        Err(ScanError::Persist { report, source }) => {
            Err(anyhow::Error::new(source).context(format!("scan of {} finished but was not stored", report.wallet_address)))
        }
        Err(e) => Err(e.into()),
    }
}

async fn serve(config: AppConfig, store: Arc<dyn DocumentStore>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let metrics_handle = pnlscan::metrics::init_metrics()?;

    let (_, client) = build_scanner(&config, store.clone(), &config.tracker_chain)?;
    let tracker = Arc::new(WalletTrackerManager::new(
        config.tracker_chain.clone(),
        client,
        WorkerPool::new(config.tracker_pool()),
        config.tracker(),
    ));

    let state = AppState {
        store,
        config,
        metrics_handle,
        tracker: tracker.clone(),
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracker.shutdown().await;
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();
}
