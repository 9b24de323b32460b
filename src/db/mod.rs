pub mod memory_store;
pub mod pg_store;
pub mod store;
pub mod wallet_repo;

pub use memory_store::MemoryStore;
pub use pg_store::PgDocumentStore;
pub use store::{filter_eq, Document, DocumentStore, Filter, SortBy, StoreError};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    // Verify connectivity
    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(pool)
}

/// Apply the bundled schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
