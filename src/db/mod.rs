// Database module
// Token-authenticated Postgres connections and product queries

mod params;
mod products;
mod provider;

pub use params::{ConnectionParameters, DatabaseConfig, POSTGRES_PORT, SSL_MODE_REQUIRE};
pub use products::{fetch_random_product, list_tables, ping, Product};
pub use provider::{ConnectionProvider, DATABASE_SCOPE, TOKEN_REFRESH_MARGIN_SECS};

use sqlx::{Connection, PgConnection};

/// Close a connection, logging rather than propagating failures so the
/// caller's own result wins
pub async fn close(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        tracing::warn!("Failed to close database connection: {}", e);
    }
}
