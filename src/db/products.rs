// Queries against the shop schema

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Connection, PgConnection};

/// Columns are cast so NUMERIC, enum and timestamp variants decode uniformly
const RANDOM_PRODUCT_QUERY: &str = r#"
SELECT id::int8 AS id,
       product_type_id::int8 AS product_type_id,
       supplier_id::int8 AS supplier_id,
       sku::text AS sku,
       name::text AS name,
       price::float8 AS price,
       description::text AS description,
       image::text AS image,
       digital,
       unit_description::text AS unit_description,
       package_dimensions::text AS package_dimensions,
       weight_in_pounds::text AS weight_in_pounds,
       reorder_amount::int8 AS reorder_amount,
       status::text AS status,
       requires_shipping,
       warehouse_location::text AS warehouse_location,
       created_at::timestamptz AS created_at,
       updated_at::timestamptz AS updated_at
FROM products
ORDER BY RANDOM()
LIMIT 1
"#;

const PUBLIC_TABLES_QUERY: &str =
    "SELECT table_name::text FROM information_schema.tables WHERE table_schema = 'public'";

/// A row of the `products` table
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub product_type_id: i64,
    pub supplier_id: i64,
    pub sku: String,
    pub name: String,
    pub price: f64,
    #[serde(skip_serializing_if = "is_blank")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub image: Option<String>,
    pub digital: bool,
    #[serde(skip_serializing_if = "is_blank")]
    pub unit_description: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub package_dimensions: Option<String>,
    #[serde(skip_serializing_if = "is_blank")]
    pub weight_in_pounds: Option<String>,
    pub reorder_amount: i64,
    pub status: String,
    pub requires_shipping: bool,
    #[serde(skip_serializing_if = "is_blank")]
    pub warehouse_location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

/// Pick one product at random
pub async fn fetch_random_product(conn: &mut PgConnection) -> Result<Product, sqlx::Error> {
    sqlx::query_as::<_, Product>(RANDOM_PRODUCT_QUERY)
        .fetch_one(&mut *conn)
        .await
}

pub async fn ping(conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    conn.ping().await
}

/// Names of the tables in the `public` schema
pub async fn list_tables(conn: &mut PgConnection) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(PUBLIC_TABLES_QUERY)
        .fetch_all(&mut *conn)
        .await
}
