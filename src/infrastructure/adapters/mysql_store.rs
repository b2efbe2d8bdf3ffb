use async_trait::async_trait;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::money::Money;
use crate::domain::payment::Provider;
use crate::infrastructure::config::ProviderConfig;
use crate::ports::{
    CartEntry, CartReader, CatalogItem, CatalogReader, PaymentMethodSummary, ProviderConfigStore,
};

/// Read-only catalog view over the product_items table.
#[derive(Clone)]
pub struct MySqlCatalogReader {
    pool: Arc<Pool<MySql>>,
}

impl MySqlCatalogReader {
    pub fn new(pool: Arc<Pool<MySql>>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogReader for MySqlCatalogReader {
    async fn find_item(&self, product_item_id: &str) -> DomainResult<Option<CatalogItem>> {
        let row = sqlx::query_as::<_, CatalogRow>(
            "SELECT id, name, price_cents, discount_cents FROM product_items WHERE id = ?",
        )
        .bind(product_item_id)
        .fetch_optional(self.pool.as_ref())
        .await?;
        Ok(row.map(|r| CatalogItem {
            id: r.id,
            name: r.name,
            price: Money::from_cents(r.price_cents),
            discount: Money::from_cents(r.discount_cents),
        }))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CatalogRow {
    id: String,
    name: String,
    price_cents: i64,
    discount_cents: i64,
}

/// Read-only cart view. Order creation never mutates cart rows.
#[derive(Clone)]
pub struct MySqlCartReader {
    pool: Arc<Pool<MySql>>,
}

impl MySqlCartReader {
    pub fn new(pool: Arc<Pool<MySql>>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartReader for MySqlCartReader {
    async fn find_entries(
        &self,
        user_id: &str,
        uuids: &[String],
    ) -> DomainResult<Vec<CartEntry>> {
        if uuids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; uuids.len()].join(", ");
        let query = format!(
            "SELECT uuid, user_id, product_item_id, quantity FROM carts
             WHERE user_id = ? AND uuid IN ({placeholders})"
        );
        let mut q = sqlx::query_as::<_, CartRow>(&query).bind(user_id);
        for uuid in uuids {
            q = q.bind(uuid);
        }
        let rows = q.fetch_all(self.pool.as_ref()).await?;
        Ok(rows
            .into_iter()
            .map(|r| CartEntry {
                uuid: r.uuid,
                user_id: r.user_id,
                product_item_id: r.product_item_id,
                quantity: r.quantity,
            })
            .collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    uuid: String,
    user_id: String,
    product_item_id: String,
    quantity: u32,
}

/// Provider credential blobs in the payment_methods table. Blobs go in
/// through `store` and only ever come back out through `load`, already
/// decoded; the admin surface never sees them again.
#[derive(Clone)]
pub struct MySqlProviderConfigStore {
    pool: Arc<Pool<MySql>>,
}

impl MySqlProviderConfigStore {
    pub fn new(pool: Arc<Pool<MySql>>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProviderConfigStore for MySqlProviderConfigStore {
    async fn load(&self, provider: Provider) -> DomainResult<ProviderConfig> {
        let row: Option<(Option<serde_json::Value>,)> =
            sqlx::query_as("SELECT config FROM payment_methods WHERE code = ? AND enabled = 1")
                .bind(provider.as_code())
                .fetch_optional(self.pool.as_ref())
                .await?;
        let raw = row
            .and_then(|(config,)| config)
            .ok_or_else(|| {
                DomainError::Configuration(format!("no config stored for {provider}"))
            })?;
        ProviderConfig::decode(provider, &raw)
    }

    async fn store(&self, provider: Provider, raw: serde_json::Value) -> DomainResult<()> {
        let rows_affected = sqlx::query(
            "UPDATE payment_methods SET config = ?, updated_at = ? WHERE code = ?",
        )
        .bind(&raw)
        .bind(chrono::Utc::now())
        .bind(provider.as_code())
        .execute(self.pool.as_ref())
        .await?
        .rows_affected();
        if rows_affected == 0 {
            return Err(DomainError::not_found("payment method", provider.as_code()));
        }
        debug!(provider = %provider, "payment method config replaced");
        Ok(())
    }

    async fn list_methods(&self) -> DomainResult<Vec<PaymentMethodSummary>> {
        let rows = sqlx::query_as::<_, MethodRow>(
            "SELECT code, name, enabled, config IS NOT NULL AS is_config FROM payment_methods",
        )
        .fetch_all(self.pool.as_ref())
        .await?;
        rows.into_iter()
            .map(|r| {
                Ok(PaymentMethodSummary {
                    provider: Provider::from_code(&r.code)?,
                    name: r.name,
                    enabled: r.enabled,
                    is_config: r.is_config != 0,
                })
            })
            .collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MethodRow {
    code: String,
    name: String,
    enabled: bool,
    // MySQL reports the IS NOT NULL expression as an integer, not a bool.
    is_config: i64,
}
