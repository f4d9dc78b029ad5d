//! PostgreSQL balance repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

use crate::domain::{
    AppError, BalanceObservation, BalanceRepository, BalanceSnapshot, DatabaseError, Network,
    WatchedPair,
};

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// PostgreSQL [`BalanceRepository`] with connection pooling
pub struct PostgresBalanceRepository {
    pool: PgPool,
}

impl PostgresBalanceRepository {
    /// Create a new repository with custom pool configuration
    pub async fn new(database_url: &str, config: PostgresConfig) -> Result<Self, AppError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a new repository with default pool configuration
    pub async fn with_defaults(database_url: &str) -> Result<Self, AppError> {
        Self::new(database_url, PostgresConfig::default()).await
    }

    /// Run database migrations using sqlx migrate
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Migration(e.to_string())))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying connection pool (for testing)
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_watched_pair(row: &sqlx::postgres::PgRow) -> Result<WatchedPair, AppError> {
        let network_str: String = row.get("network");

        Ok(WatchedPair {
            id: row.get("id"),
            account_address: row.get("account_address"),
            token_address: row.get("token_address"),
            token_name: row.get("token_name"),
            token_symbol: row.get("token_symbol"),
            token_decimals: row.get("token_decimals"),
            latest_balance: row.get("latest_balance"),
            is_fungible: row.get("is_fungible"),
            is_nft: row.get("is_nft"),
            is_favorite: row.get("is_favorite"),
            network: Network::from_str(&network_str).unwrap_or_default(),
            metadata: row.get("metadata"),
            last_refreshed_at: row.get("last_refreshed_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn row_to_snapshot(row: &sqlx::postgres::PgRow) -> BalanceSnapshot {
        BalanceSnapshot {
            id: row.get("id"),
            watched_pair_id: row.get("watched_pair_id"),
            account_address: row.get("account_address"),
            token_address: row.get("token_address"),
            balance: row.get("balance"),
            block_number: row.get("block_number"),
            observed_at: row.get("observed_at"),
            created_at: row.get("created_at"),
        }
    }
}

const WATCHED_PAIR_COLUMNS: &str = r#"
    id, account_address, token_address, token_name, token_symbol,
    token_decimals, latest_balance, is_fungible, is_nft, is_favorite,
    network, metadata, last_refreshed_at, created_at, updated_at
"#;

#[async_trait]
impl BalanceRepository for PostgresBalanceRepository {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_watched_pair(
        &self,
        account_address: &str,
        token_address: &str,
    ) -> Result<Option<WatchedPair>, AppError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {WATCHED_PAIR_COLUMNS}
            FROM watched_pairs
            WHERE account_address = $1 AND token_address = $2
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        ))
        .bind(account_address)
        .bind(token_address)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        match row {
            Some(row) => Ok(Some(Self::row_to_watched_pair(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, observation), fields(account = %observation.account_address, token = %observation.token.address))]
    async fn upsert_watched_pair(
        &self,
        observation: &BalanceObservation,
    ) -> Result<WatchedPair, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO watched_pairs (
                id, account_address, token_address, token_name, token_symbol,
                token_decimals, latest_balance, is_fungible, is_nft, is_favorite,
                network, metadata, last_refreshed_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (account_address, token_address, network) DO UPDATE SET
                token_name = EXCLUDED.token_name,
                token_symbol = EXCLUDED.token_symbol,
                token_decimals = EXCLUDED.token_decimals,
                latest_balance = EXCLUDED.latest_balance,
                last_refreshed_at = EXCLUDED.last_refreshed_at,
                updated_at = EXCLUDED.updated_at
            RETURNING {WATCHED_PAIR_COLUMNS}
            "#,
        ))
        .bind(&id)
        .bind(&observation.account_address)
        .bind(&observation.token.address)
        .bind(&observation.token.name)
        .bind(&observation.token.symbol)
        .bind(observation.token.decimals)
        .bind(Some(&observation.balance))
        .bind(observation.token.is_fungible)
        .bind(observation.token.is_nft)
        .bind(false)
        .bind(observation.token.network.as_str())
        .bind(None::<serde_json::Value>)
        .bind(observation.observed_at)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Self::row_to_watched_pair(&row)
    }

    #[instrument(skip(self, pair, observation), fields(pair_id = %pair.id))]
    async fn append_snapshot(
        &self,
        pair: &WatchedPair,
        observation: &BalanceObservation,
    ) -> Result<BalanceSnapshot, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO balance_snapshots (
                id, watched_pair_id, account_address, token_address,
                balance, block_number, observed_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&id)
        .bind(&pair.id)
        .bind(&observation.account_address)
        .bind(&observation.token.address)
        .bind(&observation.balance)
        .bind(observation.block_number)
        .bind(observation.observed_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(BalanceSnapshot {
            id,
            watched_pair_id: pair.id.clone(),
            account_address: observation.account_address.clone(),
            token_address: observation.token.address.clone(),
            balance: observation.balance.clone(),
            block_number: observation.block_number,
            observed_at: observation.observed_at,
            created_at: now,
        })
    }

    #[instrument(skip(self))]
    async fn list_oldest_pairs(&self, limit: i64) -> Result<Vec<WatchedPair>, AppError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {WATCHED_PAIR_COLUMNS}
            FROM watched_pairs
            ORDER BY last_refreshed_at ASC
            LIMIT $1
            "#,
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        rows.iter().map(Self::row_to_watched_pair).collect()
    }

    #[instrument(skip(self))]
    async fn list_snapshots(
        &self,
        account_address: &str,
        token_address: &str,
        limit: i64,
        order_desc: bool,
    ) -> Result<Vec<BalanceSnapshot>, AppError> {
        let query = if order_desc {
            r#"
            SELECT id, watched_pair_id, account_address, token_address,
                   balance, block_number, observed_at, created_at
            FROM balance_snapshots
            WHERE account_address = $1 AND token_address = $2
            ORDER BY observed_at DESC
            LIMIT $3
            "#
        } else {
            r#"
            SELECT id, watched_pair_id, account_address, token_address,
                   balance, block_number, observed_at, created_at
            FROM balance_snapshots
            WHERE account_address = $1 AND token_address = $2
            ORDER BY observed_at ASC
            LIMIT $3
            "#
        };

        let rows = sqlx::query(query)
            .bind(account_address)
            .bind(token_address)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        Ok(rows.iter().map(Self::row_to_snapshot).collect())
    }

    #[instrument(skip(self))]
    async fn list_watched_pairs(
        &self,
        account_address: &str,
    ) -> Result<Vec<WatchedPair>, AppError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {WATCHED_PAIR_COLUMNS}
            FROM watched_pairs
            WHERE account_address = $1
            ORDER BY last_refreshed_at DESC
            "#,
        ))
        .bind(account_address)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        rows.iter().map(Self::row_to_watched_pair).collect()
    }
}
