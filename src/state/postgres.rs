//! PostgreSQL transaction history

use super::{BridgeTransaction, MessageStatus, TransactionStore};
use crate::config::DatabaseConfig;
use crate::error::{BridgeError, BridgeResult};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::types::{Address, H256, U256};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};

/// Transaction history persisted in PostgreSQL
pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    /// Create a new store and connect the pool
    pub async fn new(config: &DatabaseConfig) -> BridgeResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> BridgeResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bridge_transactions (
                id BIGSERIAL PRIMARY KEY,
                hash VARCHAR(66) NOT NULL UNIQUE,
                sender VARCHAR(42) NOT NULL,
                amount TEXT NOT NULL,
                symbol VARCHAR(32) NOT NULL,
                decimals SMALLINT NOT NULL,
                src_chain_id BIGINT NOT NULL,
                dest_chain_id BIGINT NOT NULL,
                token_type VARCHAR(10) NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'new',
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_bridge_transactions_sender
            ON bridge_transactions (sender, created_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations complete");
        Ok(())
    }
}

fn address_key(address: Address) -> String {
    format!("{:?}", address)
}

fn corrupt(field: &str, e: impl std::fmt::Display) -> BridgeError {
    BridgeError::Internal(format!("corrupt bridge_transactions.{}: {}", field, e))
}

/// Convert between a record field and its signed column type without truncating
fn convert<S, T>(field: &str, value: S) -> BridgeResult<T>
where
    S: Copy + std::fmt::Display,
    T: TryFrom<S>,
{
    T::try_from(value).map_err(|_| corrupt(field, format!("{} out of range", value)))
}

fn parse_row(row: PgRow) -> BridgeResult<BridgeTransaction> {
    let hash: String = row.try_get("hash")?;
    let sender: String = row.try_get("sender")?;
    let amount: String = row.try_get("amount")?;
    let token_type: String = row.try_get("token_type")?;
    let status: String = row.try_get("status")?;

    Ok(BridgeTransaction {
        hash: hash
            .parse::<H256>()
            .map_err(|e| corrupt("hash", e))?,
        from: sender
            .parse::<Address>()
            .map_err(|e| corrupt("sender", e))?,
        amount: U256::from_dec_str(&amount).map_err(|e| corrupt("amount", e))?,
        symbol: row.try_get("symbol")?,
        decimals: convert("decimals", row.try_get::<i16, _>("decimals")?)?,
        src_chain_id: convert("src_chain_id", row.try_get::<i64, _>("src_chain_id")?)?,
        dest_chain_id: convert("dest_chain_id", row.try_get::<i64, _>("dest_chain_id")?)?,
        token_type: token_type.parse().map_err(|e| corrupt("token_type", e))?,
        status: status
            .parse::<MessageStatus>()
            .map_err(|e| corrupt("status", e))?,
        timestamp: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn add_tx_by_address(
        &self,
        address: Address,
        tx: BridgeTransaction,
    ) -> BridgeResult<()> {
        let src_chain_id: i64 = convert("src_chain_id", tx.src_chain_id)?;
        let dest_chain_id: i64 = convert("dest_chain_id", tx.dest_chain_id)?;

        let result = sqlx::query(
            r#"
            INSERT INTO bridge_transactions
                (hash, sender, amount, symbol, decimals, src_chain_id, dest_chain_id,
                 token_type, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (hash) DO NOTHING
            "#,
        )
        .bind(format!("{:?}", tx.hash))
        .bind(address_key(address))
        .bind(tx.amount.to_string())
        .bind(&tx.symbol)
        .bind(i16::from(tx.decimals))
        .bind(src_chain_id)
        .bind(dest_chain_id)
        .bind(tx.token_type.to_string())
        .bind(tx.status.as_str())
        .bind(tx.timestamp)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!("Transaction {:?} already recorded", tx.hash);
        }
        Ok(())
    }

    async fn get_txs_by_address(&self, address: Address) -> BridgeResult<Vec<BridgeTransaction>> {
        let rows = sqlx::query(
            r#"
            SELECT hash, sender, amount, symbol, decimals, src_chain_id, dest_chain_id,
                   token_type, status, created_at
            FROM bridge_transactions
            WHERE sender = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(address_key(address))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(parse_row).collect()
    }

    async fn health_check(&self) -> BridgeResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
