//! SQLite Registry Module
//!
//! Persists batches, memberships and formation rules through sqlx.
//!
//! # Storage
//! - Identifiers are stored as hyphenated UUID text
//! - Enumerations are stored as their snake_case names
//! - Timestamps are stored as RFC 3339 text
//!
//! `commit` runs every write of one operation inside a single transaction.

use super::{Store, Write};
use crate::{
    Batch, BatchId, FormationRule, Membership, MembershipId, error::StoreError,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS batches (
        id TEXT PRIMARY KEY,
        product_id TEXT NOT NULL,
        batch_type TEXT NOT NULL,
        price REAL NOT NULL,
        discount REAL NOT NULL,
        delivery_time TEXT NOT NULL,
        delivery_speed TEXT NOT NULL,
        buyers_required INTEGER NOT NULL,
        current_buyers INTEGER NOT NULL,
        status TEXT NOT NULL,
        estimated_ship_date TEXT NOT NULL,
        estimated_delivery_date TEXT NOT NULL,
        actual_ship_date TEXT,
        actual_delivery_date TEXT,
        is_active INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_batches_product ON batches (product_id)",
    "CREATE TABLE IF NOT EXISTS memberships (
        id TEXT PRIMARY KEY,
        batch_id TEXT NOT NULL REFERENCES batches (id),
        user_id TEXT NOT NULL,
        product_id TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        total_price REAL NOT NULL,
        status TEXT NOT NULL,
        payment_status TEXT NOT NULL,
        shipping_address TEXT NOT NULL,
        tracking_number TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_memberships_batch ON memberships (batch_id)",
    "CREATE INDEX IF NOT EXISTS idx_memberships_user ON memberships (user_id)",
    "CREATE TABLE IF NOT EXISTS formation_rules (
        id TEXT PRIMARY KEY,
        product_id TEXT NOT NULL,
        batch_type TEXT NOT NULL,
        min_buyers INTEGER NOT NULL,
        max_buyers INTEGER NOT NULL,
        price_multiplier REAL NOT NULL,
        delivery_time_days INTEGER NOT NULL,
        priority INTEGER NOT NULL,
        is_active INTEGER NOT NULL
    )",
];

/// sqlx-backed store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `url` and create the schema if missing
    ///
    /// In-memory URLs get a single pinned connection, since every SQLite
    /// connection to `:memory:` opens a distinct database.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!("SQLite store ready at {}", url);
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn corrupt(what: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(what.to_string())
}

fn parse_uuid(row: &SqliteRow, column: &str) -> Result<Uuid, StoreError> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw).map_err(|e| corrupt(format!("{column}: {e}")))
}

fn parse_enum<T: FromStr<Err = String>>(row: &SqliteRow, column: &str) -> Result<T, StoreError> {
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(corrupt)
}

fn parse_u32(row: &SqliteRow, column: &str) -> Result<u32, StoreError> {
    let raw: i64 = row.try_get(column)?;
    u32::try_from(raw).map_err(|_| corrupt(format!("{column} out of range: {raw}")))
}

fn batch_from_row(row: &SqliteRow) -> Result<Batch, StoreError> {
    Ok(Batch {
        id: parse_uuid(row, "id")?,
        product_id: row.try_get("product_id")?,
        batch_type: parse_enum(row, "batch_type")?,
        price: row.try_get("price")?,
        discount: row.try_get("discount")?,
        delivery_time: row.try_get("delivery_time")?,
        delivery_speed: parse_enum(row, "delivery_speed")?,
        buyers_required: parse_u32(row, "buyers_required")?,
        current_buyers: parse_u32(row, "current_buyers")?,
        status: parse_enum(row, "status")?,
        estimated_ship_date: row.try_get("estimated_ship_date")?,
        estimated_delivery_date: row.try_get("estimated_delivery_date")?,
        actual_ship_date: row.try_get("actual_ship_date")?,
        actual_delivery_date: row.try_get("actual_delivery_date")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn membership_from_row(row: &SqliteRow) -> Result<Membership, StoreError> {
    Ok(Membership {
        id: parse_uuid(row, "id")?,
        batch_id: parse_uuid(row, "batch_id")?,
        user_id: row.try_get("user_id")?,
        product_id: row.try_get("product_id")?,
        quantity: parse_u32(row, "quantity")?,
        total_price: row.try_get("total_price")?,
        status: parse_enum(row, "status")?,
        payment_status: parse_enum(row, "payment_status")?,
        shipping_address: row.try_get("shipping_address")?,
        tracking_number: row.try_get("tracking_number")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn rule_from_row(row: &SqliteRow) -> Result<FormationRule, StoreError> {
    Ok(FormationRule {
        id: parse_uuid(row, "id")?,
        product_id: row.try_get("product_id")?,
        batch_type: parse_enum(row, "batch_type")?,
        min_buyers: parse_u32(row, "min_buyers")?,
        max_buyers: parse_u32(row, "max_buyers")?,
        price_multiplier: row.try_get("price_multiplier")?,
        delivery_time_days: parse_u32(row, "delivery_time_days")?,
        priority: row.try_get("priority")?,
        is_active: row.try_get("is_active")?,
    })
}

async fn upsert_batch(conn: &mut SqliteConnection, batch: &Batch) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO batches (
            id, product_id, batch_type, price, discount, delivery_time, delivery_speed,
            buyers_required, current_buyers, status, estimated_ship_date,
            estimated_delivery_date, actual_ship_date, actual_delivery_date, is_active,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            price = excluded.price,
            discount = excluded.discount,
            buyers_required = excluded.buyers_required,
            current_buyers = excluded.current_buyers,
            status = excluded.status,
            estimated_ship_date = excluded.estimated_ship_date,
            estimated_delivery_date = excluded.estimated_delivery_date,
            actual_ship_date = excluded.actual_ship_date,
            actual_delivery_date = excluded.actual_delivery_date,
            is_active = excluded.is_active,
            updated_at = excluded.updated_at",
    )
    .bind(batch.id.to_string())
    .bind(&batch.product_id)
    .bind(batch.batch_type.to_string())
    .bind(batch.price)
    .bind(batch.discount)
    .bind(&batch.delivery_time)
    .bind(batch.delivery_speed.to_string())
    .bind(i64::from(batch.buyers_required))
    .bind(i64::from(batch.current_buyers))
    .bind(batch.status.to_string())
    .bind(batch.estimated_ship_date)
    .bind(batch.estimated_delivery_date)
    .bind(batch.actual_ship_date)
    .bind(batch.actual_delivery_date)
    .bind(batch.is_active)
    .bind(batch.created_at)
    .bind(batch.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn upsert_membership(
    conn: &mut SqliteConnection,
    membership: &Membership,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO memberships (
            id, batch_id, user_id, product_id, quantity, total_price, status,
            payment_status, shipping_address, tracking_number, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            status = excluded.status,
            payment_status = excluded.payment_status,
            tracking_number = excluded.tracking_number,
            updated_at = excluded.updated_at",
    )
    .bind(membership.id.to_string())
    .bind(membership.batch_id.to_string())
    .bind(&membership.user_id)
    .bind(&membership.product_id)
    .bind(i64::from(membership.quantity))
    .bind(membership.total_price)
    .bind(membership.status.to_string())
    .bind(membership.payment_status.to_string())
    .bind(&membership.shipping_address)
    .bind(&membership.tracking_number)
    .bind(membership.created_at)
    .bind(membership.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, StoreError> {
        let row = sqlx::query("SELECT * FROM batches WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(batch_from_row).transpose()
    }

    async fn list_batches(&self, product_id: &str) -> Result<Vec<Batch>, StoreError> {
        let rows = sqlx::query("SELECT * FROM batches WHERE product_id = ? ORDER BY created_at ASC")
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(batch_from_row).collect()
    }

    async fn get_membership(&self, id: MembershipId) -> Result<Option<Membership>, StoreError> {
        let row = sqlx::query("SELECT * FROM memberships WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(membership_from_row).transpose()
    }

    async fn memberships_for_batch(
        &self,
        batch_id: BatchId,
    ) -> Result<Vec<Membership>, StoreError> {
        let rows =
            sqlx::query("SELECT * FROM memberships WHERE batch_id = ? ORDER BY created_at ASC")
                .bind(batch_id.to_string())
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(membership_from_row).collect()
    }

    async fn memberships_for_user(&self, user_id: &str) -> Result<Vec<Membership>, StoreError> {
        let rows =
            sqlx::query("SELECT * FROM memberships WHERE user_id = ? ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(membership_from_row).collect()
    }

    async fn memberships_for_product(
        &self,
        product_id: &str,
    ) -> Result<Vec<Membership>, StoreError> {
        let rows =
            sqlx::query("SELECT * FROM memberships WHERE product_id = ? ORDER BY created_at ASC")
                .bind(product_id)
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(membership_from_row).collect()
    }

    async fn formation_rules(&self, product_id: &str) -> Result<Vec<FormationRule>, StoreError> {
        let rows = sqlx::query("SELECT * FROM formation_rules WHERE product_id = ?")
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(rule_from_row).collect()
    }

    async fn put_formation_rule(&self, rule: FormationRule) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO formation_rules (
                id, product_id, batch_type, min_buyers, max_buyers, price_multiplier,
                delivery_time_days, priority, is_active
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(rule.id.to_string())
        .bind(&rule.product_id)
        .bind(rule.batch_type.to_string())
        .bind(i64::from(rule.min_buyers))
        .bind(i64::from(rule.max_buyers))
        .bind(rule.price_multiplier)
        .bind(i64::from(rule.delivery_time_days))
        .bind(rule.priority)
        .bind(rule.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for write in &writes {
            match write {
                Write::Batch(batch) => upsert_batch(&mut *tx, batch).await?,
                Write::Membership(membership) => upsert_membership(&mut *tx, membership).await?,
            }
        }
        tx.commit().await?;
        Ok(())
    }
}
