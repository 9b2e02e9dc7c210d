//! Snapshot persistence for readiness runs.
//!
//! Snapshots are append-only: a run either stores exactly one row or
//! nothing. Readers ask for the latest snapshot of a scope (the normalized
//! instance URL) or the latest overall.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;
use uuid::Uuid;

pub const ENV_DB_URL: &str = "GLR_DATABASE_URL";

/// Connect to Postgres using GLR_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_snapshots_table: bool,
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='readiness_snapshots'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_snapshots_table: exists,
    })
}

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// A snapshot about to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSnapshot {
    pub scope_key: String,
    pub taken_at_utc: DateTime<Utc>,
    /// Hash of the effective config the run used; empty when unknown.
    pub config_hash: String,
    pub metrics: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub snapshot_id: Uuid,
    pub scope_key: String,
    pub taken_at_utc: DateTime<Utc>,
    pub config_hash: String,
    pub metrics: Value,
}

/// Refuse payloads that are not a metrics object with a snapshot time.
pub fn validate_metrics(metrics: &Value) -> Result<()> {
    let obj = metrics
        .as_object()
        .ok_or_else(|| anyhow!("metrics payload must be a JSON object"))?;
    match obj.get("snapshot_time_utc") {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(()),
        _ => Err(anyhow!("metrics payload has no snapshot_time_utc; refusing to store an empty snapshot")),
    }
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Append one snapshot and return its id.
    async fn store(&self, snap: &NewSnapshot) -> Result<Uuid>;

    /// Latest snapshot for `scope_key`, or the latest overall for `None`.
    async fn load_latest(&self, scope_key: Option<&str>) -> Result<Option<StoredSnapshot>>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn store(&self, snap: &NewSnapshot) -> Result<Uuid> {
        validate_metrics(&snap.metrics)?;
        let snapshot_id = Uuid::new_v4();

        sqlx::query(
            r#"
            insert into readiness_snapshots (
              snapshot_id, scope_key, taken_at_utc, config_hash, metrics
            ) values (
              $1, $2, $3, $4, $5
            )
            "#,
        )
        .bind(snapshot_id)
        .bind(&snap.scope_key)
        .bind(snap.taken_at_utc)
        .bind(&snap.config_hash)
        .bind(&snap.metrics)
        .execute(&self.pool)
        .await
        .context("insert readiness snapshot failed")?;

        tracing::info!(%snapshot_id, scope_key = %snap.scope_key, "snapshot stored");
        Ok(snapshot_id)
    }

    async fn load_latest(&self, scope_key: Option<&str>) -> Result<Option<StoredSnapshot>> {
        let row = match scope_key {
            Some(k) => sqlx::query(
                r#"
                select snapshot_id, scope_key, taken_at_utc, config_hash, metrics
                from readiness_snapshots
                where scope_key = $1
                order by taken_at_utc desc
                limit 1
                "#,
            )
            .bind(k)
            .fetch_optional(&self.pool)
            .await
            .context("load latest snapshot for scope failed")?,
            None => sqlx::query(
                r#"
                select snapshot_id, scope_key, taken_at_utc, config_hash, metrics
                from readiness_snapshots
                order by taken_at_utc desc
                limit 1
                "#,
            )
            .fetch_optional(&self.pool)
            .await
            .context("load latest snapshot failed")?,
        };

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(StoredSnapshot {
            snapshot_id: row.try_get("snapshot_id")?,
            scope_key: row.try_get("scope_key")?,
            taken_at_utc: row.try_get("taken_at_utc")?,
            config_hash: row.try_get("config_hash")?,
            metrics: row.try_get("metrics")?,
        }))
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local store for tests and database-less daemons.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    rows: RwLock<Vec<StoredSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn store(&self, snap: &NewSnapshot) -> Result<Uuid> {
        validate_metrics(&snap.metrics)?;
        let snapshot_id = Uuid::new_v4();
        self.rows.write().await.push(StoredSnapshot {
            snapshot_id,
            scope_key: snap.scope_key.clone(),
            taken_at_utc: snap.taken_at_utc,
            config_hash: snap.config_hash.clone(),
            metrics: snap.metrics.clone(),
        });
        Ok(snapshot_id)
    }

    async fn load_latest(&self, scope_key: Option<&str>) -> Result<Option<StoredSnapshot>> {
        let rows = self.rows.read().await;
        // Later inserts win ties on taken_at_utc.
        let latest = rows
            .iter()
            .enumerate()
            .filter(|(_, s)| scope_key.map(|k| s.scope_key == k).unwrap_or(true))
            .max_by_key(|(i, s)| (s.taken_at_utc, *i))
            .map(|(_, s)| s.clone());
        Ok(latest)
    }
}
