//! Postgres-backed store.
//!
//! Wire types persist as JSONB alongside the columns queries need, so
//! the stored shape stays bit-for-bit the envelope shape. The
//! `(site_id, batch_id, url_doc)` unique index is what turns replayed
//! batches into conflicts instead of duplicate rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::traits::{DocumentStore, LogStore, SettingsStore, SiteStore};
use crate::types::{
    AnalysisUpdate, DocumentRecord, HarvestLog, HarvestedDocument, LogRecord, SiteFieldsUpdate,
    SiteRecord,
};

/// Postgres implementation of the storage traits.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and run the schema bootstrap.
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(map_sqlx_err)?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and run the schema bootstrap.
    pub async fn from_pool(pool: PgPool) -> StoreResult<Self> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS harvest_sites (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                harvest_instructions TEXT NOT NULL DEFAULT '',
                obstacles_globaux JSONB NOT NULL DEFAULT '[]',
                recommandations TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS harvest_documents (
                id UUID PRIMARY KEY,
                site_id UUID NOT NULL,
                batch_id TEXT NOT NULL,
                url_doc TEXT NOT NULL,
                document JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                CONSTRAINT documents_site_batch_url_key UNIQUE (site_id, batch_id, url_doc)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS harvest_documents_created_at_idx
             ON harvest_documents (created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS harvest_documents_site_idx
             ON harvest_documents (site_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS harvest_logs (
                id UUID PRIMARY KEY,
                site_id UUID NOT NULL,
                batch_id TEXT NOT NULL,
                log JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS harvest_logs_site_idx ON harvest_logs (site_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS harvest_settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(())
    }
}

type DocumentRow = (Uuid, Uuid, String, Value, DateTime<Utc>);

fn document_from_row(row: DocumentRow) -> StoreResult<DocumentRecord> {
    let (id, site_id, batch_id, document, created_at) = row;
    let document: HarvestedDocument = serde_json::from_value(document)?;
    Ok(DocumentRecord {
        id,
        site_id,
        batch_id,
        document,
        created_at,
    })
}

type LogRow = (Uuid, Uuid, String, Value, DateTime<Utc>);

fn log_from_row(row: LogRow) -> StoreResult<LogRecord> {
    let (id, site_id, batch_id, log, created_at) = row;
    let log: HarvestLog = serde_json::from_value(log)?;
    Ok(LogRecord {
        id,
        site_id,
        batch_id,
        log,
        created_at,
    })
}

type SiteRow = (
    Uuid,
    String,
    String,
    String,
    Value,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn site_from_row(row: SiteRow) -> StoreResult<SiteRecord> {
    let (id, name, url, harvest_instructions, obstacles, recommandations, created_at, updated_at) =
        row;
    let obstacles_globaux: Vec<String> = serde_json::from_value(obstacles)?;
    Ok(SiteRecord {
        id,
        name,
        url,
        harvest_instructions,
        obstacles_globaux,
        recommandations,
        created_at,
        updated_at,
    })
}

fn map_sqlx_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = err {
        if db.is_unique_violation() {
            return StoreError::Conflict {
                constraint: db.constraint().unwrap_or("unique").to_string(),
            };
        }
    }
    StoreError::backend(err)
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn insert_document(&self, record: &DocumentRecord) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO harvest_documents (id, site_id, batch_id, url_doc, document, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(record.id)
        .bind(record.site_id)
        .bind(&record.batch_id)
        .bind(&record.document.url_doc)
        .bind(serde_json::to_value(&record.document)?)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn recent_documents(&self, limit: usize) -> StoreResult<Vec<DocumentRecord>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, site_id, batch_id, document, created_at
             FROM harvest_documents ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        rows.into_iter().map(document_from_row).collect()
    }

    async fn documents_for_site(&self, site_id: Uuid) -> StoreResult<Vec<DocumentRecord>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, site_id, batch_id, document, created_at
             FROM harvest_documents WHERE site_id = $1 ORDER BY created_at DESC",
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        rows.into_iter().map(document_from_row).collect()
    }

    async fn get_document(&self, id: Uuid) -> StoreResult<Option<DocumentRecord>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, site_id, batch_id, document, created_at
             FROM harvest_documents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        row.map(document_from_row).transpose()
    }

    async fn update_document_analysis(
        &self,
        id: Uuid,
        update: &AnalysisUpdate,
    ) -> StoreResult<()> {
        let patch = serde_json::to_value(update)?;
        let result = sqlx::query(
            "UPDATE harvest_documents SET document = document || $2 WHERE id = $1",
        )
        .bind(id)
        .bind(patch)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "document",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn count_documents(&self, site_id: Uuid) -> StoreResult<usize> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM harvest_documents WHERE site_id = $1",
        )
        .bind(site_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(count as usize)
    }
}

#[async_trait]
impl LogStore for PostgresStore {
    async fn insert_log(&self, record: &LogRecord) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO harvest_logs (id, site_id, batch_id, log, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(record.id)
        .bind(record.site_id)
        .bind(&record.batch_id)
        .bind(serde_json::to_value(&record.log)?)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn logs_for_site(&self, site_id: Uuid) -> StoreResult<Vec<LogRecord>> {
        let rows = sqlx::query_as::<_, LogRow>(
            "SELECT id, site_id, batch_id, log, created_at
             FROM harvest_logs WHERE site_id = $1 ORDER BY created_at DESC",
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        rows.into_iter().map(log_from_row).collect()
    }
}

#[async_trait]
impl SiteStore for PostgresStore {
    async fn get_site(&self, id: Uuid) -> StoreResult<Option<SiteRecord>> {
        let row = sqlx::query_as::<_, SiteRow>(
            "SELECT id, name, url, harvest_instructions, obstacles_globaux, recommandations,
                    created_at, updated_at
             FROM harvest_sites WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        row.map(site_from_row).transpose()
    }

    async fn upsert_site(&self, site: &SiteRecord) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO harvest_sites
                 (id, name, url, harvest_instructions, obstacles_globaux, recommandations,
                  created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO UPDATE SET
                 name = EXCLUDED.name,
                 url = EXCLUDED.url,
                 harvest_instructions = EXCLUDED.harvest_instructions,
                 obstacles_globaux = EXCLUDED.obstacles_globaux,
                 recommandations = EXCLUDED.recommandations,
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(site.id)
        .bind(&site.name)
        .bind(&site.url)
        .bind(&site.harvest_instructions)
        .bind(serde_json::to_value(&site.obstacles_globaux)?)
        .bind(&site.recommandations)
        .bind(site.created_at)
        .bind(site.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn update_site_fields(&self, id: Uuid, update: &SiteFieldsUpdate) -> StoreResult<()> {
        let obstacles = update
            .obstacles_globaux
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let result = sqlx::query(
            "UPDATE harvest_sites SET
                 obstacles_globaux = COALESCE($2, obstacles_globaux),
                 recommandations = COALESCE($3, recommandations),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(obstacles)
        .bind(&update.recommandations)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "site",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_sites(&self) -> StoreResult<Vec<SiteRecord>> {
        let rows = sqlx::query_as::<_, SiteRow>(
            "SELECT id, name, url, harvest_instructions, obstacles_globaux, recommandations,
                    created_at, updated_at
             FROM harvest_sites ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        rows.into_iter().map(site_from_row).collect()
    }
}

#[async_trait]
impl SettingsStore for PostgresStore {
    async fn load_setting(&self, key: &str) -> StoreResult<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM harvest_settings WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
        Ok(row.map(|(value,)| value))
    }

    async fn store_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO harvest_settings (key, value) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }
}
