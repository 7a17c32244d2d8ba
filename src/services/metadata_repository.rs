//! SQLite-backed store for [`FileRecord`]s.

use crate::models::file_record::{FileRecord, NewFileRecord};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Schema applied by [`MetadataRepository::migrate`]. Every statement is idempotent.
const INIT_SQL: &str = include_str!("../../migrations/0001_init.sql");

const RECORD_COLUMNS: &str =
    "id, filename, storage_key, url, content_type, size_bytes, created_at";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("a record for storage key `{0}` already exists")]
    DuplicateKey(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type MetadataResult<T> = Result<T, MetadataError>;

#[derive(Clone)]
pub struct MetadataRepository {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl MetadataRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Run the embedded schema statements one by one.
    pub async fn migrate(&self) -> MetadataResult<()> {
        let statements = INIT_SQL
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        tracing::info!("Running {} migration statements...", statements.len());

        for stmt in statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    /// Insert a new record; the storage key must not be taken yet.
    pub async fn insert(&self, record: NewFileRecord) -> MetadataResult<FileRecord> {
        let sql = format!(
            "INSERT INTO files ({RECORD_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?) \
             RETURNING {RECORD_COLUMNS}"
        );

        sqlx::query_as::<_, FileRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&record.filename)
            .bind(&record.storage_key)
            .bind(&record.url)
            .bind(&record.content_type)
            .bind(record.size_bytes)
            .bind(Utc::now())
            .fetch_one(&*self.db)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    MetadataError::DuplicateKey(record.storage_key.clone())
                } else {
                    MetadataError::Sqlx(err)
                }
            })
    }

    /// Newest record whose filename matches exactly.
    pub async fn find_by_filename(&self, filename: &str) -> MetadataResult<Option<FileRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM files WHERE filename = ? \
             ORDER BY created_at DESC, rowid DESC LIMIT 1"
        );
        Ok(sqlx::query_as::<_, FileRecord>(&sql)
            .bind(filename)
            .fetch_optional(&*self.db)
            .await?)
    }

    #[cfg(test)]
    pub async fn find_by_key(&self, storage_key: &str) -> MetadataResult<Option<FileRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM files WHERE storage_key = ?");
        Ok(sqlx::query_as::<_, FileRecord>(&sql)
            .bind(storage_key)
            .fetch_optional(&*self.db)
            .await?)
    }

    /// All records, newest first.
    pub async fn list_newest_first(&self) -> MetadataResult<Vec<FileRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM files ORDER BY created_at DESC, rowid DESC"
        );
        Ok(sqlx::query_as::<_, FileRecord>(&sql)
            .fetch_all(&*self.db)
            .await?)
    }

    /// `SELECT 1` round trip for readiness probes.
    pub async fn ping(&self) -> MetadataResult<()> {
        let value = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        if value != 1 {
            return Err(MetadataError::Sqlx(sqlx::Error::Protocol(format!(
                "unexpected result: {}",
                value
            ))));
        }
        Ok(())
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
