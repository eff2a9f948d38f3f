use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use tracing::info;

use crate::database::store::{Document, Store};
use crate::error::StoreError;

/// SQLite-backed store: one row per collection holding its JSON body.
#[derive(Clone, Debug)]
pub struct DatabaseManager {
    pub pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(database_url: &str) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
            info!("Creating database {}", database_url);
            Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePool::connect(database_url).await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Names of the collections that have been written at least once.
    pub async fn collection_names(&self) -> Result<Vec<String>, StoreError> {
        let names = sqlx::query_scalar::<_, String>("SELECT name FROM collections ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }
}

#[async_trait]
impl Store for DatabaseManager {
    async fn get(&self, name: &str) -> Result<Document, StoreError> {
        let body = sqlx::query_scalar::<_, String>("SELECT body FROM collections WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match body {
            None => Ok(Document::new()),
            Some(body) => match serde_json::from_str::<Value>(&body)? {
                Value::Object(map) => Ok(map),
                _ => Err(StoreError::NotAnObject(name.to_string())),
            },
        }
    }

    async fn put(&self, name: &str, document: &Document) -> Result<(), StoreError> {
        let body = serde_json::to_string(document)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO collections (name, body, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(body)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
