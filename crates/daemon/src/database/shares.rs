use async_trait::async_trait;

use common::prelude::{ShareLink, ShareStore, StoreError, TreePath};

use super::types::DTreePath;
use super::{backend, is_unique_violation, Database};

#[derive(sqlx::FromRow)]
struct ShareRow {
    id: i64,
    hash: String,
    path: DTreePath,
}

impl From<ShareRow> for ShareLink {
    fn from(row: ShareRow) -> Self {
        ShareLink {
            id: row.id,
            token: row.hash,
            path: row.path.into(),
        }
    }
}

#[async_trait]
impl ShareStore for Database {
    async fn insert_share(&self, token: &str, path: &TreePath) -> Result<ShareLink, StoreError> {
        let row: ShareRow = sqlx::query_as(
            "INSERT INTO shares (hash, path) VALUES ($1, $2) RETURNING id, hash, path",
        )
        .bind(token)
        .bind(DTreePath::from(path.clone()))
        .fetch_one(&**self)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict
            } else {
                backend(e)
            }
        })?;

        Ok(row.into())
    }

    async fn get_share(&self, token: &str) -> Result<Option<ShareLink>, StoreError> {
        let row: Option<ShareRow> =
            sqlx::query_as("SELECT id, hash, path FROM shares WHERE hash = $1")
                .bind(token)
                .fetch_optional(&**self)
                .await
                .map_err(backend)?;

        Ok(row.map(ShareLink::from))
    }

    async fn update_share(&self, token: &str, path: &TreePath) -> Result<ShareLink, StoreError> {
        let row: Option<ShareRow> = sqlx::query_as(
            "UPDATE shares SET path = $1 WHERE hash = $2 RETURNING id, hash, path",
        )
        .bind(DTreePath::from(path.clone()))
        .bind(token)
        .fetch_optional(&**self)
        .await
        .map_err(backend)?;

        row.map(ShareLink::from).ok_or(StoreError::NotFound)
    }

    async fn delete_share(&self, token: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM shares WHERE hash = $1")
            .bind(token)
            .execute(&**self)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_shares(&self) -> Result<Vec<ShareLink>, StoreError> {
        let rows: Vec<ShareRow> = sqlx::query_as("SELECT id, hash, path FROM shares ORDER BY id")
            .fetch_all(&**self)
            .await
            .map_err(backend)?;

        Ok(rows.into_iter().map(ShareLink::from).collect())
    }
}
