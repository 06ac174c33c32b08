use async_trait::async_trait;

use common::prelude::{Grant, GrantStore, StoreError, TreePath};

use super::types::DTreePath;
use super::{backend, is_foreign_key_violation, Database};

#[derive(sqlx::FromRow)]
struct GrantRow {
    id: i64,
    user: i64,
    path: DTreePath,
}

impl From<GrantRow> for Grant {
    fn from(row: GrantRow) -> Self {
        Grant {
            id: row.id,
            user_id: row.user,
            path: row.path.into(),
        }
    }
}

#[async_trait]
impl GrantStore for Database {
    async fn grants_for(&self, user_id: i64) -> Result<Vec<TreePath>, StoreError> {
        let paths: Vec<DTreePath> = sqlx::query_scalar("SELECT path FROM access WHERE user = $1")
            .bind(user_id)
            .fetch_all(&**self)
            .await
            .map_err(backend)?;

        Ok(paths.into_iter().map(TreePath::from).collect())
    }

    async fn list_grants(&self) -> Result<Vec<Grant>, StoreError> {
        let rows: Vec<GrantRow> = sqlx::query_as("SELECT id, user, path FROM access ORDER BY id")
            .fetch_all(&**self)
            .await
            .map_err(backend)?;

        Ok(rows.into_iter().map(Grant::from).collect())
    }

    async fn create_grant(&self, user_id: i64, path: &TreePath) -> Result<Grant, StoreError> {
        let row: GrantRow = sqlx::query_as(
            "INSERT INTO access (user, path) VALUES ($1, $2) RETURNING id, user, path",
        )
        .bind(user_id)
        .bind(DTreePath::from(path.clone()))
        .fetch_one(&**self)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::NotFound
            } else {
                backend(e)
            }
        })?;

        Ok(row.into())
    }

    async fn update_grant(&self, id: i64, path: &TreePath) -> Result<Grant, StoreError> {
        let row: Option<GrantRow> = sqlx::query_as(
            "UPDATE access SET path = $1 WHERE id = $2 RETURNING id, user, path",
        )
        .bind(DTreePath::from(path.clone()))
        .bind(id)
        .fetch_optional(&**self)
        .await
        .map_err(backend)?;

        row.map(Grant::from).ok_or(StoreError::NotFound)
    }

    async fn delete_grant(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM access WHERE id = $1")
            .bind(id)
            .execute(&**self)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::temp_database;

    fn t(raw: &str) -> TreePath {
        TreePath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_grant_crud() {
        let (_dir, db) = temp_database().await;
        let user = db.upsert_login("github:7", "seven").await.unwrap();

        let grant = db.create_grant(user.id, &t("/docs")).await.unwrap();
        assert_eq!(grant.user_id, user.id);
        assert_eq!(db.grants_for(user.id).await.unwrap(), vec![t("/docs")]);

        let moved = db.update_grant(grant.id, &t("/photos/2024")).await.unwrap();
        assert_eq!(moved.path, t("/photos/2024"));
        assert_eq!(db.list_grants().await.unwrap(), vec![moved]);

        db.delete_grant(grant.id).await.unwrap();
        assert!(db.grants_for(user.id).await.unwrap().is_empty());
        assert!(matches!(
            db.delete_grant(grant.id).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            db.update_grant(grant.id, &t("/x")).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_grant_for_unknown_user_is_not_found() {
        let (_dir, db) = temp_database().await;
        assert!(matches!(
            db.create_grant(404, &t("/a")).await,
            Err(StoreError::NotFound)
        ));
    }
}
