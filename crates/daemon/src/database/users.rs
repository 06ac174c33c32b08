use serde::Serialize;

use common::prelude::TreePath;

use super::types::{DBool, DTreePath};
use super::Database;

/// A person known to the server through an identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    /// Provider-qualified id, e.g. `discord:80351110224678912`
    pub external_id: String,
    pub name: String,
    pub admin: bool,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    external_id: String,
    name: String,
    admin: DBool,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            external_id: row.external_id,
            name: row.name,
            admin: row.admin.into(),
        }
    }
}

impl Database {
    /// Record a successful login, creating the user on first sight and
    /// refreshing their display name otherwise.
    pub async fn upsert_login(&self, external_id: &str, name: &str) -> Result<User, sqlx::Error> {
        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users (external_id, name)
            VALUES ($1, $2)
            ON CONFLICT (external_id) DO UPDATE SET name = excluded.name
            RETURNING id, external_id, name, admin
            "#,
        )
        .bind(external_id)
        .bind(name)
        .fetch_one(&**self)
        .await?;

        Ok(row.into())
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, external_id, name, admin FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&**self)
                .await?;

        Ok(row.map(User::from))
    }

    pub async fn user_by_external_id(&self, external_id: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, external_id, name, admin FROM users WHERE external_id = $1")
                .bind(external_id)
                .fetch_optional(&**self)
                .await?;

        Ok(row.map(User::from))
    }

    pub async fn list_users(&self) -> Result<Vec<User>, sqlx::Error> {
        let rows: Vec<UserRow> =
            sqlx::query_as("SELECT id, external_id, name, admin FROM users ORDER BY id")
                .fetch_all(&**self)
                .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Flip the admin flag. Returns `None` if the user does not exist.
    pub async fn set_admin(&self, id: i64, admin: bool) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            UPDATE users SET admin = $1 WHERE id = $2
            RETURNING id, external_id, name, admin
            "#,
        )
        .bind(DBool::from(admin))
        .bind(id)
        .fetch_optional(&**self)
        .await?;

        Ok(row.map(User::from))
    }

    /// Make sure `external_id` exists, is an admin and holds a grant on the
    /// whole tree. Safe to run on every start.
    pub async fn bootstrap_admin(&self, external_id: &str) -> Result<User, sqlx::Error> {
        let mut tx = self.begin().await?;

        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users (external_id, admin)
            VALUES ($1, 1)
            ON CONFLICT (external_id) DO UPDATE SET admin = 1
            RETURNING id, external_id, name, admin
            "#,
        )
        .bind(external_id)
        .fetch_one(&mut *tx)
        .await?;

        let root = DTreePath::from(TreePath::root());
        let has_root: Option<i64> =
            sqlx::query_scalar("SELECT id FROM access WHERE user = $1 AND path = $2")
                .bind(row.id)
                .bind(&root)
                .fetch_optional(&mut *tx)
                .await?;

        if has_root.is_none() {
            sqlx::query("INSERT INTO access (user, path) VALUES ($1, $2)")
                .bind(row.id)
                .bind(&root)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        let user = User::from(row);
        tracing::info!(id = user.id, external_id, "bootstrapped admin user");
        Ok(user)
    }
}
