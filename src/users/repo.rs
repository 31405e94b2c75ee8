use anyhow::Context;
use axum::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;

use super::dto::UserFields;
use super::SyncError;
use super::repo_types::User;
use super::validation;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{field} has already been taken")]
    Conflict { field: &'static str },
    #[error("user {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Local persistence for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// All records ordered by id.
    async fn all(&self) -> Result<Vec<User>, StoreError>;
    async fn find(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Insert a record; `id` of `None` lets the store assign one.
    async fn insert(&self, id: Option<i64>, fields: &UserFields) -> Result<User, StoreError>;
    async fn update(&self, id: i64, fields: &UserFields) -> Result<User, StoreError>;
    /// Returns whether a record was removed.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;
}

/// Validate, then insert a new record.
pub async fn save_new(
    store: &dyn UserStore,
    id: Option<i64>,
    fields: &UserFields,
) -> Result<User, SyncError> {
    let errors = validation::validate(store, None, fields).await?;
    if !errors.is_empty() {
        return Err(SyncError::ValidationFailed(errors));
    }
    Ok(store.insert(id, fields).await?)
}

/// Validate, then overwrite the content fields of record `id`.
pub async fn save_existing(
    store: &dyn UserStore,
    id: i64,
    fields: &UserFields,
) -> Result<User, SyncError> {
    let errors = validation::validate(store, Some(id), fields).await?;
    if !errors.is_empty() {
        return Err(SyncError::ValidationFailed(errors));
    }
    Ok(store.update(id, fields).await?)
}

/// Find-or-create by id, then save.
pub async fn upsert(store: &dyn UserStore, id: i64, fields: &UserFields) -> Result<User, SyncError> {
    match store.find(id).await? {
        Some(_) => save_existing(store, id, fields).await,
        None => {
            debug!(user_id = id, "no local record, creating");
            save_new(store, Some(id), fields).await
        }
    }
}

const USER_COLUMNS: &str = "id, name, username, email, phone, website, created_at, updated_at";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Field guarded by a unique constraint from the users migration.
fn conflict_field(constraint: Option<&str>) -> Option<&'static str> {
    match constraint {
        Some("users_username_key") => Some("username"),
        Some("users_email_key") => Some("email"),
        _ => None,
    }
}

fn map_sqlx(err: sqlx::Error, what: &'static str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            if let Some(field) = conflict_field(db_err.constraint()) {
                return StoreError::Conflict { field };
            }
        }
    }
    StoreError::Other(anyhow::Error::new(err).context(what))
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn all(&self) -> Result<Vec<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(&self.db)
            .await
            .map_err(|e| map_sqlx(e, "list users"))
    }

    async fn find(&self, id: i64) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| map_sqlx(e, "find user"))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_sqlx(e, "find user by username"))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| map_sqlx(e, "find user by email"))
    }

    async fn insert(&self, id: Option<i64>, fields: &UserFields) -> Result<User, StoreError> {
        let Some(id) = id else {
            return sqlx::query_as::<_, User>(&format!(
                r#"
                INSERT INTO users (name, username, email, phone, website)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING {USER_COLUMNS}
                "#
            ))
            .bind(&fields.name)
            .bind(&fields.username)
            .bind(&fields.email)
            .bind(&fields.phone)
            .bind(&fields.website)
            .fetch_one(&self.db)
            .await
            .map_err(|e| map_sqlx(e, "insert user"));
        };

        // An explicit id bypasses the serial; move the sequence past it so
        // store-assigned ids never collide with it later.
        let mut tx = self.db.begin().await.context("begin tx")?;
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, name, username, email, phone, website)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.username)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(&fields.website)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx(e, "insert user with id"))?;

        sqlx::query(
            r#"
            SELECT setval(pg_get_serial_sequence('users', 'id'),
                          GREATEST((SELECT MAX(id) FROM users), 1))
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx(e, "advance users id sequence"))?;
        tx.commit().await.context("commit tx")?;

        Ok(user)
    }

    async fn update(&self, id: i64, fields: &UserFields) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name = $2, username = $3, email = $4, phone = $5, website = $6,
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.username)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(&fields.website)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_sqlx(e, "update user"))?
        .ok_or(StoreError::NotFound(id))
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| map_sqlx(e, "delete user"))?;
        Ok(res.rows_affected() > 0)
    }
}
