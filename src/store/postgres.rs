use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{DateRange, EntryStore, Store, UserStore, DUPLICATE_EMAIL, DUPLICATE_ENTRY};
use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::entry::{Entry, EntryContent};
use crate::models::user::{NewUser, Preferences, User};

/// Postgres-backed store. Constructed once at startup and shared by all requests.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct EntryRow {
    id: Uuid,
    user_id: Uuid,
    entry_date: NaiveDate,
    content: Json<EntryContent>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EntryRow> for Entry {
    fn from(row: EntryRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            date: row.entry_date,
            content: row.content.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = db::create_pool(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

#[async_trait]
impl EntryStore for PgStore {
    async fn insert_entry(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        content: &EntryContent,
    ) -> AppResult<Entry> {
        let row = sqlx::query_as::<_, EntryRow>(
            r#"
            INSERT INTO entries (id, user_id, entry_date, content)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(date)
        .bind(Json(content))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(DUPLICATE_ENTRY.into())
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(row.into())
    }

    async fn get_or_create_entry(&self, user_id: Uuid, date: NaiveDate) -> AppResult<Entry> {
        // No-op update so RETURNING yields the existing row on conflict
        let row = sqlx::query_as::<_, EntryRow>(
            r#"
            INSERT INTO entries (id, user_id, entry_date, content)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, entry_date) DO UPDATE
                SET updated_at = entries.updated_at
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(date)
        .bind(Json(EntryContent::default()))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_entry(&self, user_id: Uuid, id: Uuid) -> AppResult<Option<Entry>> {
        let row = sqlx::query_as::<_, EntryRow>(
            "SELECT * FROM entries WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Entry::from))
    }

    async fn find_entry_by_date(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> AppResult<Option<Entry>> {
        let row = sqlx::query_as::<_, EntryRow>(
            "SELECT * FROM entries WHERE user_id = $1 AND entry_date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Entry::from))
    }

    async fn page_entries(
        &self,
        user_id: Uuid,
        range: DateRange,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Entry>, i64)> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT * FROM entries
            WHERE user_id = $1
              AND ($2::date IS NULL OR entry_date >= $2)
              AND ($3::date IS NULL OR entry_date <= $3)
            ORDER BY entry_date DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(user_id)
        .bind(range.start)
        .bind(range.end)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM entries
            WHERE user_id = $1
              AND ($2::date IS NULL OR entry_date >= $2)
              AND ($3::date IS NULL OR entry_date <= $3)
            "#,
        )
        .bind(user_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await?;

        Ok((rows.into_iter().map(Entry::from).collect(), total))
    }

    async fn list_entries(&self, user_id: Uuid, range: DateRange) -> AppResult<Vec<Entry>> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT * FROM entries
            WHERE user_id = $1
              AND ($2::date IS NULL OR entry_date >= $2)
              AND ($3::date IS NULL OR entry_date <= $3)
            ORDER BY entry_date ASC
            "#,
        )
        .bind(user_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Entry::from).collect())
    }

    async fn count_entries(&self, user_id: Uuid) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM entries WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn replace_entry_content(
        &self,
        user_id: Uuid,
        id: Uuid,
        content: &EntryContent,
    ) -> AppResult<Option<Entry>> {
        let row = sqlx::query_as::<_, EntryRow>(
            r#"
            UPDATE entries SET content = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(Json(content))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Entry::from))
    }

    async fn patch_entry_content(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: Map<String, Value>,
    ) -> AppResult<Option<Entry>> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes overlapping autosaves of the same entry
        let current = sqlx::query_as::<_, EntryRow>(
            "SELECT * FROM entries WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current else {
            return Ok(None);
        };
        let content = current.content.0.apply_patch(patch)?;

        let row = sqlx::query_as::<_, EntryRow>(
            r#"
            UPDATE entries SET content = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(Json(&content))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row.into()))
    }

    async fn delete_entry(&self, user_id: Uuid, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM entries WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, new_user: NewUser) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(DUPLICATE_EMAIL.into())
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn save_profile(&self, user: &User) -> AppResult<Option<User>> {
        let saved = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET name = $2, avatar = $3, preferences = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.avatar)
        .bind(&user.preferences)
        .fetch_optional(&self.pool)
        .await?;
        Ok(saved)
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_preferences(
        &self,
        id: Uuid,
        preferences: &Preferences,
    ) -> AppResult<Option<User>> {
        let saved = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET preferences = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Json(preferences))
        .fetch_optional(&self.pool)
        .await?;
        Ok(saved)
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM entries WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
