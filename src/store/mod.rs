//! Persistence boundary.
//!
//! Handlers and the analytics engine only see these traits. The server wires
//! in [`postgres::PgStore`]; tests use the in-memory store.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::entry::{Entry, EntryContent};
use crate::models::user::{NewUser, Preferences, User};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub const DUPLICATE_ENTRY: &str = "Entry already exists for this date. Use PUT to update.";
pub const DUPLICATE_EMAIL: &str = "Email already registered";

/// Inclusive calendar-day bounds; `None` leaves a side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Fails with `AppError::Conflict` when the user already has an entry that day.
    async fn insert_entry(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        content: &EntryContent,
    ) -> AppResult<Entry>;

    /// Returns the day's entry, creating an empty one in the same statement if needed.
    async fn get_or_create_entry(&self, user_id: Uuid, date: NaiveDate) -> AppResult<Entry>;

    async fn find_entry(&self, user_id: Uuid, id: Uuid) -> AppResult<Option<Entry>>;

    async fn find_entry_by_date(&self, user_id: Uuid, date: NaiveDate)
        -> AppResult<Option<Entry>>;

    /// Newest first, with the total number of matches.
    async fn page_entries(
        &self,
        user_id: Uuid,
        range: DateRange,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Entry>, i64)>;

    /// Oldest first.
    async fn list_entries(&self, user_id: Uuid, range: DateRange) -> AppResult<Vec<Entry>>;

    async fn count_entries(&self, user_id: Uuid) -> AppResult<i64>;

    async fn replace_entry_content(
        &self,
        user_id: Uuid,
        id: Uuid,
        content: &EntryContent,
    ) -> AppResult<Option<Entry>>;

    /// Overlays `patch` onto the stored content as one atomic read-modify-write,
    /// so concurrent patches to different fields all survive.
    async fn patch_entry_content(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: Map<String, Value>,
    ) -> AppResult<Option<Entry>>;

    async fn delete_entry(&self, user_id: Uuid, id: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `AppError::Conflict` when the email is taken.
    async fn insert_user(&self, new_user: NewUser) -> AppResult<User>;

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Persists name, avatar and preferences as given.
    async fn save_profile(&self, user: &User) -> AppResult<Option<User>>;

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> AppResult<()>;

    async fn set_preferences(&self, id: Uuid, preferences: &Preferences)
        -> AppResult<Option<User>>;

    /// Removes the user and every entry they own.
    async fn delete_user(&self, id: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait Store: EntryStore + UserStore {
    async fn ping(&self) -> AppResult<()>;

    async fn close(&self);
}
