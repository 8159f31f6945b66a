use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{DateRange, EntryStore, Store, UserStore, DUPLICATE_EMAIL, DUPLICATE_ENTRY};
use crate::error::{AppError, AppResult};
use crate::models::entry::{Entry, EntryContent};
use crate::models::user::{NewUser, Preferences, User};

/// In-process store with the same uniqueness rules as the Postgres schema.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    entries: HashMap<Uuid, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.inner.lock().unwrap()
    }
}

impl Tables {
    fn entry_on(&self, user_id: Uuid, date: NaiveDate) -> Option<&Entry> {
        self.entries
            .values()
            .find(|e| e.user_id == user_id && e.date == date)
    }

    fn entries_for(&self, user_id: Uuid, range: DateRange) -> Vec<Entry> {
        let mut found: Vec<Entry> = self
            .entries
            .values()
            .filter(|e| e.user_id == user_id && range.contains(e.date))
            .cloned()
            .collect();
        found.sort_by_key(|e| e.date);
        found
    }

    fn new_entry(&mut self, user_id: Uuid, date: NaiveDate, content: EntryContent) -> Entry {
        let now = Utc::now();
        let entry = Entry {
            id: Uuid::new_v4(),
            user_id,
            date,
            content,
            created_at: now,
            updated_at: now,
        };
        self.entries.insert(entry.id, entry.clone());
        entry
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn insert_entry(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        content: &EntryContent,
    ) -> AppResult<Entry> {
        let mut tables = self.tables();
        if tables.entry_on(user_id, date).is_some() {
            return Err(AppError::Conflict(DUPLICATE_ENTRY.into()));
        }
        Ok(tables.new_entry(user_id, date, content.clone()))
    }

    async fn get_or_create_entry(&self, user_id: Uuid, date: NaiveDate) -> AppResult<Entry> {
        let mut tables = self.tables();
        if let Some(existing) = tables.entry_on(user_id, date) {
            return Ok(existing.clone());
        }
        Ok(tables.new_entry(user_id, date, EntryContent::default()))
    }

    async fn find_entry(&self, user_id: Uuid, id: Uuid) -> AppResult<Option<Entry>> {
        Ok(self
            .tables()
            .entries
            .get(&id)
            .filter(|e| e.user_id == user_id)
            .cloned())
    }

    async fn find_entry_by_date(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> AppResult<Option<Entry>> {
        Ok(self.tables().entry_on(user_id, date).cloned())
    }

    async fn page_entries(
        &self,
        user_id: Uuid,
        range: DateRange,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Entry>, i64)> {
        let mut all = self.tables().entries_for(user_id, range);
        all.reverse();
        let total = all.len() as i64;
        let page = all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn list_entries(&self, user_id: Uuid, range: DateRange) -> AppResult<Vec<Entry>> {
        Ok(self.tables().entries_for(user_id, range))
    }

    async fn count_entries(&self, user_id: Uuid) -> AppResult<i64> {
        Ok(self
            .tables()
            .entries
            .values()
            .filter(|e| e.user_id == user_id)
            .count() as i64)
    }

    async fn replace_entry_content(
        &self,
        user_id: Uuid,
        id: Uuid,
        content: &EntryContent,
    ) -> AppResult<Option<Entry>> {
        let mut tables = self.tables();
        Ok(tables
            .entries
            .get_mut(&id)
            .filter(|e| e.user_id == user_id)
            .map(|e| {
                e.content = content.clone();
                e.updated_at = Utc::now();
                e.clone()
            }))
    }

    async fn patch_entry_content(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: Map<String, Value>,
    ) -> AppResult<Option<Entry>> {
        let mut tables = self.tables();
        let Some(entry) = tables
            .entries
            .get_mut(&id)
            .filter(|e| e.user_id == user_id)
        else {
            return Ok(None);
        };
        entry.content = entry.content.apply_patch(patch)?;
        entry.updated_at = Utc::now();
        Ok(Some(entry.clone()))
    }

    async fn delete_entry(&self, user_id: Uuid, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables();
        let owned = tables.entries.get(&id).is_some_and(|e| e.user_id == user_id);
        if owned {
            tables.entries.remove(&id);
        }
        Ok(owned)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, new_user: NewUser) -> AppResult<User> {
        let mut tables = self.tables();
        if tables.users.values().any(|u| u.email == new_user.email) {
            return Err(AppError::Conflict(DUPLICATE_EMAIL.into()));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            avatar: None,
            preferences: sqlx::types::Json(Preferences::new()),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.tables().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn save_profile(&self, user: &User) -> AppResult<Option<User>> {
        let mut tables = self.tables();
        Ok(tables.users.get_mut(&user.id).map(|stored| {
            stored.name = user.name.clone();
            stored.avatar = user.avatar.clone();
            stored.preferences = user.preferences.clone();
            stored.updated_at = Utc::now();
            stored.clone()
        }))
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        if let Some(user) = self.tables().users.get_mut(&id) {
            user.password_hash = password_hash.to_string();
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_preferences(
        &self,
        id: Uuid,
        preferences: &Preferences,
    ) -> AppResult<Option<User>> {
        let mut tables = self.tables();
        Ok(tables.users.get_mut(&id).map(|user| {
            user.preferences = sqlx::types::Json(preferences.clone());
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables();
        tables.entries.retain(|_, e| e.user_id != id);
        Ok(tables.users.remove(&id).is_some())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_second_create_same_day_conflicts() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let date = day(2026, 3, 1);

        store
            .insert_entry(user, date, &EntryContent::default())
            .await
            .unwrap();
        let second = store.insert_entry(user, date, &EntryContent::default()).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        // Another user may still journal that day
        assert!(store
            .insert_entry(Uuid::new_v4(), date, &EntryContent::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_racing_creates_admit_exactly_one() {
        let store = Arc::new(MemoryStore::new());
        let user = Uuid::new_v4();
        let date = day(2026, 3, 2);

        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.insert_entry(user, date, &EntryContent::default()).await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.insert_entry(user, date, &EntryContent::default()).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(AppError::Conflict(_))))
                .count(),
            1
        );
        assert_eq!(store.count_entries(user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let date = day(2026, 3, 3);

        let first = store.get_or_create_entry(user, date).await.unwrap();
        let second = store.get_or_create_entry(user, date).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.count_entries(user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cross_user_access_is_hidden() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let entry = store
            .insert_entry(owner, day(2026, 3, 4), &EntryContent::default())
            .await
            .unwrap();

        assert!(store.find_entry(other, entry.id).await.unwrap().is_none());
        assert!(!store.delete_entry(other, entry.id).await.unwrap());
        assert!(store
            .replace_entry_content(other, entry.id, &EntryContent::default())
            .await
            .unwrap()
            .is_none());
        assert!(store.find_entry(owner, entry.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_overlapping_patches_keep_both_fields() {
        let store = Arc::new(MemoryStore::new());
        let user = Uuid::new_v4();
        let entry = store
            .insert_entry(user, day(2026, 3, 5), &EntryContent::default())
            .await
            .unwrap();

        let mut mood = Map::new();
        mood.insert("mood".into(), serde_json::json!(4));
        let mut gratitude = Map::new();
        gratitude.insert("gratitude".into(), serde_json::json!(["tea"]));

        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.patch_entry_content(user, entry.id, mood).await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.patch_entry_content(user, entry.id, gratitude).await })
        };
        assert!(a.await.unwrap().unwrap().is_some());
        assert!(b.await.unwrap().unwrap().is_some());

        let stored = store.find_entry(user, entry.id).await.unwrap().unwrap();
        assert_eq!(stored.content.trackers.mood, Some(4));
        assert_eq!(stored.content.reflection.gratitude, vec!["tea".to_string()]);
    }

    #[tokio::test]
    async fn test_rejected_patch_leaves_entry_unchanged() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let entry = store
            .insert_entry(user, day(2026, 3, 6), &EntryContent::default())
            .await
            .unwrap();

        let mut bad = Map::new();
        bad.insert("mood".into(), serde_json::json!(9));
        assert!(matches!(
            store.patch_entry_content(user, entry.id, bad).await,
            Err(AppError::Validation(_))
        ));
        assert!(store
            .patch_entry_content(Uuid::new_v4(), entry.id, Map::new())
            .await
            .unwrap()
            .is_none());

        let stored = store.find_entry(user, entry.id).await.unwrap().unwrap();
        assert_eq!(stored.content.trackers.mood, None);
    }

    #[tokio::test]
    async fn test_page_is_newest_first() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        for d in 1..=5 {
            store
                .insert_entry(user, day(2026, 4, d), &EntryContent::default())
                .await
                .unwrap();
        }

        let (page, total) = store
            .page_entries(user, DateRange::all(), 0, 2)
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page[0].date, day(2026, 4, 5));
        assert_eq!(page[1].date, day(2026, 4, 4));

        let (filtered, total) = store
            .page_entries(user, DateRange::between(day(2026, 4, 2), day(2026, 4, 3)), 0, 10)
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(filtered.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let store = MemoryStore::new();
        let user = store
            .insert_user(NewUser {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        store
            .insert_entry(user.id, day(2026, 5, 1), &EntryContent::default())
            .await
            .unwrap();

        assert!(store.delete_user(user.id).await.unwrap());
        assert_eq!(store.count_entries(user.id).await.unwrap(), 0);
        assert!(store.find_user(user.id).await.unwrap().is_none());
    }
}
