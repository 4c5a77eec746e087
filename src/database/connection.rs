use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tokio::sync::watch;

use crate::database::store::SessionStore;
use crate::models::night::SleepNight;

pub struct Database {
    pool: SqlitePool,
    changes: watch::Sender<u64>,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to an in-memory URL opens its own empty database,
        // so those get a single connection that is never recycled.
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;
        let (changes, _) = watch::channel(0);
        let database = Self { pool, changes };
        database.create_table().await?;
        Ok(database)
    }

    pub async fn create_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_sleep_quality_table (
                night_id INTEGER PRIMARY KEY AUTOINCREMENT,
                start_time_milli INTEGER NOT NULL,
                end_time_milli INTEGER NOT NULL,
                quality_rating INTEGER NOT NULL DEFAULT -1
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create daily_sleep_quality_table")?;
        Ok(())
    }

    fn notify_changed(&self) {
        self.changes.send_modify(|generation| *generation += 1);
    }
}

#[async_trait]
impl SessionStore for Database {
    async fn insert(&self, night: &SleepNight) -> Result<i64> {
        let id: (i64,) = sqlx::query_as(
            "INSERT INTO daily_sleep_quality_table (start_time_milli, end_time_milli, quality_rating) VALUES (?, ?, ?) RETURNING night_id",
        )
        .bind(night.start_time_milli)
        .bind(night.end_time_milli)
        .bind(night.sleep_quality)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert night")?;
        log::debug!("Inserted night {}", id.0);
        self.notify_changed();
        Ok(id.0)
    }

    async fn update(&self, night: &SleepNight) -> Result<()> {
        sqlx::query(
            "UPDATE daily_sleep_quality_table SET start_time_milli = ?, end_time_milli = ?, quality_rating = ? WHERE night_id = ?",
        )
        .bind(night.start_time_milli)
        .bind(night.end_time_milli)
        .bind(night.sleep_quality)
        .bind(night.night_id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update night {}", night.night_id))?;
        self.notify_changed();
        Ok(())
    }

    async fn get(&self, night_id: i64) -> Result<Option<SleepNight>> {
        let night = sqlx::query_as::<_, SleepNight>(
            "SELECT night_id, start_time_milli, end_time_milli, quality_rating FROM daily_sleep_quality_table WHERE night_id = ?",
        )
        .bind(night_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to load night {}", night_id))?;
        Ok(night)
    }

    async fn get_all_nights(&self) -> Result<Vec<SleepNight>> {
        let nights = sqlx::query_as::<_, SleepNight>(
            "SELECT night_id, start_time_milli, end_time_milli, quality_rating FROM daily_sleep_quality_table ORDER BY night_id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to load nights")?;
        Ok(nights)
    }

    async fn get_tonight(&self) -> Result<Option<SleepNight>> {
        let night = sqlx::query_as::<_, SleepNight>(
            "SELECT night_id, start_time_milli, end_time_milli, quality_rating FROM daily_sleep_quality_table ORDER BY night_id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .context("failed to load latest night")?;
        Ok(night)
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM daily_sleep_quality_table")
            .execute(&self.pool)
            .await
            .context("failed to clear nights")?;
        self.notify_changed();
        Ok(())
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> Database {
        Database::new("sqlite::memory:").await.expect("db")
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_latest_is_tonight() {
        let db = memory_db().await;
        assert!(db.get_tonight().await.unwrap().is_none());

        let first = db.insert(&SleepNight::starting_at(1_000)).await.unwrap();
        let second = db.insert(&SleepNight::starting_at(2_000)).await.unwrap();
        assert!(second > first);

        let tonight = db.get_tonight().await.unwrap().expect("latest night");
        assert_eq!(tonight.night_id, second);
        assert_eq!(tonight.start_time_milli, 2_000);
        assert!(tonight.is_in_progress());
    }

    #[tokio::test]
    async fn test_all_nights_newest_first() {
        let db = memory_db().await;
        for start in [1_000, 2_000, 3_000] {
            db.insert(&SleepNight::starting_at(start)).await.unwrap();
        }
        let starts: Vec<i64> = db
            .get_all_nights()
            .await
            .unwrap()
            .iter()
            .map(|n| n.start_time_milli)
            .collect();
        assert_eq!(starts, vec![3_000, 2_000, 1_000]);
    }

    #[tokio::test]
    async fn test_update_and_get() {
        let db = memory_db().await;
        let id = db.insert(&SleepNight::starting_at(1_000)).await.unwrap();
        let mut night = db.get(id).await.unwrap().expect("night");
        night.end_time_milli = 5_000;
        night.sleep_quality = 4;
        db.update(&night).await.unwrap();

        let stored = db.get(id).await.unwrap().expect("night");
        assert_eq!(stored, night);
        assert!(stored.is_completed());
        assert!(db.get(id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_everything_and_notifies() {
        let db = memory_db().await;
        let mut changes = db.changes();
        db.insert(&SleepNight::starting_at(1_000)).await.unwrap();
        db.insert(&SleepNight::starting_at(2_000)).await.unwrap();
        assert!(changes.has_changed().unwrap());
        changes.mark_unchanged();

        db.clear().await.unwrap();
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), 3);
        assert!(db.get_all_nights().await.unwrap().is_empty());
        assert!(db.get_tonight().await.unwrap().is_none());
    }
}
