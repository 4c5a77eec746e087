use anyhow::{bail, Result};
use chrono::Local;

use crate::database::store::SessionStore;
use crate::models::night::SleepNight;

/// Store access the views need outside the tracker controller
pub struct CommandContext<'a> {
    pub store: &'a dyn SessionStore,
    pub logs: &'a mut Vec<String>,
}

/// Result of executing a command that may require leaving the current view
pub struct CommandResult {
    pub should_close: bool,
}

impl CommandResult {
    pub fn success_with_close() -> Self {
        Self { should_close: true }
    }

    pub fn success_no_close() -> Self {
        Self { should_close: false }
    }
}

pub const QUALITY_OPTIONS: [(i32, &str); 6] = [
    (0, "\u{1F62B} Very bad"),
    (1, "\u{1F641} Poor"),
    (2, "\u{1F610} So-so"),
    (3, "\u{1F642} OK"),
    (4, "\u{1F60A} Pretty good"),
    (5, "\u{1F929} Excellent"),
];

/// Rates a night. The night is re-read so a stale copy cannot undo other edits.
pub async fn execute_set_quality(
    ctx: &mut CommandContext<'_>,
    night_id: i64,
    quality: i32,
) -> Result<CommandResult> {
    if !(0..=5).contains(&quality) {
        bail!("quality {} is out of range", quality);
    }

    let mut night = match ctx.store.get(night_id).await {
        Ok(Some(night)) => night,
        Ok(None) => {
            ctx.logs.push(format!(
                "[{}] Night {} no longer exists, rating skipped",
                Local::now().format("%H:%M:%S"),
                night_id
            ));
            return Ok(CommandResult::success_with_close());
        }
        Err(e) => {
            // Stay on the rating view so the user can retry
            log::error!("Failed to load night {} for rating: {}", night_id, e);
            ctx.logs.push(format!(
                "[{}] Failed to load night {}: {}",
                Local::now().format("%H:%M:%S"),
                night_id,
                e
            ));
            return Ok(CommandResult::success_no_close());
        }
    };

    night.sleep_quality = quality;
    if let Err(e) = ctx.store.update(&night).await {
        log::error!("Failed to rate night {}: {}", night_id, e);
        ctx.logs.push(format!(
            "[{}] Failed to rate night {}: {}",
            Local::now().format("%H:%M:%S"),
            night_id,
            e
        ));
        return Ok(CommandResult::success_no_close());
    }

    ctx.logs.push(format!(
        "[{}] Rated night {} as {}",
        Local::now().format("%H:%M:%S"),
        night_id,
        quality
    ));
    Ok(CommandResult::success_with_close())
}

/// Resolves a night for the detail view. `None` covers both a night that was
/// deleted in the meantime and a failed lookup.
pub async fn execute_load_detail(ctx: &mut CommandContext<'_>, night_id: i64) -> Option<SleepNight> {
    match ctx.store.get(night_id).await {
        Ok(Some(night)) => Some(night),
        Ok(None) => {
            log::warn!("Night {} selected but not found", night_id);
            ctx.logs.push(format!("[{}] Night {} not found", Local::now().format("%H:%M:%S"), night_id));
            None
        }
        Err(e) => {
            log::error!("Failed to load night {}: {}", night_id, e);
            ctx.logs.push(format!(
                "[{}] Failed to load night {}: {}",
                Local::now().format("%H:%M:%S"),
                night_id,
                e
            ));
            None
        }
    }
}

/// All nights as pretty JSON, newest first
pub async fn export_json(store: &dyn SessionStore) -> Result<String> {
    let nights = store.get_all_nights().await?;
    Ok(serde_json::to_string_pretty(&nights)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::connection::Database;
    use crate::tests::memory_store::MemoryStore;

    async fn db_with_night() -> (Database, i64) {
        let db = Database::new("sqlite::memory:").await.expect("db");
        let mut night = SleepNight::starting_at(1_000);
        night.end_time_milli = 9_000;
        let id = db.insert(&night).await.unwrap();
        (db, id)
    }

    #[tokio::test]
    async fn test_set_quality_updates_night() {
        let (db, id) = db_with_night().await;
        let mut logs = Vec::new();
        let mut ctx = CommandContext { store: &db, logs: &mut logs };

        let result = execute_set_quality(&mut ctx, id, 4).await.unwrap();
        assert!(result.should_close);
        assert_eq!(db.get(id).await.unwrap().unwrap().sleep_quality, 4);
        assert_eq!(logs.len(), 1);
    }

    #[tokio::test]
    async fn test_set_quality_rejects_out_of_range() {
        let (db, id) = db_with_night().await;
        let mut logs = Vec::new();
        let mut ctx = CommandContext { store: &db, logs: &mut logs };

        assert!(execute_set_quality(&mut ctx, id, 6).await.is_err());
        assert_eq!(db.get(id).await.unwrap().unwrap().sleep_quality, -1);
    }

    #[tokio::test]
    async fn test_set_quality_on_deleted_night_closes() {
        let (db, id) = db_with_night().await;
        db.clear().await.unwrap();
        let mut logs = Vec::new();
        let mut ctx = CommandContext { store: &db, logs: &mut logs };

        let result = execute_set_quality(&mut ctx, id, 2).await.unwrap();
        assert!(result.should_close);
        assert!(logs[0].contains("no longer exists"));
    }

    #[tokio::test]
    async fn test_set_quality_with_unreadable_store_stays_open() {
        let store = MemoryStore::new();
        let id = store.insert(&SleepNight::starting_at(1_000)).await.unwrap();
        store.set_failing(true);
        let mut logs = Vec::new();
        let mut ctx = CommandContext { store: &store, logs: &mut logs };

        let result = execute_set_quality(&mut ctx, id, 4).await.unwrap();
        assert!(!result.should_close);
        assert!(logs[0].contains("Failed to load night"));

        store.set_failing(false);
        assert_eq!(store.get(id).await.unwrap().unwrap().sleep_quality, -1);
    }

    #[tokio::test]
    async fn test_load_detail_handles_stale_id() {
        let (db, id) = db_with_night().await;
        let mut logs = Vec::new();
        let mut ctx = CommandContext { store: &db, logs: &mut logs };

        assert_eq!(execute_load_detail(&mut ctx, id).await.map(|n| n.night_id), Some(id));
        assert!(execute_load_detail(&mut ctx, id + 41).await.is_none());
        assert!(logs[0].contains("not found"));
    }

    #[tokio::test]
    async fn test_export_json() {
        let (db, id) = db_with_night().await;
        let json = export_json(&db).await.unwrap();
        let parsed: Vec<SleepNight> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].night_id, id);
        assert_eq!(parsed[0].end_time_milli, 9_000);
    }
}
