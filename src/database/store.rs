use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::watch;

use crate::models::night::SleepNight;

/// Persistence contract the tracker controller works against.
///
/// `changes` hands out a generation counter that is bumped after every
/// successful mutation, which is what makes `get_all_nights` observable.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts a night and returns the id assigned to it.
    async fn insert(&self, night: &SleepNight) -> Result<i64>;
    async fn update(&self, night: &SleepNight) -> Result<()>;
    async fn get(&self, night_id: i64) -> Result<Option<SleepNight>>;
    /// All nights, newest first.
    async fn get_all_nights(&self) -> Result<Vec<SleepNight>>;
    /// The most recently inserted night, if any.
    async fn get_tonight(&self) -> Result<Option<SleepNight>>;
    async fn clear(&self) -> Result<()>;
    fn changes(&self) -> watch::Receiver<u64>;
}
