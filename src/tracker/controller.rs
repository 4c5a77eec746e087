use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;

use crate::database::store::SessionStore;
use crate::models::night::{now_milli, SleepNight};
use crate::tracker::error::TrackerError;
use crate::tracker::format::format_nights;
use crate::tracker::observable::{computed, OneShot, Signal};

/// What the controller knows about the night currently being tracked.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Tonight {
    /// The initial load from the store has not finished yet.
    #[default]
    Unresolved,
    Idle,
    Tracking(SleepNight),
}

impl Tonight {
    /// Only an in-progress latest night counts as tonight.
    pub fn from_latest(latest: Option<SleepNight>) -> Self {
        match latest {
            Some(night) if night.is_in_progress() => Tonight::Tracking(night),
            _ => Tonight::Idle,
        }
    }

    pub fn night(&self) -> Option<&SleepNight> {
        match self {
            Tonight::Tracking(night) => Some(night),
            _ => None,
        }
    }
}

#[derive(Debug)]
enum Command {
    Start,
    Stop,
    Clear,
    SelectNight(i64),
    Settled(oneshot::Sender<()>),
}

/// Owns the sleep-tracking lifecycle and everything the UI observes.
///
/// Actions are fire-and-forget: they are queued to a single worker task and
/// handled in the order they were issued. The initial load of tonight runs
/// on its own, so an action issued before it resolves races with it.
pub struct SleepTrackerController {
    commands: mpsc::UnboundedSender<Command>,
    tonight: watch::Receiver<Tonight>,
    nights: watch::Receiver<Option<Vec<SleepNight>>>,
    nights_display: watch::Receiver<String>,
    start_visible: watch::Receiver<bool>,
    stop_visible: watch::Receiver<bool>,
    clear_visible: watch::Receiver<bool>,
    navigate_to_quality: OneShot<SleepNight>,
    navigate_to_detail: OneShot<i64>,
    show_snackbar: OneShot<()>,
    errors: OneShot<TrackerError>,
    // Dropping the set aborts every background task.
    _tasks: JoinSet<()>,
}

impl SleepTrackerController {
    /// Must be called inside a tokio runtime.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        let mut tasks = JoinSet::new();
        let (tonight_tx, tonight) = watch::channel(Tonight::Unresolved);
        let (nights_tx, nights) = watch::channel(None);
        let navigate_to_quality = OneShot::new();
        let navigate_to_detail = OneShot::new();
        let show_snackbar = OneShot::new();
        let errors = OneShot::new();

        tasks.spawn(initialize_tonight(
            Arc::clone(&store),
            tonight_tx.clone(),
            errors.clone(),
        ));
        tasks.spawn(watch_nights(Arc::clone(&store), nights_tx, errors.clone()));

        let nights_display = computed(&mut tasks, nights.clone(), |nights| {
            format_nights(nights.as_deref().unwrap_or_default())
        });
        // An unloaded list is treated as nothing to clear.
        let clear_visible = computed(&mut tasks, nights.clone(), |nights| {
            nights.as_ref().is_some_and(|nights| !nights.is_empty())
        });
        let start_visible = computed(&mut tasks, tonight.clone(), |tonight| {
            *tonight == Tonight::Idle
        });
        let stop_visible = computed(&mut tasks, tonight.clone(), |tonight| {
            matches!(tonight, Tonight::Tracking(_))
        });

        let (commands, receiver) = mpsc::unbounded_channel();
        let worker = Worker {
            store,
            tonight: tonight_tx,
            navigate_to_quality: navigate_to_quality.clone(),
            navigate_to_detail: navigate_to_detail.clone(),
            show_snackbar: show_snackbar.clone(),
            errors: errors.clone(),
        };
        tasks.spawn(worker.run(receiver));

        Self {
            commands,
            tonight,
            nights,
            nights_display,
            start_visible,
            stop_visible,
            clear_visible,
            navigate_to_quality,
            navigate_to_detail,
            show_snackbar,
            errors,
            _tasks: tasks,
        }
    }

    pub fn on_start_tracking(&self) {
        self.send(Command::Start);
    }

    pub fn on_stop_tracking(&self) {
        self.send(Command::Stop);
    }

    pub fn on_clear(&self) {
        self.send(Command::Clear);
    }

    /// Queued like the other actions, so it fires after anything issued
    /// before it. The id is forwarded as-is; resolving it is up to the
    /// detail view.
    pub fn on_sleep_night_clicked(&self, night_id: i64) {
        self.send(Command::SelectNight(night_id));
    }

    pub fn done_navigating(&self) {
        self.navigate_to_quality.acknowledge();
    }

    pub fn on_sleep_data_quality_navigated(&self) {
        self.navigate_to_detail.acknowledge();
    }

    pub fn done_showing_snackbar(&self) {
        self.show_snackbar.acknowledge();
    }

    pub fn done_showing_error(&self) {
        self.errors.acknowledge();
    }

    /// Resolves once every action issued before this call has been handled.
    pub async fn settled(&self) {
        let (done, wait) = oneshot::channel();
        self.send(Command::Settled(done));
        let _ = wait.await;
    }

    pub fn tonight(&self) -> watch::Receiver<Tonight> {
        self.tonight.clone()
    }

    /// `None` until the first fetch from the store completes.
    pub fn nights(&self) -> watch::Receiver<Option<Vec<SleepNight>>> {
        self.nights.clone()
    }

    pub fn nights_display(&self) -> watch::Receiver<String> {
        self.nights_display.clone()
    }

    pub fn start_visible(&self) -> watch::Receiver<bool> {
        self.start_visible.clone()
    }

    pub fn stop_visible(&self) -> watch::Receiver<bool> {
        self.stop_visible.clone()
    }

    pub fn clear_visible(&self) -> watch::Receiver<bool> {
        self.clear_visible.clone()
    }

    pub fn navigate_to_quality(&self) -> watch::Receiver<Signal<SleepNight>> {
        self.navigate_to_quality.subscribe()
    }

    pub fn navigate_to_detail(&self) -> watch::Receiver<Signal<i64>> {
        self.navigate_to_detail.subscribe()
    }

    pub fn show_snackbar(&self) -> watch::Receiver<Signal<()>> {
        self.show_snackbar.subscribe()
    }

    pub fn errors(&self) -> watch::Receiver<Signal<TrackerError>> {
        self.errors.subscribe()
    }

    fn send(&self, command: Command) {
        if let Err(e) = self.commands.send(command) {
            log::warn!("Tracker worker has stopped, dropping {:?}", e.0);
        }
    }
}

async fn initialize_tonight(
    store: Arc<dyn SessionStore>,
    tonight: watch::Sender<Tonight>,
    errors: OneShot<TrackerError>,
) {
    match store.get_tonight().await {
        Ok(latest) => {
            let resolved = Tonight::from_latest(latest);
            log::debug!("Initial tonight resolved to {:?}", resolved);
            tonight.send_replace(resolved);
        }
        Err(e) => {
            // Leave the controller usable; nothing can be in progress that we know of
            let err = TrackerError::load(e);
            log::error!("{}", err);
            tonight.send_replace(Tonight::Idle);
            errors.arm(err);
        }
    }
}

/// Re-fetches the full history after every store mutation.
async fn watch_nights(
    store: Arc<dyn SessionStore>,
    nights: watch::Sender<Option<Vec<SleepNight>>>,
    errors: OneShot<TrackerError>,
) {
    let mut changes = store.changes();
    loop {
        changes.mark_unchanged();
        match store.get_all_nights().await {
            Ok(all) => {
                log::debug!("Loaded {} nights", all.len());
                nights.send_replace(Some(all));
            }
            Err(e) => {
                let err = TrackerError::load(e);
                log::error!("{}", err);
                errors.arm(err);
            }
        }
        if changes.changed().await.is_err() {
            break;
        }
    }
}

struct Worker {
    store: Arc<dyn SessionStore>,
    tonight: watch::Sender<Tonight>,
    navigate_to_quality: OneShot<SleepNight>,
    navigate_to_detail: OneShot<i64>,
    show_snackbar: OneShot<()>,
    errors: OneShot<TrackerError>,
}

impl Worker {
    async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            let result = match command {
                Command::Start => self.start_tracking().await.map_err(TrackerError::start),
                Command::Stop => self.stop_tracking().await.map_err(TrackerError::stop),
                Command::Clear => self.clear().await.map_err(TrackerError::clear),
                Command::SelectNight(night_id) => {
                    self.navigate_to_detail.arm(night_id);
                    Ok(())
                }
                Command::Settled(done) => {
                    let _ = done.send(());
                    Ok(())
                }
            };
            if let Err(err) = result {
                log::error!("{}", err);
                self.errors.arm(err);
            }
        }
        log::debug!("Tracker worker finished");
    }

    async fn start_tracking(&self) -> Result<()> {
        let current = self.tonight.borrow().night().map(|night| night.night_id);
        if let Some(night_id) = current {
            log::warn!("Ignoring start, night {} is already in progress", night_id);
            return Ok(());
        }

        let night = SleepNight::starting_at(now_milli());
        let night_id = self.store.insert(&night).await?;
        log::info!("Started tracking night {}", night_id);

        match self.store.get_tonight().await {
            Ok(latest) => {
                self.tonight.send_replace(Tonight::from_latest(latest));
                Ok(())
            }
            Err(e) => {
                // The night is stored, so tonight must not fall back to Idle
                self.tonight.send_replace(Tonight::Tracking(SleepNight { night_id, ..night }));
                Err(e)
            }
        }
    }

    async fn stop_tracking(&self) -> Result<()> {
        let current = self.tonight.borrow().night().cloned();
        let Some(mut night) = current else {
            log::debug!("Stop requested with nothing in progress");
            return Ok(());
        };

        // A night stopped within its first millisecond still has to read as completed
        night.end_time_milli = now_milli().max(night.start_time_milli + 1);
        self.store.update(&night).await?;
        log::info!(
            "Stopped tracking night {} after {}s",
            night.night_id,
            night.duration_milli() / 1000
        );

        self.tonight.send_replace(Tonight::Idle);
        self.navigate_to_quality.arm(night);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.store.clear().await?;
        log::info!("Cleared all nights");
        self.tonight.send_replace(Tonight::Idle);
        self.show_snackbar.arm(());
        Ok(())
    }
}
