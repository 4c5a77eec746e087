use anyhow::Result;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::database::store::SessionStore;
use crate::models::night::SleepNight;
use crate::tracker::controller::{SleepTrackerController, Tonight};
use crate::tracker::error::TrackerError;
use crate::tracker::observable::Signal;
use crate::ui::commands::{self, CommandContext, QUALITY_OPTIONS};
use crate::ui::render;

const MESSAGE_DURATION: Duration = Duration::from_secs(3);
pub const CLEARED_MESSAGE: &str = "Cleared all sleep data";

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Tracker,
    Quality { night: SleepNight, selected_index: usize },
    Detail { night_id: i64, night: Option<SleepNight> },
}

/// Terminal front end. Renders what the controller publishes and turns key
/// presses into controller actions.
pub struct App {
    pub state: AppState,
    store: Arc<dyn SessionStore>,
    controller: SleepTrackerController,
    nights_rx: watch::Receiver<Option<Vec<SleepNight>>>,
    nights_display_rx: watch::Receiver<String>,
    tonight_rx: watch::Receiver<Tonight>,
    start_visible_rx: watch::Receiver<bool>,
    stop_visible_rx: watch::Receiver<bool>,
    clear_visible_rx: watch::Receiver<bool>,
    navigate_to_quality_rx: watch::Receiver<Signal<SleepNight>>,
    navigate_to_detail_rx: watch::Receiver<Signal<i64>>,
    show_snackbar_rx: watch::Receiver<Signal<()>>,
    errors_rx: watch::Receiver<Signal<TrackerError>>,
    pub nights: Vec<SleepNight>,
    pub nights_display: String,
    pub tonight: Tonight,
    pub start_visible: bool,
    pub stop_visible: bool,
    pub clear_visible: bool,
    pub selected_index: usize,
    pub message: Option<(String, Instant)>,
    pub logs: Vec<String>,
}

impl App {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        let controller = SleepTrackerController::new(Arc::clone(&store));
        Self {
            state: AppState::Tracker,
            nights_rx: controller.nights(),
            nights_display_rx: controller.nights_display(),
            tonight_rx: controller.tonight(),
            start_visible_rx: controller.start_visible(),
            stop_visible_rx: controller.stop_visible(),
            clear_visible_rx: controller.clear_visible(),
            navigate_to_quality_rx: controller.navigate_to_quality(),
            navigate_to_detail_rx: controller.navigate_to_detail(),
            show_snackbar_rx: controller.show_snackbar(),
            errors_rx: controller.errors(),
            store,
            controller,
            nights: vec![],
            nights_display: String::new(),
            tonight: Tonight::Unresolved,
            start_visible: false,
            stop_visible: false,
            clear_visible: false,
            selected_index: 0,
            message: None,
            logs: vec![],
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        log::info!("Starting UI...");

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown_flag))?;
        signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown_flag))?;

        if let Err(e) = enable_raw_mode() {
            eprintln!("Failed to enable raw mode: {}. A real terminal is required to run the tracker.", e);
            return Err(anyhow::anyhow!("Terminal raw mode not supported: {}", e));
        }
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen, EnableMouseCapture) {
            eprintln!("Failed to enter alternate screen: {}", e);
            let _ = disable_raw_mode();
            return Err(anyhow::anyhow!("Failed to setup terminal: {}", e));
        }
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal, &shutdown_flag).await;

        // Let queued start/stop/clear reach the store before leaving
        self.controller.settled().await;

        if let Err(e) = disable_raw_mode() {
            log::warn!("Failed to disable raw mode: {}", e);
        }
        if let Err(e) = execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture) {
            log::warn!("Failed to leave alternate screen: {}", e);
        }
        if let Err(e) = terminal.show_cursor() {
            log::warn!("Failed to show cursor: {}", e);
        }
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        shutdown_flag: &AtomicBool,
    ) -> Result<()> {
        loop {
            if shutdown_flag.load(Ordering::Relaxed) {
                log::info!("Received shutdown signal, exiting...");
                return Ok(());
            }

            self.sync_state();
            self.handle_signals().await;
            self.expire_message();

            terminal.draw(|f| render::draw(self, f))?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    log::debug!("Key pressed: {:?} in state: {:?}", key.code, self.state);
                    if !self.handle_key(key.code).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Copies the latest published values into render-ready fields.
    pub fn sync_state(&mut self) {
        if self.nights_rx.has_changed().unwrap_or(false) {
            self.nights = self.nights_rx.borrow_and_update().clone().unwrap_or_default();
            self.selected_index = self.selected_index.min(self.nights.len().saturating_sub(1));
        }
        if self.nights_display_rx.has_changed().unwrap_or(false) {
            self.nights_display = self.nights_display_rx.borrow_and_update().clone();
        }
        if self.tonight_rx.has_changed().unwrap_or(false) {
            self.tonight = self.tonight_rx.borrow_and_update().clone();
        }
        self.start_visible = *self.start_visible_rx.borrow();
        self.stop_visible = *self.stop_visible_rx.borrow();
        self.clear_visible = *self.clear_visible_rx.borrow();
    }

    /// Acts on armed one-shot channels and acknowledges each right away, so a
    /// redraw never repeats a navigation or a message.
    pub async fn handle_signals(&mut self) {
        let quality = self.navigate_to_quality_rx.borrow_and_update().armed().cloned();
        if let Some(night) = quality {
            log::info!("Navigating to quality rating for night {}", night.night_id);
            self.state = AppState::Quality { night, selected_index: 3 };
            self.controller.done_navigating();
        }

        let detail = self.navigate_to_detail_rx.borrow_and_update().armed().copied();
        if let Some(night_id) = detail {
            let mut ctx = CommandContext { store: self.store.as_ref(), logs: &mut self.logs };
            let night = commands::execute_load_detail(&mut ctx, night_id).await;
            self.state = AppState::Detail { night_id, night };
            self.controller.on_sleep_data_quality_navigated();
        }

        let cleared = self.show_snackbar_rx.borrow_and_update().is_armed();
        if cleared {
            self.show_message(CLEARED_MESSAGE);
            self.controller.done_showing_snackbar();
        }

        let error = self.errors_rx.borrow_and_update().armed().cloned();
        if let Some(err) = error {
            self.show_message(&err.to_string());
            self.controller.done_showing_error();
        }
    }

    fn show_message(&mut self, message: &str) {
        self.logs.push(format!("[{}] {}", chrono::Local::now().format("%H:%M:%S"), message));
        self.message = Some((message.to_string(), Instant::now()));
    }

    fn expire_message(&mut self) {
        if let Some((_, shown_at)) = &self.message {
            if shown_at.elapsed() >= MESSAGE_DURATION {
                self.message = None;
            }
        }
    }

    /// Returns `false` when the app should exit.
    pub async fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        match self.state.clone() {
            AppState::Tracker => match code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(false),
                KeyCode::Char('s') if self.start_visible => self.controller.on_start_tracking(),
                KeyCode::Char('t') if self.stop_visible => self.controller.on_stop_tracking(),
                KeyCode::Char('c') if self.clear_visible => self.controller.on_clear(),
                KeyCode::Up => self.selected_index = self.selected_index.saturating_sub(1),
                KeyCode::Down => {
                    if self.selected_index + 1 < self.nights.len() {
                        self.selected_index += 1;
                    }
                }
                KeyCode::Enter => {
                    if let Some(night) = self.nights.get(self.selected_index) {
                        self.controller.on_sleep_night_clicked(night.night_id);
                    }
                }
                _ => {}
            },
            AppState::Quality { night, selected_index } => match code {
                KeyCode::Esc => self.state = AppState::Tracker,
                KeyCode::Up => {
                    self.state = AppState::Quality { night, selected_index: selected_index.saturating_sub(1) };
                }
                KeyCode::Down => {
                    let selected_index = (selected_index + 1).min(QUALITY_OPTIONS.len() - 1);
                    self.state = AppState::Quality { night, selected_index };
                }
                KeyCode::Enter => self.rate(night.night_id, QUALITY_OPTIONS[selected_index].0).await?,
                KeyCode::Char(c @ '0'..='5') => {
                    let quality = c.to_digit(10).map(|d| d as i32).unwrap_or_default();
                    self.rate(night.night_id, quality).await?;
                }
                _ => {}
            },
            AppState::Detail { .. } => match code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') | KeyCode::Backspace => {
                    self.state = AppState::Tracker;
                }
                _ => {}
            },
        }
        Ok(true)
    }

    async fn rate(&mut self, night_id: i64, quality: i32) -> Result<()> {
        let mut ctx = CommandContext { store: self.store.as_ref(), logs: &mut self.logs };
        let result = commands::execute_set_quality(&mut ctx, night_id, quality).await?;
        if result.should_close {
            self.state = AppState::Tracker;
        }
        Ok(())
    }
}
