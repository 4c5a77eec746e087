use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};
use ratatui::Frame;

use crate::models::night::{now_milli, SleepNight};
use crate::tracker::controller::Tonight;
use crate::tracker::format::{format_duration, format_night, format_time, quality_string};
use crate::ui::app::{App, AppState};
use crate::ui::commands::QUALITY_OPTIONS;

pub fn draw(app: &App, f: &mut Frame) {
    let size = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1), Constraint::Length(3)].as_ref())
        .split(size);

    let status = match &app.tonight {
        Tonight::Unresolved => "Loading...".to_string(),
        Tonight::Idle => "Not tracking".to_string(),
        Tonight::Tracking(night) => format!(
            "Sleeping since {} ({})",
            format_time(night.start_time_milli),
            format_duration(now_milli() - night.start_time_milli)
        ),
    };
    let status_widget = Paragraph::new(status).block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status_widget, chunks[0]);

    draw_tracker(app, f, chunks[1]);
    draw_footer(app, f, chunks[2]);

    match &app.state {
        AppState::Tracker => {}
        AppState::Quality { night, selected_index } => draw_quality(f, size, night, *selected_index),
        AppState::Detail { night_id, night } => draw_detail(f, size, *night_id, night.as_ref()),
    }

    if let Some((message, _)) = &app.message {
        let area = Rect {
            x: size.x + 2,
            y: size.height.saturating_sub(6),
            width: size.width.saturating_sub(4).min(60),
            height: 3.min(size.height),
        };
        f.render_widget(Clear, area);
        let toast = Paragraph::new(message.as_str())
            .style(Style::default().fg(Color::Black).bg(Color::Yellow))
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(toast, area);
    }
}

fn draw_tracker(app: &App, f: &mut Frame, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)].as_ref())
        .split(area);

    let items: Vec<ListItem> = app
        .nights
        .iter()
        .enumerate()
        .map(|(i, night)| {
            let prefix = if i == app.selected_index { "→ " } else { "  " };
            let style = if i == app.selected_index {
                Style::default().fg(Color::Yellow)
            } else if night.is_in_progress() {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(format!("{}{}", prefix, row_label(night)))).style(style)
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Nights (↑/↓, Enter for details)"));
    f.render_widget(list, columns[0]);

    let history = Paragraph::new(app.nights_display.as_str())
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Sleep Data"));
    f.render_widget(history, columns[1]);
}

fn row_label(night: &SleepNight) -> String {
    if night.is_completed() {
        format!(
            "{}  {}  {}",
            format_time(night.start_time_milli),
            format_duration(night.duration_milli()),
            quality_string(night.sleep_quality)
        )
    } else {
        format!("{}  in progress", format_time(night.start_time_milli))
    }
}

/// Key hints only list the controls that are currently visible.
fn draw_footer(app: &App, f: &mut Frame, area: Rect) {
    let mut hints = Vec::new();
    match &app.state {
        AppState::Tracker => {
            if app.start_visible {
                hints.push("[s] Start");
            }
            if app.stop_visible {
                hints.push("[t] Stop");
            }
            if app.clear_visible {
                hints.push("[c] Clear");
            }
            hints.push("[q] Quit");
        }
        AppState::Quality { .. } => hints.extend(["[0-5] Rate", "[↑/↓] Select", "[Enter] Save", "[Esc] Skip"]),
        AppState::Detail { .. } => hints.push("[Esc] Back"),
    }
    let footer = Paragraph::new(hints.join(" | ")).block(Block::default().borders(Borders::ALL).title("Controls"));
    f.render_widget(footer, area);
}

fn draw_quality(f: &mut Frame, size: Rect, night: &SleepNight, selected_index: usize) {
    let popup_area = centered_rect(50, 50, size);
    f.render_widget(Clear, popup_area);

    let items: Vec<ListItem> = QUALITY_OPTIONS
        .iter()
        .enumerate()
        .map(|(i, (value, label))| {
            let prefix = if i == selected_index { "→ " } else { "  " };
            let style = if i == selected_index {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(format!("{}{} {}", prefix, value, label))).style(style)
        })
        .collect();

    let title = format!("How did you sleep? ({})", format_duration(night.duration_milli()));
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(list, popup_area);
}

fn draw_detail(f: &mut Frame, size: Rect, night_id: i64, night: Option<&SleepNight>) {
    let popup_area = centered_rect(60, 40, size);
    f.render_widget(Clear, popup_area);

    let text = match night {
        Some(night) => format_night(night),
        None => "Night not found".to_string(),
    };
    let detail = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(format!("Night #{}", night_id)));
    f.render_widget(detail, popup_area);
}

pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
