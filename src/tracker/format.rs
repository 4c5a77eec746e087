use chrono::{Local, TimeZone};

use crate::models::night::SleepNight;

pub const HISTORY_HEADER: &str = "HERE IS YOUR SLEEP DATA";

pub fn quality_string(quality: i32) -> &'static str {
    match quality {
        0 => "Very bad",
        1 => "Poor",
        2 => "So-so",
        3 => "OK",
        4 => "Pretty good",
        5 => "Excellent",
        _ => "--",
    }
}

/// Local wall-clock rendering of an epoch-millisecond timestamp.
pub fn format_time(epoch_milli: i64) -> String {
    match Local.timestamp_millis_opt(epoch_milli).single() {
        Some(time) => time.format("%a %b-%d-%Y %H:%M").to_string(),
        None => "--".to_string(),
    }
}

pub fn format_duration(milli: i64) -> String {
    let total_seconds = milli.max(0) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{}:{:02}:{:02}", hours, minutes, seconds)
}

/// One history entry, without the trailing blank line.
pub fn format_night(night: &SleepNight) -> String {
    let end = if night.is_in_progress() {
        "In progress".to_string()
    } else {
        format_time(night.end_time_milli)
    };
    format!(
        "Start: {}\nEnd: {}\nQuality: {}\nHours:Minutes:Seconds: {}",
        format_time(night.start_time_milli),
        end,
        quality_string(night.sleep_quality),
        format_duration(night.duration_milli()),
    )
}

pub fn format_nights(nights: &[SleepNight]) -> String {
    let mut out = String::from(HISTORY_HEADER);
    out.push_str("\n\n");
    for night in nights {
        out.push_str(&format_night(night));
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn night(start: i64, end: i64, quality: i32) -> SleepNight {
        SleepNight {
            night_id: 1,
            start_time_milli: start,
            end_time_milli: end,
            sleep_quality: quality,
        }
    }

    #[test]
    fn test_quality_strings() {
        assert_eq!(quality_string(0), "Very bad");
        assert_eq!(quality_string(3), "OK");
        assert_eq!(quality_string(5), "Excellent");
        assert_eq!(quality_string(-1), "--");
        assert_eq!(quality_string(6), "--");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00:00");
        assert_eq!(format_duration(61_000), "0:01:01");
        assert_eq!(format_duration(8 * 3_600_000 + 5 * 60_000 + 9_999), "8:05:09");
        assert_eq!(format_duration(-5), "0:00:00");
    }

    #[test]
    fn test_empty_history_is_just_the_header() {
        assert_eq!(format_nights(&[]), format!("{}\n\n", HISTORY_HEADER));
    }

    #[test]
    fn test_format_nights_lists_each_night() {
        let text = format_nights(&[night(0, 7_200_000, 4), night(10_000, 10_000, -1)]);
        assert!(text.starts_with(HISTORY_HEADER));
        assert_eq!(text.matches("Start: ").count(), 2);
        assert!(text.contains("Quality: Pretty good"));
        assert!(text.contains("Hours:Minutes:Seconds: 2:00:00"));
        assert!(text.contains("End: In progress"));
        assert!(text.contains("Quality: --"));
    }
}
