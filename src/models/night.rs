use serde::{Deserialize, Serialize};

/// Rating stored on a night that has not been rated yet.
pub const UNRATED: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize, Deserialize)]
pub struct SleepNight {
    pub night_id: i64,
    pub start_time_milli: i64,
    pub end_time_milli: i64,
    #[sqlx(rename = "quality_rating")]
    pub sleep_quality: i32,
}

impl SleepNight {
    /// A fresh, not yet inserted night that starts (and ends) at `now_milli`.
    pub fn starting_at(now_milli: i64) -> Self {
        Self {
            night_id: 0,
            start_time_milli: now_milli,
            end_time_milli: now_milli,
            sleep_quality: UNRATED,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.end_time_milli == self.start_time_milli
    }

    pub fn is_completed(&self) -> bool {
        self.end_time_milli > self.start_time_milli
    }

    pub fn duration_milli(&self) -> i64 {
        (self.end_time_milli - self.start_time_milli).max(0)
    }
}

pub fn now_milli() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_night_is_in_progress() {
        let night = SleepNight::starting_at(1_000);
        assert!(night.is_in_progress());
        assert!(!night.is_completed());
        assert_eq!(night.sleep_quality, UNRATED);
        assert_eq!(night.duration_milli(), 0);
    }

    #[test]
    fn test_completed_night() {
        let mut night = SleepNight::starting_at(1_000);
        night.end_time_milli = 3_601_000;
        assert!(night.is_completed());
        assert!(!night.is_in_progress());
        assert_eq!(night.duration_milli(), 3_600_000);
    }
}
