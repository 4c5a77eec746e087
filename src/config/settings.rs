use anyhow::Result;
use std::env;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://sleep-tracker.db";

#[derive(Debug)]
pub struct Settings {
    pub database_url: String,
    pub debug_logs_enabled: bool,
}

impl Settings {
    fn get_env_path() -> Result<std::path::PathBuf> {
        Ok(env::current_dir()?.join(".env"))
    }

    pub fn new() -> Result<Self> {
        // A missing .env is fine, everything has a default
        dotenvy::from_path(Self::get_env_path()?).ok();
        Ok(Self::from_env())
    }

    fn from_env() -> Self {
        let database_url = env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        Self {
            database_url,
            debug_logs_enabled: parse_flag(env::var("DEBUG_LOGS_ENABLED").ok().as_deref()),
        }
    }

    /// Command line value wins over `.env` and the environment.
    pub fn with_database_url(mut self, database_url: Option<&String>) -> Self {
        if let Some(url) = database_url {
            log::debug!("Database URL overridden from command line");
            self.database_url = url.clone();
        }
        self
    }
}

fn parse_flag(value: Option<&str>) -> bool {
    value.and_then(|v| v.trim().parse::<bool>().ok()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(Some("true")));
        assert!(parse_flag(Some(" true ")));
        assert!(!parse_flag(Some("false")));
        assert!(!parse_flag(Some("yes")));
        assert!(!parse_flag(None));
    }

    #[test]
    fn test_command_line_url_overrides() {
        let settings = Settings {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            debug_logs_enabled: false,
        };
        let overridden = settings.with_database_url(Some(&"sqlite::memory:".to_string()));
        assert_eq!(overridden.database_url, "sqlite::memory:");

        let kept = overridden.with_database_url(None);
        assert_eq!(kept.database_url, "sqlite::memory:");
    }
}
