use thiserror::Error;

/// Store failures surfaced to the UI on the controller's error channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("failed to start tracking: {0}")]
    Start(String),
    #[error("failed to stop tracking: {0}")]
    Stop(String),
    #[error("failed to clear sleep data: {0}")]
    Clear(String),
    #[error("failed to load sleep data: {0}")]
    Load(String),
}

impl TrackerError {
    pub fn start(err: anyhow::Error) -> Self {
        Self::Start(format!("{:#}", err))
    }

    pub fn stop(err: anyhow::Error) -> Self {
        Self::Stop(format!("{:#}", err))
    }

    pub fn clear(err: anyhow::Error) -> Self {
        Self::Clear(format!("{:#}", err))
    }

    pub fn load(err: anyhow::Error) -> Self {
        Self::Load(format!("{:#}", err))
    }
}
