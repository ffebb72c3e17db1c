use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("schedule state not found: {0}")]
    NotFound(String),

    #[error("corrupt schedule state: {0}")]
    CorruptState(String),

    #[error("no daily sync times configured")]
    NoScheduleConfigured,
}
