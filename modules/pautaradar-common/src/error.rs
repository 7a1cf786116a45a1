use thiserror::Error;

#[derive(Error, Debug)]
pub enum RadarError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Invalid source profile: {0}")]
    InvalidProfile(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Action blocked: {0}")]
    ActionBlocked(String),

    #[error("Merge already applied for {from_event_id} -> {to_event_id}")]
    MergeIdempotent { from_event_id: i64, to_event_id: i64 },

    #[error("Invalid split: {0}")]
    SplitInvalid(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
