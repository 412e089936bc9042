use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurgeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Performance map has no reference curves")]
    MissingReferenceCurves,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SurgeResult<T> = Result<T, SurgeError>;

/// Reject a non-finite or non-positive time step before it reaches
/// derivative or rate-limit arithmetic.
pub fn require_positive_dt(dt: f64) -> SurgeResult<()> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(SurgeError::Precondition(format!(
            "time step must be finite and > 0, got {dt}"
        )));
    }
    Ok(())
}
