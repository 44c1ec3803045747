use thiserror::Error;

pub type Result<T> = std::result::Result<T, ParkingError>;

#[derive(Debug, Error)]
pub enum ParkingError {
    /// Referenced entity absent
    #[error("not found: {0}")]
    NotFound(String),
    /// Malformed window or missing required field
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation not valid for the current lifecycle state
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Overlap rule violated
    #[error("conflict: {0}")]
    Conflict(String),
    /// No cell type exists to provision capacity
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl ParkingError {
    /// Stable machine-readable code for callers that map errors to responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ParkingError::NotFound(_) => "NOT_FOUND",
            ParkingError::InvalidInput(_) => "INVALID_INPUT",
            ParkingError::InvalidState(_) => "INVALID_STATE",
            ParkingError::Conflict(_) => "CONFLICT",
            ParkingError::Configuration(_) => "CONFIGURATION_ERROR",
            ParkingError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for ParkingError {
    fn from(e: rusqlite::Error) -> Self {
        ParkingError::Storage(e.to_string())
    }
}
