use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Storage I/O error: {0}")]
    Io(String),
}

impl From<fjall::Error> for StoreError {
    fn from(err: fjall::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<StoreError> for tonic::Status {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::NotFound(_) => tonic::Status::not_found(err.to_string()),
            StoreError::Io(_) => tonic::Status::internal(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Manager rejected registration ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Shutdown requested before registration completed")]
    ShuttingDown,
}
