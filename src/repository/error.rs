use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Timed out while accessing {location}")]
    Timeout { location: String },
    #[error("Server returned status {status} for {location}")]
    Status { status: u16, location: String },
    #[error("{message}")]
    Multiple {
        message: String,
        causes: Vec<RepositoryError>,
    },
    #[error("Invalid module descriptor at {location}: {reason}")]
    InvalidDescriptor { location: String, reason: String },
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RepositoryError {
    /// Whether a transport may retry the call: socket timeouts, server errors and rate
    /// limiting, including such failures nested in a multi-cause failure. Everything else is
    /// fatal.
    pub fn is_retryable(&self) -> bool {
        match self {
            RepositoryError::Timeout { .. } => true,
            RepositoryError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            RepositoryError::Multiple { causes, .. } => causes.iter().any(Self::is_retryable),
            RepositoryError::IO(error) => error.kind() == std::io::ErrorKind::TimedOut,
            RepositoryError::InvalidDescriptor { .. } | RepositoryError::Other(_) => false,
        }
    }
}
