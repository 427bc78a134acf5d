use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("validation - {0}")]
    Validation(String),
    #[error("not_found - {0}")]
    NotFound(String),
    #[error("store_unavailable - {0}")]
    StoreUnavailable(String),
    #[error("invalid_data - {0}")]
    InvalidData(String),
    #[error("conflict - {0}")]
    Conflict(String),
    #[error("io_error - {0}")]
    Io(String),
}

impl AppError {
    pub fn validation<M: Into<String>>(message: M) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found<M: Into<String>>(message: M) -> Self {
        Self::NotFound(message.into())
    }

    pub fn store_unavailable<M: Into<String>>(message: M) -> Self {
        Self::StoreUnavailable(message.into())
    }

    pub fn invalid_data<M: Into<String>>(message: M) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn conflict<M: Into<String>>(message: M) -> Self {
        Self::Conflict(message.into())
    }

    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::InvalidData(_) => "invalid_data",
            Self::Conflict(_) => "conflict",
            Self::Io(_) => "io_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation(message)
            | Self::NotFound(message)
            | Self::StoreUnavailable(message)
            | Self::InvalidData(message)
            | Self::Conflict(message)
            | Self::Io(message) => message,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
