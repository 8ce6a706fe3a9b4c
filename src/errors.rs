use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("TEMPLATE_NOT_FOUND: {0}")]
    TemplateNotFound(String),
    #[error("DECODE_FAILURE: {0}")]
    Decode(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("INVALID: {0}")]
    Invalid(String),
    #[error("CONFIG_INVALID: {0}")]
    Config(String),
}

impl StoreError {
    /// Maps a read failure to `NotFound` when the file is simply absent.
    pub(crate) fn from_read(error: std::io::Error, path: &std::path::Path) -> Self {
        if error.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_string_lossy().to_string())
        } else {
            Self::Io(format!("{}: {}", path.to_string_lossy(), error))
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<csv::Error> for StoreError {
    fn from(value: csv::Error) -> Self {
        if value.is_io_error() {
            Self::Io(value.to_string())
        } else {
            Self::Decode(value.to_string())
        }
    }
}

impl From<uuid::Error> for StoreError {
    fn from(value: uuid::Error) -> Self {
        Self::Invalid(value.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
