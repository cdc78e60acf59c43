use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("Invalid file type: {0}")]
    InvalidFileType(String),

    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    #[error("Invalid trim range: {0}")]
    InvalidTrimRange(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Storage write failure: {0}")]
    StorageWriteFailure(String),

    #[error("Upload failed after {attempts} attempt(s): {message}")]
    UploadFailure { attempts: u32, message: String },

    #[error("Share not found: {0}")]
    ShareNotFound(String),

    #[error("Share expired: {0}")]
    ShareExpired(String),

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    #[error("External service error ({service}): {message}")]
    ExternalService { service: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn internal_error(message: &str) -> Self {
        Self::Internal(message.to_string())
    }

    pub fn external_service_error(service: &str, message: &str) -> Self {
        Self::ExternalService {
            service: service.to_string(),
            message: message.to_string(),
        }
    }

    pub fn invalid_settings(message: impl Into<String>) -> Self {
        Self::InvalidSettings(message.into())
    }

    pub fn invalid_trim(message: impl Into<String>) -> Self {
        Self::InvalidTrimRange(message.into())
    }

    /// Stable machine-readable code, surfaced as the `error` field of API bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFileType(_) => "InvalidFileType",
            Self::FileTooLarge { .. } => "FileTooLarge",
            Self::DecodeFailure(_) => "DecodeFailure",
            Self::InvalidTrimRange(_) => "InvalidTrimRange",
            Self::InvalidSettings(_) => "InvalidSettings",
            Self::InvalidIdentifier(_) => "InvalidIdentifier",
            Self::FileNotFound(_) => "FileNotFound",
            Self::StorageWriteFailure(_) => "StorageWriteFailure",
            Self::UploadFailure { .. } => "UploadFailure",
            Self::ShareNotFound(_) => "ShareNotFound",
            Self::ShareExpired(_) => "ShareExpired",
            Self::ConversionFailed(_) => "ConversionFailed",
            Self::ExternalService { .. } => "ExternalServiceError",
            Self::Internal(_) => "InternalError",
        }
    }
}
