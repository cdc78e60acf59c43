use converter_domain::DomainError;
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationErrors> for ApplicationError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl ApplicationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Domain(err) => err.code(),
            Self::Validation(_) => "ValidationError",
            Self::Internal(_) => "InternalError",
        }
    }
}
