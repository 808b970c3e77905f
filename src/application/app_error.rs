use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Signing key material is not loaded")]
    KeyUnavailable,

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Invalid token signature")]
    SignatureInvalid,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Refresh token family not found")]
    FamilyNotFound,

    #[error("Refresh token family has been revoked")]
    FamilyRevoked,

    #[error("Refresh token was rotated concurrently")]
    RotationConflict,

    #[error("Not found")]
    NotFound,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable code for diagnostics. Token failures keep their sub-kind here even
    /// though clients only ever see `INVALID_CREDENTIALS`.
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::KeyUnavailable => ErrorCode::KeyUnavailable,
            AppError::MalformedToken(_) => ErrorCode::MalformedToken,
            AppError::SignatureInvalid => ErrorCode::SignatureInvalid,
            AppError::TokenExpired => ErrorCode::TokenExpired,
            AppError::FamilyNotFound => ErrorCode::FamilyNotFound,
            AppError::FamilyRevoked => ErrorCode::FamilyRevoked,
            AppError::RotationConflict => ErrorCode::RotationConflict,
            AppError::NotFound => ErrorCode::NotFound,
            AppError::InvalidInput(_) => ErrorCode::InvalidInput,
            AppError::Store(_) => ErrorCode::StoreError,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// True for every failure that means "the presented credential is not acceptable".
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            AppError::MalformedToken(_)
                | AppError::SignatureInvalid
                | AppError::TokenExpired
                | AppError::FamilyNotFound
                | AppError::FamilyRevoked
                | AppError::RotationConflict
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    KeyUnavailable,
    MalformedToken,
    SignatureInvalid,
    TokenExpired,
    FamilyNotFound,
    FamilyRevoked,
    RotationConflict,
    InvalidCredentials,
    NotFound,
    InvalidInput,
    StoreError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::KeyUnavailable => "KEY_UNAVAILABLE",
            ErrorCode::MalformedToken => "MALFORMED_TOKEN",
            ErrorCode::SignatureInvalid => "SIGNATURE_INVALID",
            ErrorCode::TokenExpired => "TOKEN_EXPIRED",
            ErrorCode::FamilyNotFound => "FAMILY_NOT_FOUND",
            ErrorCode::FamilyRevoked => "FAMILY_REVOKED",
            ErrorCode::RotationConflict => "ROTATION_CONFLICT",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::StoreError => "STORE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::MalformedToken(err.to_string())
    }
}

impl From<base64::DecodeError> for AppError {
    fn from(err: base64::DecodeError) -> Self {
        AppError::MalformedToken(format!("invalid base64url segment: {err}"))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Store(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
