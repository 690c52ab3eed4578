use crate::domain::model::GoogleJsonError;
use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Authorization failed: {0}")]
    AuthError(#[from] yup_oauth2::Error),

    #[error("Scope list is empty")]
    EmptyScopes,

    #[error("client_secret.json not found at {}", path.display())]
    ClientSecretNotFound { path: PathBuf },

    #[error("Directory API error ({status}): {}", error.message)]
    ApiError {
        status: StatusCode,
        error: GoogleJsonError,
    },

    #[error("Batch request error: {message}")]
    BatchError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Process exit status for a failure of this severity; never 0.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl DirectoryError {
    pub fn api(status: StatusCode, error: GoogleJsonError) -> Self {
        Self::ApiError { status, error }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn batch(message: impl Into<String>) -> Self {
        Self::BatchError {
            message: message.into(),
        }
    }

    /// HTTP status of an API failure, if this error came from one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::ApiError { status, .. } => Some(*status),
            Self::HttpError(e) => e.status(),
            _ => None,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ApiError { status, .. } if status.is_client_error() => ErrorSeverity::High,
            Self::ApiError { .. } | Self::HttpError(_) | Self::BatchError { .. } => {
                ErrorSeverity::Medium
            }
            Self::SerializationError(_) => ErrorSeverity::High,
            Self::EmptyScopes
            | Self::ClientSecretNotFound { .. }
            | Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::AuthError(_)
            | Self::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::ApiError { status, error } if *status == StatusCode::NOT_FOUND => {
                format!("The requested user does not exist: {}", error.message)
            }
            Self::ApiError { status, error } if *status == StatusCode::FORBIDDEN => {
                format!("Not allowed to perform this operation: {}", error.message)
            }
            Self::ClientSecretNotFound { .. } => {
                "Could not find the client_secret.json file".to_string()
            }
            Self::EmptyScopes => "No OAuth scopes configured".to_string(),
            Self::AuthError(_) => "OAuth 2.0 authorization did not complete".to_string(),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::ClientSecretNotFound { .. } => {
                "Download client_secret.json from the Google Cloud Console (https://support.google.com/cloud/answer/6158849) and place it in the working directory or in $CLIENT_SECRET_JSON_PATH"
            }
            Self::EmptyScopes => "Add at least one scope under [auth].scopes",
            Self::AuthError(_) => {
                "Run with -authenticate again; if scopes changed, delete the cached token store first"
            }
            Self::ApiError { status, .. } if *status == StatusCode::UNAUTHORIZED => {
                "The cached credential was rejected; delete the token store and run -authenticate"
            }
            Self::ApiError { status, .. } if *status == StatusCode::FORBIDDEN => {
                "Make sure the authorized account is a domain administrator"
            }
            Self::ApiError { .. } | Self::BatchError { .. } => {
                "Check the request payload against the Directory API reference"
            }
            Self::HttpError(_) => "Check network connectivity to googleapis.com",
            Self::ConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                "Fix the configuration file and try again"
            }
            Self::IoError(_) => "Check file permissions of the credential and config paths",
            Self::SerializationError(_) => "The API returned an unexpected payload",
        }
    }
}

pub type Result<T> = std::result::Result<T, DirectoryError>;
