use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::capabilities::UrlError;
use crate::config::{Config, ConfigError};
use crate::event::ValidationError;
use crate::model::NotificationKind;
use crate::session::TransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    LoadFailed,
    LockConflict,
    Validation,
    Transport,
    InvalidAction,
    FormTooLarge,
    InvalidRequest,
    Unlock,
    Configuration,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::LoadFailed => "LOAD_FAILED",
            Self::LockConflict => "ROW_LOCKED",
            Self::Validation => "VALIDATION_ERROR",
            Self::Transport => "TRANSPORT_ERROR",
            Self::InvalidAction => "INVALID_ACTION",
            Self::FormTooLarge => "FORM_TOO_LARGE",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Unlock => "UNLOCK_FAILED",
            Self::Configuration => "CONFIG_ERROR",
        }
    }

    /// A lock conflict is an expected condition and is shown as a warning.
    #[must_use]
    pub const fn notification_kind(self) -> NotificationKind {
        match self {
            Self::LockConflict => NotificationKind::Warning,
            _ => NotificationKind::Error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    /// Server-supplied or otherwise user-presentable text; may be empty.
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    fn message_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.message.trim().is_empty() {
            fallback
        } else {
            &self.message
        }
    }

    /// Text for the notification area, falling back to the configured texts
    /// when the server did not say anything useful.
    #[must_use]
    pub fn user_facing_message(&self, config: &Config) -> String {
        match self.kind {
            ErrorKind::LoadFailed => self.message_or(&config.load_failed_message).to_string(),
            ErrorKind::LockConflict => self.message_or(&config.row_locked_message).to_string(),
            ErrorKind::Validation => format!(
                "{}: {}",
                config.save_failed_prefix,
                self.message_or(&config.unknown_error_message)
            ),
            ErrorKind::Transport => config.connection_error_message.clone(),
            ErrorKind::InvalidAction => config.invalid_action_message.clone(),
            ErrorKind::FormTooLarge => config.form_too_large_message.clone(),
            ErrorKind::InvalidRequest | ErrorKind::Unlock | ErrorKind::Configuration => {
                self.message_or(&config.unknown_error_message).to_string()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<TransitionError> for AppError {
    fn from(e: TransitionError) -> Self {
        AppError::new(ErrorKind::InvalidRequest, "").with_internal(e.to_string())
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        let kind = match e {
            ValidationError::TooManyFields { .. } | ValidationError::FormTooLarge { .. } => {
                ErrorKind::FormTooLarge
            }
            ValidationError::EmptyId { .. } | ValidationError::IdTooLong { .. } => {
                ErrorKind::InvalidRequest
            }
        };
        AppError::new(kind, "").with_internal(e.to_string())
    }
}

impl From<UrlError> for AppError {
    fn from(e: UrlError) -> Self {
        let mut error = AppError::new(ErrorKind::InvalidAction, "").with_internal(e.to_string());
        if let UrlError::ForeignOrigin { expected, .. } = &e {
            error = error.with_context("expected_origin", expected.clone());
        }
        error
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Configuration, "").with_internal(e.to_string())
    }
}
