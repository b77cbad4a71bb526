//! Email errors

use thiserror::Error;

/// Email errors
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Send failed: {0}")]
    SendFailed(String),
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
    #[error("Invalid attachment: {0}")]
    InvalidAttachment(String),
    #[error("Template error: {0}")]
    TemplateError(String),
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

pub type EmailResult<T> = Result<T, EmailError>;
