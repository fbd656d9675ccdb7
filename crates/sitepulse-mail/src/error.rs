use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("invalid address '{address}': {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("SMTP relay error: {0}")]
    Relay(String),

    #[error("SMTP send failed: {0}")]
    Send(String),
}

pub type Result<T> = std::result::Result<T, MailError>;
