use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("smtp configuration error: {0}")]
    Config(String),
    #[error("invalid mailbox '{0}'")]
    InvalidAddress(String),
    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// A batch send that stopped part-way.
#[derive(Debug, Error)]
#[error("mail dispatch failed after {sent} message(s): {source}")]
pub struct DispatchError {
    pub sent: usize,
    #[source]
    pub source: MailError,
}

impl DispatchError {
    pub fn new(sent: usize, source: MailError) -> Self {
        Self { sent, source }
    }
}
