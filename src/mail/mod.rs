//! Outbound delivery of staged emails through an SMTP relay.

pub mod config;
pub mod error;
pub mod smtp;

use crate::models::EmailRecord;

pub use config::SmtpConfig;
pub use error::{DispatchError, MailError};
pub use smtp::SmtpDispatcher;

/// Sends a batch of records, one message per record, in order.
///
/// Returns the number delivered. On failure the error carries how many
/// records went out before the failing one, so callers can act on that prefix.
#[rocket::async_trait]
pub trait MailDispatch: Send + Sync {
    async fn dispatch(&self, batch: &[EmailRecord]) -> Result<usize, DispatchError>;
}
