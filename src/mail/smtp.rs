use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{DispatchError, MailDispatch, MailError, SmtpConfig};
use crate::models::EmailRecord;

/// SMTP delivery that re-reads [`SmtpConfig`] from the environment on every batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpDispatcher;

impl SmtpDispatcher {
    pub fn new() -> Self {
        Self
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .parse()
        .map_err(|_| MailError::InvalidAddress(address.to_string()))
}

/// Plaintext message: To, Subject, blank line, body.
pub fn compose(from: &str, record: &EmailRecord) -> Result<Message, MailError> {
    let message = Message::builder()
        .from(parse_mailbox(from)?)
        .to(parse_mailbox(&record.email)?)
        .subject(record.title.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(record.content.clone())?;
    Ok(message)
}

fn build_transport(config: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
    let tls = TlsParameters::new(config.host.clone())?;

    Ok(
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.as_str())
            .port(config.port)
            .tls(Tls::Opportunistic(tls))
            .credentials(Credentials::new(
                config.from.clone(),
                config.password.clone(),
            ))
            .authentication(vec![Mechanism::Plain])
            .timeout(Some(config.timeout))
            .build(),
    )
}

#[rocket::async_trait]
impl MailDispatch for SmtpDispatcher {
    async fn dispatch(&self, batch: &[EmailRecord]) -> Result<usize, DispatchError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let config = SmtpConfig::from_env().map_err(|e| DispatchError::new(0, e))?;
        let transport = build_transport(&config).map_err(|e| DispatchError::new(0, e))?;
        log::debug!(
            "dispatching {} message(s) via {}:{}",
            batch.len(),
            config.host,
            config.port
        );

        let mut sent = 0;
        for record in batch {
            let message =
                compose(&config.from, record).map_err(|e| DispatchError::new(sent, e))?;
            transport
                .send(message)
                .await
                .map_err(|e| DispatchError::new(sent, MailError::Transport(e)))?;
            sent += 1;
        }

        Ok(sent)
    }
}
