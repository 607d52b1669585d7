//! SMTP transport via lettre

use super::{DeliveryError, Envelope, Mailer};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use mailshot_common::config::SmtpConfig;
use mailshot_common::{Error, Result};
use std::time::Duration;
use tracing::debug;

/// Delivers envelopes through a configured SMTP relay.
///
/// The transport is built once and reused; lettre pools connections
/// internally.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| Error::Config(format!("Invalid SMTP relay {}: {}", config.host, e)))?
        } else if config.use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| Error::Config(format!("Invalid SMTP relay {}: {}", config.host, e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }

    /// Open a connection to the relay and close it again
    pub async fn check_connection(&self) -> Result<()> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DeliveryError::new("SMTP relay did not accept the connection").into()),
            Err(e) => Err(Error::Delivery(format!("SMTP relay unreachable: {}", e))),
        }
    }

    fn build_message(envelope: &Envelope) -> std::result::Result<Message, DeliveryError> {
        let from: Mailbox = envelope
            .from
            .parse()
            .map_err(|e| DeliveryError(format!("Invalid from address: {}", e)))?;
        let to: Mailbox = envelope
            .to
            .parse()
            .map_err(|e| DeliveryError(format!("Invalid to address: {}", e)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(&envelope.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(envelope.body.clone())
            .map_err(|e| DeliveryError(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, envelope: &Envelope) -> std::result::Result<(), DeliveryError> {
        let email = Self::build_message(envelope)?;

        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| DeliveryError(e.to_string()))?;

        debug!(to = %envelope.to, code = %response.code(), "Email accepted by relay");
        Ok(())
    }
}
