//! Outbound mail

mod smtp;

pub use smtp::SmtpMailer;

use async_trait::async_trait;
use thiserror::Error;

/// A single rendered message addressed to one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Per-recipient delivery failure.
///
/// Carries the transport's own error text, which ends up verbatim in the
/// attempt's server response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct DeliveryError(pub String);

impl DeliveryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<DeliveryError> for mailshot_common::Error {
    fn from(err: DeliveryError) -> Self {
        mailshot_common::Error::Delivery(err.0)
    }
}

/// Mail transport
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one envelope. An error affects this recipient only.
    async fn send(&self, envelope: &Envelope) -> Result<(), DeliveryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_error_maps_to_bad_gateway() {
        let err: mailshot_common::Error = DeliveryError::new("421 service not available").into();
        assert!(matches!(err, mailshot_common::Error::Delivery(_)));
        assert_eq!(err.status_code(), 502);
        assert_eq!(err.to_string(), "Delivery error: 421 service not available");
    }
}
