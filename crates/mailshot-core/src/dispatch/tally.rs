//! Per-execution delivery accounting

use super::report::DispatchOutcome;
use mailshot_storage::AttemptStatus;

/// Running count of a campaign's deliveries.
///
/// Folded over the stream of per-recipient results; the finished tally
/// decides the attempt status and its server response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryTally {
    succeeded: usize,
    failed: usize,
    last_error: Option<String>,
}

impl DeliveryTally {
    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    /// Count a failure; the newest error text replaces the previous one
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.failed += 1;
        self.last_error = Some(error.into());
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// `success` when at least one recipient was reached
    pub fn attempt_status(&self) -> AttemptStatus {
        if self.succeeded > 0 {
            AttemptStatus::Success
        } else {
            AttemptStatus::Failed
        }
    }

    pub fn outcome(&self) -> DispatchOutcome {
        match (self.succeeded, self.failed) {
            (0, _) => DispatchOutcome::Failed,
            (_, 0) => DispatchOutcome::FullySent,
            _ => DispatchOutcome::PartiallySent,
        }
    }

    /// Text stored in the attempt's `server_response`
    pub fn server_response(&self) -> String {
        if self.total() == 0 {
            return "0 succeeded, 0 failed: campaign has no recipients".to_string();
        }

        match &self.last_error {
            Some(error) if self.failed > 0 => format!(
                "{} succeeded, {} failed, last error: {}",
                self.succeeded, self.failed, error
            ),
            _ => format!("{} succeeded, {} failed", self.succeeded, self.failed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_all_delivered() {
        let mut tally = DeliveryTally::default();
        tally.record_success();
        tally.record_success();

        assert_eq!(tally.attempt_status(), AttemptStatus::Success);
        assert_eq!(tally.outcome(), DispatchOutcome::FullySent);
        assert_eq!(tally.server_response(), "2 succeeded, 0 failed");
    }

    #[test]
    fn test_partial_delivery_keeps_latest_error() {
        let mut tally = DeliveryTally::default();
        tally.record_failure("421 try later");
        tally.record_success();
        tally.record_failure("550 mailbox unavailable");

        assert_eq!(tally.attempt_status(), AttemptStatus::Success);
        assert_eq!(tally.outcome(), DispatchOutcome::PartiallySent);
        assert_eq!(tally.last_error(), Some("550 mailbox unavailable"));
        assert_eq!(
            tally.server_response(),
            "1 succeeded, 2 failed, last error: 550 mailbox unavailable"
        );
    }

    #[test]
    fn test_nothing_delivered() {
        let mut tally = DeliveryTally::default();
        tally.record_failure("connection refused");

        assert_eq!(tally.attempt_status(), AttemptStatus::Failed);
        assert_eq!(tally.outcome(), DispatchOutcome::Failed);
    }

    #[test]
    fn test_no_recipients() {
        let tally = DeliveryTally::default();
        assert_eq!(tally.attempt_status(), AttemptStatus::Failed);
        assert_eq!(tally.outcome(), DispatchOutcome::Failed);
        assert_eq!(
            tally.server_response(),
            "0 succeeded, 0 failed: campaign has no recipients"
        );
    }
}
