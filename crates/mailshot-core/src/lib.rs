//! Mailshot Core - Campaign dispatch
//!
//! This crate selects due campaigns, delivers their message to every
//! recipient, and writes one attempt record per dispatch execution. It also
//! hosts the manual "send now" trigger and the campaign lifecycle rules
//! (creation validation, administrative disable).

pub mod campaigns;
pub mod clock;
pub mod dispatch;
pub mod mail;

#[cfg(test)]
mod testing;

pub use campaigns::CampaignManager;
pub use clock::{Clock, FixedClock, SystemClock};
pub use dispatch::{
    DeliveryTally, DispatchError, DispatchOutcome, DispatchReport, DispatchSettings,
    DispatchWorker, Dispatcher, ManualTrigger, PassSummary,
};
pub use mail::{DeliveryError, Envelope, Mailer, SmtpMailer};
