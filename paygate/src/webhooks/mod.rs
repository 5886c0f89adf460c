//! Adyen webhook handling.
//!
//! Adyen posts notification batches to `POST /webhooks/adyen`. Each item carries an HMAC
//! signature computed with the merchant account's key; verified items update the status of
//! the transaction they refer to.
//!
//! - [`events`]: the notification payload
//! - [`signing`]: signature canonicalization and verification
//! - [`processor`]: per-item verification and the status projection

pub mod events;
pub mod processor;
pub mod signing;

pub use processor::{ProcessingSummary, WebhookProcessor};
