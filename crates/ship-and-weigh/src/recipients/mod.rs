//! Shipment notification recipients.

pub mod domain;
pub mod store;

pub use domain::{Recipient, RecipientId};
pub use store::{RecipientError, RecipientStore, RECIPIENTS_OPTION};
