use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use super::domain::{Recipient, RecipientId};
use crate::store::{option_key, OptionStore, StoreError};

/// Option name holding the whole recipient collection.
pub const RECIPIENTS_OPTION: &str = "recipients";

/// Recipient collection persisted as a single ordered option.
///
/// Mutations go through [`OptionStore::update`] so concurrent add/remove calls
/// do not overwrite each other.
#[derive(Clone)]
pub struct RecipientStore {
    options: Arc<dyn OptionStore>,
    key: String,
}

impl RecipientStore {
    pub fn new(options: Arc<dyn OptionStore>) -> Self {
        Self {
            options,
            key: option_key(RECIPIENTS_OPTION),
        }
    }

    /// Append a recipient with a freshly generated id.
    ///
    /// Addresses are trimmed; the list must be non-empty and contain no blank
    /// entries.
    pub fn add_recipient<S: AsRef<str>>(
        &self,
        addresses: &[S],
    ) -> Result<Recipient, RecipientError> {
        if addresses.is_empty() {
            return Err(RecipientError::NoAddresses);
        }
        let addresses = addresses
            .iter()
            .enumerate()
            .map(|(index, address)| {
                let trimmed = address.as_ref().trim();
                if trimmed.is_empty() {
                    Err(RecipientError::BlankAddress { index })
                } else {
                    Ok(trimmed.to_string())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let key = self.key.clone();
        let mut created = None;
        self.options.update(&self.key, &mut |current| {
            let mut recipients = decode(&key, current)?;
            let mut id = RecipientId::generate();
            while recipients.iter().any(|existing| existing.id == id) {
                id = RecipientId::generate();
            }
            let recipient = Recipient {
                id,
                addresses: addresses.clone(),
            };
            recipients.push(recipient.clone());
            created = Some(recipient);
            Ok(serde_json::to_value(&recipients)?)
        })?;

        let recipient = created.ok_or_else(|| {
            RecipientError::Store(StoreError::Unavailable(
                "recipient update did not run".to_string(),
            ))
        })?;
        info!(recipient = %recipient.id, addresses = recipient.addresses.len(), "recipient added");
        Ok(recipient)
    }

    /// All recipients in insertion order.
    pub fn get_recipients(&self) -> Result<Vec<Recipient>, RecipientError> {
        let current = self.options.get(&self.key)?;
        Ok(decode(&self.key, current)?)
    }

    /// Remove the recipient with the given id, reporting whether one existed.
    ///
    /// Removing an unknown id is a no-op, so repeated deletes are harmless.
    pub fn remove_recipient(&self, id: &str) -> Result<bool, RecipientError> {
        let id: RecipientId = id
            .parse()
            .map_err(|_| RecipientError::InvalidId(id.to_string()))?;

        let key = self.key.clone();
        let mut removed = false;
        self.options.update(&self.key, &mut |current| {
            let mut recipients = decode(&key, current)?;
            let before = recipients.len();
            recipients.retain(|recipient| recipient.id != id);
            removed = recipients.len() != before;
            Ok(serde_json::to_value(&recipients)?)
        })?;

        if removed {
            info!(recipient = %id, "recipient removed");
        } else {
            debug!(recipient = %id, "recipient not found; nothing removed");
        }
        Ok(removed)
    }
}

fn decode(key: &str, current: Option<Value>) -> Result<Vec<Recipient>, StoreError> {
    match current {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(raw) => serde_json::from_value(raw).map_err(|err| StoreError::Corrupt {
            key: key.to_string(),
            reason: err.to_string(),
        }),
    }
}

/// Error raised by the recipient store.
#[derive(Debug, thiserror::Error)]
pub enum RecipientError {
    #[error("at least one address is required")]
    NoAddresses,
    #[error("address at position {index} is blank")]
    BlankAddress { index: usize },
    #[error("'{0}' is not a valid recipient id")]
    InvalidId(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
