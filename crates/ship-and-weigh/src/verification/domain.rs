use serde::{Deserialize, Serialize};

/// Fields accepted by the verification endpoint, in request order.
pub const ADDRESS_FIELDS: [&str; 8] = [
    "street1", "street2", "city", "state", "zip", "country", "name", "company",
];

/// A candidate or normalized postal address. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl Address {
    /// Drop fields that are present but blank.
    pub fn compact(mut self) -> Self {
        for field in [
            &mut self.street1,
            &mut self.street2,
            &mut self.city,
            &mut self.state,
            &mut self.zip,
            &mut self.country,
            &mut self.name,
            &mut self.company,
        ] {
            if field.as_deref().is_some_and(|value| value.trim().is_empty()) {
                *field = None;
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clone().compact() == Address::default()
    }

    /// Single-line rendering used in logs and CLI output.
    pub fn one_line(&self) -> String {
        [
            &self.street1,
            &self.street2,
            &self.city,
            &self.state,
            &self.zip,
            &self.country,
        ]
        .into_iter()
        .filter_map(|part| part.as_deref())
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Problem reported by the provider for a specific field, or the address as a
/// whole when `field` is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

/// Outcome relayed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_address: Option<Address>,
    #[serde(default)]
    pub errors: Vec<FieldError>,
}
