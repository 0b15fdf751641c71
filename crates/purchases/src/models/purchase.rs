//! Purchase record extracted from a provider transaction

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A sale of a single resource, ready to be written to the destination store
///
/// Every field is required; transactions missing any of them never become
/// a `Purchase`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    /// Identifier of the purchased resource
    pub resource_id: String,
    /// Amount paid, kept as the provider's decimal string
    pub price: String,
    /// When the transaction was initiated
    pub purchased_at: DateTime<Utc>,
    /// Payer's email address
    pub payer_email: String,
}

impl Purchase {
    pub fn new(
        resource_id: impl Into<String>,
        price: impl Into<String>,
        purchased_at: DateTime<Utc>,
        payer_email: impl Into<String>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            price: price.into(),
            purchased_at,
            payer_email: payer_email.into(),
        }
    }
}
