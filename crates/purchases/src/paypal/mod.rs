//! PayPal REST API integration
//!
//! This module provides:
//! - Access token management for the client credentials grant
//! - A reporting API client for fetching transaction history
//! - Extraction of resource purchases from raw transactions

mod auth;
mod client;
mod extract;

use anyhow::Result;

pub use api::{RawTransaction, TokenResponse, TransactionsResponse};
pub use auth::{AccessToken, CredentialManager, TOKEN_SAFETY_MARGIN_SECS};
pub use client::{PaypalClient, fetch_window};
pub use extract::{RESOURCE_PURCHASE_MARKER, extract_purchase};

use crate::models::TimeWindow;

/// The two remote operations the sync engine needs from the provider
///
/// `PaypalClient` implements this over HTTP; tests substitute scripted fakes.
pub trait ReportingApi {
    /// Exchange client credentials for an access token
    fn authenticate(&self, client_id: &str, client_secret: &str) -> Result<TokenResponse>;

    /// List all transactions initiated inside `window`
    fn list_transactions(
        &self,
        window: &TimeWindow,
        access_token: &str,
    ) -> Result<TransactionsResponse>;
}

/// PayPal API response types
pub mod api {
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    /// Response from the OAuth2 token endpoint
    #[derive(Debug, Clone, Deserialize)]
    pub struct TokenResponse {
        pub access_token: String,
        /// Lifetime of the token in seconds
        pub expires_in: u64,
        pub token_type: Option<String>,
        pub app_id: Option<String>,
    }

    /// Response from the transaction search endpoint
    #[derive(Debug, Deserialize)]
    pub struct TransactionsResponse {
        pub transaction_details: Vec<RawTransaction>,
        pub total_items: Option<u64>,
        pub total_pages: Option<u32>,
        pub page: Option<u32>,
    }

    /// A transaction as returned by the provider
    ///
    /// The shape varies between transaction types, so it is kept as JSON and
    /// only inspected through field lookups.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct RawTransaction(pub Value);

    impl RawTransaction {
        /// Look up a string field by JSON pointer (e.g. `/payer_info/email_address`)
        pub fn str_at(&self, pointer: &str) -> Option<&str> {
            self.0.pointer(pointer).and_then(Value::as_str)
        }

        /// Provider-assigned transaction id, for logging
        pub fn transaction_id(&self) -> Option<&str> {
            self.str_at("/transaction_info/transaction_id")
        }
    }
}
