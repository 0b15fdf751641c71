//! PayPal REST API HTTP client
//!
//! Uses synchronous HTTP (ureq); the sync engine runs on a single blocking
//! worker so there is no executor to integrate with.

use anyhow::{Context, Result, bail};
use base64::prelude::*;
use log::{debug, warn};
use std::time::Duration;
use url::Url;

use super::{RawTransaction, ReportingApi, TokenResponse, TransactionsResponse};
use crate::error::{HttpStatusError, SyncError};
use crate::models::{TimeWindow, format_api_time};

/// PayPal API client for the reporting endpoints
pub struct PaypalClient {
    agent: ureq::Agent,
    base_url: Url,
}

impl PaypalClient {
    /// Production API base URL
    pub const LIVE_URL: &'static str = "https://api-m.paypal.com";
    /// Sandbox API base URL
    pub const SANDBOX_URL: &'static str = "https://api-m.sandbox.paypal.com";

    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    /// Create a client talking to `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("Invalid PayPal API URL: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("PayPal API URL cannot be used as a base: {}", base_url);
        }
        // Url::join replaces the last path segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_connect(Some(Self::CONNECT_TIMEOUT))
            .timeout_global(Some(Self::REQUEST_TIMEOUT))
            .build()
            .into();

        Ok(Self { agent, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Failed to build URL for {}", path))
    }

    /// Build the transaction search URL for a window
    fn transactions_url(&self, window: &TimeWindow) -> Result<String> {
        let endpoint = self.endpoint("v1/reporting/transactions")?;
        Ok(format!(
            "{}?start_date={}&end_date={}&fields=all",
            endpoint,
            urlencoding::encode(&format_api_time(window.start)),
            urlencoding::encode(&format_api_time(window.end)),
        ))
    }
}

impl ReportingApi for PaypalClient {
    fn authenticate(&self, client_id: &str, client_secret: &str) -> Result<TokenResponse> {
        let url = self.endpoint("v1/oauth2/token")?;
        let basic = BASE64_STANDARD.encode(format!("{}:{}", client_id, client_secret));

        let mut response = self
            .agent
            .post(url.as_str())
            .header("Authorization", &format!("Basic {}", basic))
            .header("Accept", "application/json")
            .send_form([("grant_type", "client_credentials")])
            .map_err(|e| request_error(e, "authenticate"))?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;

        Ok(token)
    }

    fn list_transactions(
        &self,
        window: &TimeWindow,
        access_token: &str,
    ) -> Result<TransactionsResponse> {
        let url = self.transactions_url(window)?;
        debug!("GET {}", url);

        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .header("Content-Type", "application/json")
            .call()
            .map_err(|e| request_error(e, "list transactions"))?;

        let transactions: TransactionsResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse transactions response")?;

        Ok(transactions)
    }
}

/// Turn a ureq failure into an error the engine can classify
fn request_error(err: ureq::Error, operation: &'static str) -> anyhow::Error {
    match err {
        ureq::Error::StatusCode(status) => HttpStatusError { operation, status }.into(),
        other => anyhow::Error::new(other).context(format!("Failed to send {} request", operation)),
    }
}

/// Fetch every raw transaction in one window
///
/// No retries here: a failure aborts the cycle and the next cycle asks for
/// the same window again.
pub fn fetch_window(
    api: &dyn ReportingApi,
    window: &TimeWindow,
    access_token: &str,
) -> Result<Vec<RawTransaction>, SyncError> {
    let response = api
        .list_transactions(window, access_token)
        .map_err(|source| SyncError::Fetch {
            window: *window,
            source,
        })?;

    if response.total_pages.is_some_and(|pages| pages > 1) {
        warn!(
            "Window {} spans {} pages; only the first page is synced",
            window,
            response.total_pages.unwrap_or_default()
        );
    }

    debug!(
        "Fetched {} transactions for window {}",
        response.transaction_details.len(),
        window
    );
    Ok(response.transaction_details)
}
