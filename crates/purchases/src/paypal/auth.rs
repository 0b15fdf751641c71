//! Access token management
//!
//! PayPal hands out short-lived bearer tokens for the client credentials
//! grant. The token is kept in memory only and re-requested once it is
//! within [`TOKEN_SAFETY_MARGIN_SECS`] of expiring. Short-lived tokens give up
//! at most half of their lifetime to the margin.

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use std::fmt;

use super::{ReportingApi, TokenResponse};
use crate::error::SyncError;

/// Seconds shaved off the provider-reported lifetime to absorb clock skew
/// and request latency
pub const TOKEN_SAFETY_MARGIN_SECS: i64 = 60;

/// A bearer token and the moment it must no longer be used
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Build a token from a token endpoint response received at `now`
    pub fn from_response(response: &TokenResponse, now: DateTime<Utc>) -> Self {
        let lifetime = response.expires_in.min(u64::from(u32::MAX)) as i64;
        let margin = TOKEN_SAFETY_MARGIN_SECS.min(lifetime / 2);
        Self::new(response.access_token.clone(), now + Duration::seconds(lifetime - margin))
    }

    /// The bearer token value
    pub fn secret(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Obtains and refreshes the access token used for reporting calls
pub struct CredentialManager {
    client_id: String,
    client_secret: String,
    current: Option<AccessToken>,
}

impl CredentialManager {
    /// Create a manager for the given client credentials
    ///
    /// # Arguments
    /// * `client_id` - REST app client ID from the PayPal developer dashboard
    /// * `client_secret` - REST app secret
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Result<Self> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();

        if client_id.trim().is_empty() {
            bail!("PayPal client id must not be empty");
        }
        if client_secret.trim().is_empty() {
            bail!("PayPal secret must not be empty");
        }

        Ok(Self {
            client_id,
            client_secret,
            current: None,
        })
    }

    /// Return a token that is valid at `now`, authenticating first if needed
    pub fn ensure_valid(
        &mut self,
        api: &dyn ReportingApi,
        now: DateTime<Utc>,
    ) -> Result<&AccessToken, SyncError> {
        let needs_refresh = match &self.current {
            Some(token) => token.is_expired(now),
            None => true,
        };

        if needs_refresh {
            debug!("Requesting a new PayPal access token");
            let response = api
                .authenticate(&self.client_id, &self.client_secret)
                .map_err(SyncError::Auth)?;
            let token = AccessToken::from_response(&response, now);
            if token.expires_at() <= now {
                return Err(SyncError::Auth(anyhow!(
                    "token endpoint returned a token that expires immediately (expires_in={})",
                    response.expires_in
                )));
            }
            info!("Obtained PayPal access token valid until {}", token.expires_at());
            self.current = Some(token);
        }

        self.current
            .as_ref()
            .ok_or_else(|| SyncError::Auth(anyhow!("no access token available")))
    }

    /// The currently held token, if any
    pub fn current(&self) -> Option<&AccessToken> {
        self.current.as_ref()
    }

    /// Drop the held token so the next call re-authenticates
    pub fn invalidate(&mut self) {
        self.current = None;
    }
}

impl fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialManager")
            .field("client_id", &self.client_id)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}
