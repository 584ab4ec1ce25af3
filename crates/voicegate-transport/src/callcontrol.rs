//! Call-control side channel
//!
//! One operation: terminate a call by its SID. Invoked after the delayed
//! teardown timer fires at the end of a goodbye turn.

use async_trait::async_trait;

use crate::TransportError;

/// Carrier call-control interface
#[async_trait]
pub trait CallControl: Send + Sync {
    /// Mark the call completed, hanging up the caller
    async fn complete(&self, call_sid: &str) -> Result<(), TransportError>;
}

/// Twilio-compatible REST call control
pub struct TwilioCallControl {
    http: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
}

impl TwilioCallControl {
    pub fn new(api_base: impl Into<String>, account_sid: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
        }
    }
}

#[async_trait]
impl CallControl for TwilioCallControl {
    async fn complete(&self, call_sid: &str) -> Result<(), TransportError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Calls/{}.json",
            self.api_base, self.account_sid, call_sid
        );

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("Status", "completed")])
            .send()
            .await?;

        if response.status().is_success() {
            tracing::info!(call_sid, "Call completed via call control");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(TransportError::CallControl(format!(
                "status {status}: {body}"
            )))
        }
    }
}
