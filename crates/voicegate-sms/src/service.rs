//! SMS service trait and the Twilio implementation

use async_trait::async_trait;
use serde::Deserialize;

use crate::SmsError;

/// Receipt for an accepted message
#[derive(Debug, Clone)]
pub struct SmsDelivery {
    /// Carrier message SID
    pub message_sid: String,
}

/// Outbound SMS sender
#[async_trait]
pub trait SmsService: Send + Sync {
    /// Send `body` to `to` (E.164 or close enough to normalize)
    async fn send(&self, to: &str, body: &str) -> Result<SmsDelivery, SmsError>;
}

/// Twilio Messages API sender
///
/// Prefers a messaging service SID when configured, falling back to a
/// plain from number.
pub struct TwilioSmsService {
    http: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
    messaging_service_sid: Option<String>,
    from_number: Option<String>,
}

#[derive(Deserialize)]
struct MessageResponse {
    sid: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
}

impl TwilioSmsService {
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        messaging_service_sid: Option<String>,
        from_number: Option<String>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            messaging_service_sid: messaging_service_sid.filter(|s| !s.is_empty()),
            from_number: from_number.filter(|s| !s.is_empty()),
        }
    }
}

#[async_trait]
impl SmsService for TwilioSmsService {
    async fn send(&self, to: &str, body: &str) -> Result<SmsDelivery, SmsError> {
        let to = normalize_number(to)?;

        let mut form = vec![("To", to.clone()), ("Body", body.to_string())];
        if let Some(sid) = &self.messaging_service_sid {
            form.push(("MessagingServiceSid", sid.clone()));
        } else if let Some(from) = &self.from_number {
            form.push(("From", from.clone()));
        } else {
            return Err(SmsError::NoSender);
        }

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        );
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let reason = response
                .json::<ErrorResponse>()
                .await
                .map(|e| e.message)
                .unwrap_or_else(|_| status.to_string());
            return Err(SmsError::Rejected(reason));
        }

        let message: MessageResponse = response.json().await?;
        tracing::info!(
            to = %mask_number(&to),
            message_sid = %message.sid,
            "SMS accepted"
        );
        Ok(SmsDelivery {
            message_sid: message.sid,
        })
    }
}

/// Normalize a phone number to E.164-ish form
///
/// Strips spaces, dashes and parens, prefixes `+` if missing. Numbers that
/// end up with anything other than digits after the `+` are rejected.
pub fn normalize_number(raw: &str) -> Result<String, SmsError> {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();
    let digits = digits.strip_prefix('+').unwrap_or(&digits);

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(SmsError::InvalidRecipient(mask_number(raw)));
    }
    Ok(format!("+{digits}"))
}

/// Last four digits only, everything else starred out
pub fn mask_number(number: &str) -> String {
    let chars: Vec<char> = number.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}
