//! Visa requirements lookup
//!
//! Thin client over the visa requirements API plus a formatter that turns
//! the structured answer into something natural to say out loud.

use async_trait::async_trait;
use serde::Deserialize;

use crate::AgentError;

/// Visa requirements for one passport/destination pair
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisaRequirement {
    pub from: String,
    pub to: String,
    pub visa_required: bool,
    #[serde(default)]
    pub visa_type: Option<String>,
    #[serde(default)]
    pub evisa_available: bool,
    #[serde(default)]
    pub visa_on_arrival: bool,
    #[serde(default)]
    pub visa_free_days: Option<u32>,
    #[serde(default)]
    pub passport_validity_months: Option<u32>,
    #[serde(default)]
    pub yellow_fever_certificate: bool,
}

/// Source of visa requirement facts
#[async_trait]
pub trait VisaLookup: Send + Sync {
    /// Requirements for a passport holder of `from` travelling to `to`,
    /// both ISO alpha-2 codes
    async fn check(&self, from: &str, to: &str) -> Result<VisaRequirement, AgentError>;
}

/// Lookup backed by the visa requirements REST API
pub struct HttpVisaLookup {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpVisaLookup {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl VisaLookup for HttpVisaLookup {
    async fn check(&self, from: &str, to: &str) -> Result<VisaRequirement, AgentError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("from", from), ("to", to)])
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AgentError::Lookup(format!(
                "visa API returned {} for {from}->{to}",
                response.status()
            )));
        }

        let body: serde_json::Value = response.json().await?;
        // Some deployments wrap the record in a data envelope.
        let record = body.get("data").cloned().unwrap_or(body);
        serde_json::from_value(record)
            .map_err(|e| AgentError::Lookup(format!("unexpected visa API shape: {e}")))
    }
}

/// Render a requirement as one or two spoken sentences
pub fn format_visa_response(req: &VisaRequirement) -> String {
    let mut parts = Vec::new();

    if !req.visa_required {
        match req.visa_free_days {
            Some(days) => parts.push(format!(
                "Good news, no visa is needed for stays up to {days} days."
            )),
            None => parts.push("Good news, no visa is needed for this trip.".to_string()),
        }
    } else if req.visa_on_arrival {
        parts.push("A visa is required, but you can get it on arrival.".to_string());
    } else if req.evisa_available {
        parts.push("A visa is required, and you can apply for an e-visa online.".to_string());
    } else {
        match &req.visa_type {
            Some(kind) => parts.push(format!(
                "A {kind} visa is required and must be arranged before you travel."
            )),
            None => parts.push("A visa is required and must be arranged before you travel.".to_string()),
        }
    }

    if let Some(months) = req.passport_validity_months {
        parts.push(format!(
            "Your passport needs at least {months} months of validity."
        ));
    }
    if req.yellow_fever_certificate {
        parts.push("You'll also need a yellow fever certificate.".to_string());
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> VisaRequirement {
        VisaRequirement {
            from: "GH".to_string(),
            to: "TZ".to_string(),
            visa_required: false,
            visa_type: None,
            evisa_available: false,
            visa_on_arrival: false,
            visa_free_days: None,
            passport_validity_months: None,
            yellow_fever_certificate: false,
        }
    }

    #[test]
    fn test_format_visa_free() {
        let req = VisaRequirement {
            visa_free_days: Some(90),
            ..base()
        };
        assert_eq!(
            format_visa_response(&req),
            "Good news, no visa is needed for stays up to 90 days."
        );
    }

    #[test]
    fn test_format_visa_on_arrival_with_extras() {
        let req = VisaRequirement {
            visa_required: true,
            visa_on_arrival: true,
            passport_validity_months: Some(6),
            yellow_fever_certificate: true,
            ..base()
        };
        let spoken = format_visa_response(&req);
        assert!(spoken.starts_with("A visa is required, but you can get it on arrival."));
        assert!(spoken.contains("6 months of validity"));
        assert!(spoken.contains("yellow fever certificate"));
    }

    #[test]
    fn test_format_embassy_visa() {
        let req = VisaRequirement {
            visa_required: true,
            visa_type: Some("tourist".to_string()),
            ..base()
        };
        assert_eq!(
            format_visa_response(&req),
            "A tourist visa is required and must be arranged before you travel."
        );
    }

    #[test]
    fn test_parse_enveloped_record() {
        let body = serde_json::json!({
            "data": {
                "from": "GH",
                "to": "TZ",
                "visaRequired": true,
                "visaOnArrival": true,
                "visaFreeDays": null
            }
        });
        let record = body.get("data").cloned().unwrap();
        let req: VisaRequirement = serde_json::from_value(record).unwrap();
        assert!(req.visa_required);
        assert!(req.visa_on_arrival);
        assert_eq!(req.visa_free_days, None);
    }
}
