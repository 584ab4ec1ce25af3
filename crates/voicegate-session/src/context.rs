//! Slot-filling context accumulated across turns

use serde::{Deserialize, Serialize};

/// Structured travel facts extracted from caller utterances
///
/// Accumulates monotonically for the lifetime of the call: fields are only
/// overwritten by non-empty new values, never nulled out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripContext {
    /// Passport country code (what matters for visa checks)
    pub passport: Option<String>,
    /// Destination country code
    pub destination: Option<String>,
    /// Residence country code (noted, not used for visa checks)
    pub residence: Option<String>,
    /// The visa lookup already fired for the current passport/destination pair
    pub lookup_done: bool,
}

/// One turn's worth of new facts to merge into the context
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextUpdate {
    pub passport: Option<String>,
    pub destination: Option<String>,
    pub residence: Option<String>,
}

impl TripContext {
    /// Merge new facts, keeping existing values where the update is empty
    ///
    /// A changed passport or destination re-arms the lookup so the next
    /// complete fact-set can fire again.
    pub fn merge(&mut self, update: &ContextUpdate) {
        if let Some(passport) = non_empty(&update.passport) {
            if self.passport.as_deref() != Some(passport) {
                self.lookup_done = false;
            }
            self.passport = Some(passport.to_string());
        }
        if let Some(destination) = non_empty(&update.destination) {
            if self.destination.as_deref() != Some(destination) {
                self.lookup_done = false;
            }
            self.destination = Some(destination.to_string());
        }
        if let Some(residence) = non_empty(&update.residence) {
            self.residence = Some(residence.to_string());
        }
    }

    /// Both countries known and the lookup has not fired for this fact-set
    pub fn ready_for_lookup(&self) -> bool {
        self.passport.is_some() && self.destination.is_some() && !self.lookup_done
    }

    /// Record that the lookup fired for the current fact-set
    pub fn mark_lookup_done(&mut self) {
        self.lookup_done = true;
    }
}

impl ContextUpdate {
    /// Did this turn produce any new fact at all?
    pub fn is_empty(&self) -> bool {
        non_empty(&self.passport).is_none()
            && non_empty(&self.destination).is_none()
            && non_empty(&self.residence).is_none()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(passport: Option<&str>, destination: Option<&str>) -> ContextUpdate {
        ContextUpdate {
            passport: passport.map(String::from),
            destination: destination.map(String::from),
            residence: None,
        }
    }

    #[test]
    fn test_accumulates_across_turns() {
        let mut context = TripContext::default();

        context.merge(&update(Some("GH"), None));
        context.merge(&update(None, Some("TZ")));

        assert_eq!(context.passport.as_deref(), Some("GH"));
        assert_eq!(context.destination.as_deref(), Some("TZ"));
        assert!(context.ready_for_lookup());
    }

    #[test]
    fn test_absent_value_does_not_erase() {
        let mut context = TripContext::default();
        context.merge(&update(Some("GH"), Some("TZ")));

        context.merge(&update(None, Some("KE")));
        assert_eq!(context.passport.as_deref(), Some("GH"));
        assert_eq!(context.destination.as_deref(), Some("KE"));

        context.merge(&ContextUpdate {
            passport: Some("  ".to_string()),
            ..Default::default()
        });
        assert_eq!(context.passport.as_deref(), Some("GH"));
    }

    #[test]
    fn test_lookup_fires_once_per_fact_set() {
        let mut context = TripContext::default();
        context.merge(&update(Some("GH"), Some("TZ")));
        assert!(context.ready_for_lookup());

        context.mark_lookup_done();
        assert!(!context.ready_for_lookup());

        // Same facts again: still done.
        context.merge(&update(Some("GH"), Some("TZ")));
        assert!(!context.ready_for_lookup());

        // New destination re-arms the lookup.
        context.merge(&update(None, Some("KE")));
        assert!(context.ready_for_lookup());
    }

    #[test]
    fn test_update_is_empty() {
        assert!(ContextUpdate::default().is_empty());
        assert!(update(Some(""), None).is_empty());
        assert!(!update(Some("GH"), None).is_empty());
    }
}
