//! Utterance classification
//!
//! Regex-first extraction over settled transcripts. The language model
//! handles the conversation; this layer pulls out the structured facts the
//! call logic needs (countries, consent, goodbye) without waiting on a
//! model round trip.

use regex::Regex;

use crate::countries::resolve_country;

/// Facts extracted from one settled utterance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFacts {
    /// Passport country code, if the caller stated citizenship
    pub passport: Option<String>,
    /// Destination country code
    pub destination: Option<String>,
    /// Residence country code
    pub residence: Option<String>,
    /// Caller agreed to receive a follow-up text
    pub wants_sms: bool,
    /// Caller is wrapping up the call
    pub goodbye: bool,
}

/// Compiled classifier, built once at startup and shared across calls
pub struct UtteranceClassifier {
    citizenship: Vec<Regex>,
    destination: Vec<Regex>,
    residence: Vec<Regex>,
    route: Regex,
    consent: Regex,
    goodbye: Regex,
    filler: Regex,
}

impl UtteranceClassifier {
    pub fn new() -> Self {
        let country = r"([a-z]+(?:\s+[a-z]+)?)";
        Self {
            citizenship: compile(&[
                &format!(r"(?:i'm|i am|im)\s+(?:a\s+|an\s+)?{country}\s+(?:citizen|national)"),
                &format!(r"{country}\s+passport"),
                &format!(r"(?:i\s+hold|holding|i\s+have)\s+(?:a\s+|an\s+)?{country}\s+passport"),
                &format!(r"citizen\s+of\s+(?:the\s+)?{country}"),
                &format!(r"nationality\s+(?:is\s+)?{country}"),
                &format!(r"(?:i'm|i am|im)\s+(?:a\s+|an\s+)?{country}"),
            ]),
            destination: compile(&[&format!(
                r"(?:going\s+to|travel(?:ing|ling)?\s+to|flying\s+to|visit(?:ing)?|trip\s+to|to)\s+(?:the\s+)?{country}"
            )]),
            residence: compile(&[
                &format!(
                    r"(?:living\s+in|based\s+in|resident\s+of|reside\s+in|i\s+live\s+in|from)\s+(?:the\s+)?{country}"
                ),
                &format!(r"{country}\s+resident"),
            ]),
            route: Regex::new(&format!(r"{country}\s+to\s+{country}")).unwrap(),
            consent: Regex::new(
                r"(?:text|sms)\s+(?:it\s+to\s+)?me|send\s+(?:me\s+)?(?:a\s+|the\s+|that\s+)?(?:text|sms|message|link|details|info)|yes,?\s*please\s+send",
            )
            .unwrap(),
            goodbye: Regex::new(
                r"\b(?:goodbye|bye[\s-]?bye|bye)\b|that(?:'s|\s+is)\s+all|see\s+you|have\s+a\s+(?:good|nice|great)\s+day|talk\s+to\s+you\s+later|hang\s+up\s+now",
            )
            .unwrap(),
            filler: Regex::new(r"^(?:um+|uh+|ah+|oh+|hm+|mm+|er+)[.!?,\s]*$").unwrap(),
        }
    }

    /// Extract everything the call logic needs from one settled utterance
    pub fn classify(&self, utterance: &str) -> ExtractedFacts {
        let text = utterance.to_lowercase();
        let mut facts = ExtractedFacts {
            passport: first_country(&self.citizenship, &text),
            destination: first_country(&self.destination, &text),
            residence: first_country(&self.residence, &text),
            wants_sms: self.consent.is_match(&text),
            goodbye: self.goodbye.is_match(&text),
        };

        // "Ghana to Kenya" carries both slots without any verb to anchor on.
        if facts.passport.is_none() || facts.destination.is_none() {
            if let Some(captures) = self.route.captures(&text) {
                let from = captures.get(1).and_then(|m| resolve_country(m.as_str()));
                let to = captures.get(2).and_then(|m| resolve_country(m.as_str()));
                if let (Some(from), Some(to)) = (from, to) {
                    facts.passport.get_or_insert_with(|| from.to_string());
                    facts.destination.get_or_insert_with(|| to.to_string());
                }
            }
        }
        facts
    }

    /// Pure hesitation noise, never worth interrupting playback for
    pub fn is_filler(&self, text: &str) -> bool {
        self.filler.is_match(text.trim().to_lowercase().as_str())
    }

    /// Long enough and meaningful enough to treat as real caller speech
    pub fn is_substantive(&self, text: &str, min_chars: usize) -> bool {
        let trimmed = text.trim();
        trimmed.chars().count() >= min_chars && !self.is_filler(trimmed)
    }
}

impl Default for UtteranceClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

/// First pattern whose capture resolves to a known country wins
///
/// A capture can grab a trailing word that is not part of the country name
/// ("to ghana next"), so a two-word capture that fails resolution retries
/// with its first word alone.
fn first_country(patterns: &[Regex], text: &str) -> Option<String> {
    for pattern in patterns {
        for captures in pattern.captures_iter(text) {
            let Some(phrase) = captures.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if let Some(code) = resolve_country(phrase) {
                return Some(code.to_string());
            }
            if let Some(first_word) = phrase.split_whitespace().next() {
                if first_word != phrase {
                    if let Some(code) = resolve_country(first_word) {
                        return Some(code.to_string());
                    }
                }
            }
        }
    }
    None
}
