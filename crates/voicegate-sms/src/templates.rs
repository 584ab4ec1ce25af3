//! Follow-up message templates

/// Post-call follow-up text
///
/// Includes the visa summary when the call produced one, otherwise a
/// generic pointer to the site.
pub fn follow_up(visa_summary: Option<&str>) -> String {
    match visa_summary {
        Some(summary) => format!(
            "Thanks for calling! Here's what we found: {summary} \
Full details and applications: https://diasporaai.dev/visa"
        ),
        None => "Thanks for calling! Check visa requirements any time at \
https://diasporaai.dev/visa"
            .to_string(),
    }
}
