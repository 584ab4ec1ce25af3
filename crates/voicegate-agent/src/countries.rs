//! Country name resolution
//!
//! Maps whatever a speech transcript calls a country onto an ISO 3166-1
//! alpha-2 code. Transcripts arrive with nationalities ("Ghanaian"), cities
//! standing in for countries ("Lagos"), and recurring mishearings
//! ("danzaba" for Zanzibar), so the table carries all of those spellings.

/// Resolve a transcript token to a country code
///
/// Tries the phrase as heard, then with common nationality suffixes
/// stripped ("Kenyan" -> "kenya", "British" via the table directly).
pub fn resolve_country(phrase: &str) -> Option<&'static str> {
    let normalized = phrase.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    if let Some(code) = lookup(&normalized) {
        return Some(code);
    }
    for suffix in ["ian", "ish", "ese", "an", "n", "i"] {
        if let Some(stem) = normalized.strip_suffix(suffix) {
            if stem.len() >= 3 {
                if let Some(code) = lookup(stem) {
                    return Some(code);
                }
            }
        }
    }
    None
}

fn lookup(name: &str) -> Option<&'static str> {
    COUNTRIES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, code)| *code)
}

/// Spoken-name aliases, including nationalities, major cities and
/// mishearings the transcriber produces in practice
const COUNTRIES: &[(&str, &str)] = &[
    ("ghana", "GH"),
    ("accra", "GH"),
    ("ghanaian", "GH"),
    ("nigeria", "NG"),
    ("lagos", "NG"),
    ("abuja", "NG"),
    ("nigerian", "NG"),
    ("kenya", "KE"),
    ("nairobi", "KE"),
    ("kenyan", "KE"),
    ("south africa", "ZA"),
    ("johannesburg", "ZA"),
    ("cape town", "ZA"),
    ("south african", "ZA"),
    ("tanzania", "TZ"),
    ("zanzibar", "TZ"),
    ("danzaba", "TZ"),
    ("tansania", "TZ"),
    ("dar es salaam", "TZ"),
    ("tanzanian", "TZ"),
    ("uganda", "UG"),
    ("kampala", "UG"),
    ("ugandan", "UG"),
    ("rwanda", "RW"),
    ("kigali", "RW"),
    ("rwandan", "RW"),
    ("ethiopia", "ET"),
    ("addis ababa", "ET"),
    ("ethiopian", "ET"),
    ("egypt", "EG"),
    ("cairo", "EG"),
    ("egyptian", "EG"),
    ("morocco", "MA"),
    ("marrakech", "MA"),
    ("moroccan", "MA"),
    ("senegal", "SN"),
    ("dakar", "SN"),
    ("senegalese", "SN"),
    ("zambia", "ZM"),
    ("lusaka", "ZM"),
    ("zambian", "ZM"),
    ("zimbabwe", "ZW"),
    ("harare", "ZW"),
    ("zimbabwean", "ZW"),
    ("uk", "GB"),
    ("united kingdom", "GB"),
    ("britain", "GB"),
    ("great britain", "GB"),
    ("england", "GB"),
    ("london", "GB"),
    ("british", "GB"),
    ("you kay", "GB"),
    ("us", "US"),
    ("usa", "US"),
    ("united states", "US"),
    ("america", "US"),
    ("new york", "US"),
    ("american", "US"),
    ("canada", "CA"),
    ("toronto", "CA"),
    ("canadian", "CA"),
    ("germany", "DE"),
    ("berlin", "DE"),
    ("german", "DE"),
    ("france", "FR"),
    ("paris", "FR"),
    ("french", "FR"),
    ("netherlands", "NL"),
    ("holland", "NL"),
    ("amsterdam", "NL"),
    ("dutch", "NL"),
    ("spain", "ES"),
    ("madrid", "ES"),
    ("spanish", "ES"),
    ("italy", "IT"),
    ("rome", "IT"),
    ("italian", "IT"),
    ("portugal", "PT"),
    ("lisbon", "PT"),
    ("portuguese", "PT"),
    ("ireland", "IE"),
    ("dublin", "IE"),
    ("irish", "IE"),
    ("uae", "AE"),
    ("dubai", "AE"),
    ("abu dhabi", "AE"),
    ("emirates", "AE"),
    ("india", "IN"),
    ("mumbai", "IN"),
    ("delhi", "IN"),
    ("indian", "IN"),
    ("china", "CN"),
    ("beijing", "CN"),
    ("chinese", "CN"),
    ("japan", "JP"),
    ("tokyo", "JP"),
    ("japanese", "JP"),
    ("australia", "AU"),
    ("sydney", "AU"),
    ("australian", "AU"),
    ("brazil", "BR"),
    ("sao paulo", "BR"),
    ("brazilian", "BR"),
    ("turkey", "TR"),
    ("istanbul", "TR"),
    ("turkish", "TR"),
];
