//! Property lookup: full-scan, case-insensitive substring match.
//!
//! A record matches when the lowercased query occurs anywhere in the lowercased
//! concatenation of its values, numeric columns included. Results keep table
//! order and are capped; there is no ranking.

use crate::dataset::{PropertyRecord, PropertyTable};

/// Maximum number of listings read back to the caller.
pub const MAX_MATCHES: usize = 3;

pub const NO_MATCH_TEXT: &str = "Sorry, no properties matched your request.";
const MATCH_HEADER: &str = "Here are some properties I found:\n";

/// First `MAX_MATCHES` records whose values contain `query`, in table order.
pub fn search<'a>(query: &str, table: &'a PropertyTable) -> Vec<&'a PropertyRecord> {
    let needle = query.to_lowercase();
    table
        .records()
        .iter()
        .filter(|r| r.haystack().contains(&needle))
        .take(MAX_MATCHES)
        .collect()
}

/// Fixed-template summary of `matches`, or the no-match sentence.
pub fn format_matches(matches: &[&PropertyRecord]) -> String {
    if matches.is_empty() {
        return NO_MATCH_TEXT.to_string();
    }
    let mut out = String::from(MATCH_HEADER);
    for r in matches {
        out.push_str(&format!(
            "- {} in {} for AED {}\n",
            r.property_type, r.location, r.price
        ));
    }
    out
}

/// Search and format in one step; this is what the prompt receives.
pub fn lookup(query: &str, table: &PropertyTable) -> String {
    format_matches(&search(query, table))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(&str, &str, &str)]) -> PropertyTable {
        rows.iter()
            .map(|(t, l, p)| PropertyRecord::simple(*t, *l, *p))
            .collect()
    }

    #[test]
    fn single_villa_matches_exactly() {
        let t = table(&[("Villa", "Dubai Marina", "2500000")]);
        assert_eq!(
            lookup("villa", &t),
            "Here are some properties I found:\n- Villa in Dubai Marina for AED 2500000\n"
        );
    }

    #[test]
    fn no_match_sentence() {
        let t = table(&[("Villa", "Dubai Marina", "2500000")]);
        assert_eq!(lookup("penthouse", &t), "Sorry, no properties matched your request.");
    }

    #[test]
    fn caps_at_three_in_table_order() {
        let t = table(&[
            ("Villa", "Arabian Ranches", "1"),
            ("Villa", "Palm Jumeirah", "2"),
            ("Apartment", "Business Bay", "3"),
            ("Villa", "Emirates Hills", "4"),
            ("Villa", "Jumeirah Golf Estates", "5"),
            ("Villa", "Al Barari", "6"),
        ]);
        let found = search("VILLA", &t);
        assert_eq!(found.len(), 3);
        let locations: Vec<&str> = found.iter().map(|r| r.location.as_str()).collect();
        assert_eq!(locations, ["Arabian Ranches", "Palm Jumeirah", "Emirates Hills"]);
    }

    #[test]
    fn matches_incidental_substrings_in_any_field() {
        let t = table(&[
            ("Apartment", "Dubai Hills", "1500000"),
            ("Townhouse", "Sharjah", "950000"),
        ]);
        // "dubai" appears in a location; "150" appears inside a price.
        assert_eq!(search("Dubai", &t).len(), 1);
        assert_eq!(search("150", &t).len(), 1);
        // Field boundaries are a single space.
        assert_eq!(search("apartment dubai", &t).len(), 1);
    }

    #[test]
    fn rows_are_scanned_as_plain_space_joined_text() {
        let t = table(&[("Villa", "Dubai Marina", "2500000")]);
        assert_eq!(search("villa dubai", &t).len(), 1);
        assert_eq!(search("marina 2500000", &t).len(), 1);
        assert!(search("'villa'", &t).is_empty());
        assert!(search("villa, dubai", &t).is_empty());
        assert!(search("['villa'", &t).is_empty());
    }

    #[test]
    fn whole_utterance_rarely_matches() {
        let t = table(&[("Villa", "Dubai Marina", "2500000")]);
        assert_eq!(search("do you have a villa in dubai marina?", &t).len(), 0);
    }
}
