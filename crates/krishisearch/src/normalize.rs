// Query Normalization
//
// Lowercase, strip noise characters, collapse whitespace.

use once_cell::sync::Lazy;
use regex::Regex;

/// Anything that is not a word character, whitespace, hyphen or question mark
static NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s\-\?]").expect("noise pattern is valid"));

/// Normalize raw user text into the form every other stage works on.
///
/// The output is lowercase, contains only word characters, single spaces,
/// `-` and `?`, and has no leading or trailing whitespace. Empty or
/// whitespace-only input yields an empty string.
pub fn normalize_query(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let cleaned = NOISE.replace_all(&lowered, "");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("How to control APHIDS?", "how to control aphids?")]
    #[case("  leaf   spot\t\ton tomato  ", "leaf spot on tomato")]
    #[case("DAP @ 50kg/acre!", "dap 50kgacre")]
    #[case("eco-friendly (organic) spray", "eco-friendly organic spray")]
    #[case("aphids & mustard", "aphids mustard")]
    #[case("", "")]
    #[case("   \n\t ", "")]
    fn test_normalize_query(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_query(raw), expected);
    }

    #[test]
    fn test_normalize_keeps_unicode_letters() {
        assert_eq!(normalize_query("किसान योजना"), "किसान योजना");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_query("  What's the BEST fertilizer -- for maize?? ");
        assert_eq!(normalize_query(&once), once);
    }
}
