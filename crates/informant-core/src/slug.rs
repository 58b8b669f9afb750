//! Headline slugification.

use std::sync::OnceLock;

use regex::Regex;

fn separator_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("separator pattern is valid"))
}

/// Convert a headline to a URL-safe ASCII slug.
///
/// Rules:
/// - German umlauts and `ß` become `ae`, `oe`, `ue`, `ss`
/// - Other letters are transliterated to ASCII
/// - Lowercase
/// - Every run of anything else (spaces, punctuation, emoji) becomes one `-`
/// - Leading and trailing hyphens are trimmed
///
/// # Examples
///
/// ```
/// use informant_core::slugify;
///
/// assert_eq!(slugify("A3 wieder frei"), "a3-wieder-frei");
/// assert_eq!(slugify("Kühe? 🤔"), "kuehe");
/// ```
pub fn slugify(input: &str) -> String {
    let mut ascii = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            'ä' | 'Ä' => ascii.push_str("ae"),
            'ö' | 'Ö' => ascii.push_str("oe"),
            'ü' | 'Ü' => ascii.push_str("ue"),
            'ß' | 'ẞ' => ascii.push_str("ss"),
            c if c.is_ascii() => ascii.push(c),
            c if c.is_alphabetic() => ascii.push_str(deunicode::deunicode_char(c).unwrap_or(" ")),
            _ => ascii.push(' '),
        }
    }

    let lowered = ascii.to_lowercase();
    let collapsed = separator_runs().replace_all(&lowered, "-");
    collapsed.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_german_headline() {
        assert_eq!(
            slugify("Wasserbüffel legen Verkehr auf A3 lahm"),
            "wasserbueffel-legen-verkehr-auf-a3-lahm"
        );
        assert_eq!(slugify("Straße gesperrt: Ärger über Öl"), "strasse-gesperrt-aerger-ueber-oel");
    }

    #[test]
    fn test_emoji_and_punctuation_are_separators() {
        assert_eq!(slugify("Stau 🚘🚘🚘 auf der A1!"), "stau-auf-der-a1");
        assert_eq!(slugify("What's new?"), "what-s-new");
    }

    #[test]
    fn test_other_scripts_are_transliterated() {
        assert_eq!(slugify("Café Crème"), "cafe-creme");
    }

    #[test]
    fn test_leading_trailing_and_repeated_separators() {
        assert_eq!(slugify("  --Hello    World--  "), "hello-world");
    }

    #[test]
    fn test_nothing_sluggable() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!! 🤔"), "");
    }
}
