//! Lightweight sensitive-content tagging.
//!
//! Tags describe what kind of sensitive content a prompt or response carries
//! without keeping any of the text itself.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Email address.
pub const PII_EMAIL: &str = "PII_EMAIL";
/// Phone number.
pub const PII_PHONE: &str = "PII_PHONE";
/// Payment card number.
pub const PII_FINANCIAL_CARD: &str = "PII_FINANCIAL_CARD";
/// Medical vocabulary.
pub const PHI_MEDICAL: &str = "PHI_MEDICAL";
/// Financial vocabulary.
pub const FINANCIAL_TERMS: &str = "FINANCIAL_TERMS";

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").expect("Email regex should be valid")
});

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\+?\d{1,3}[ -]?)?\(?\d{3}\)?[ -]?\d{3}[ -]?\d{4}\b").expect("Phone regex should be valid")
});

static CREDIT_CARD_REGEX: Lazy<Regex> = Lazy::new(|| {
    // 13-16 digits, optionally grouped by spaces or dashes
    Regex::new(r"\b(?:\d[ -]?){13,16}\b").expect("Credit card regex should be valid")
});

const PHI_KEYWORDS: &[&str] = &["doctor", "diagnosis", "prescription", "hospital", "patient", "medical"];

const FINANCIAL_KEYWORDS: &[&str] = &["salary", "bank", "loan", "credit", "mortgage", "account number"];

/// Returns the sorted, de-duplicated tags for `text`. Empty text has no tags.
#[must_use]
pub fn detect_tags(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut tags = BTreeSet::new();
    if EMAIL_REGEX.is_match(text) {
        tags.insert(PII_EMAIL);
    }
    if PHONE_REGEX.is_match(text) {
        tags.insert(PII_PHONE);
    }
    if CREDIT_CARD_REGEX.is_match(text) {
        tags.insert(PII_FINANCIAL_CARD);
    }

    let lower = text.to_lowercase();
    if contains_any(&lower, PHI_KEYWORDS) {
        tags.insert(PHI_MEDICAL);
    }
    if contains_any(&lower, FINANCIAL_KEYWORDS) {
        tags.insert(FINANCIAL_TERMS);
    }

    tags.into_iter().map(str::to_string).collect()
}

/// Sorted union of several tag lists.
#[must_use]
pub fn merge_tags<'a>(lists: impl IntoIterator<Item = &'a [String]>) -> Vec<String> {
    lists.into_iter().flatten().cloned().collect::<BTreeSet<_>>().into_iter().collect()
}

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| haystack.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_has_no_tags() {
        assert!(detect_tags("").is_empty());
        assert!(detect_tags("what is the capital of France").is_empty());
    }

    #[test]
    fn test_email_detection_is_case_insensitive() {
        assert_eq!(detect_tags("mail Jane.Doe@Example.COM please"), vec![PII_EMAIL]);
    }

    #[test]
    fn test_phone_detection() {
        assert!(detect_tags("call me at (555) 123-4567").contains(&PII_PHONE.to_string()));
        assert!(detect_tags("call +1 555 123 4567").contains(&PII_PHONE.to_string()));
    }

    #[test]
    fn test_card_detection() {
        let tags = detect_tags("card 4111-1111-1111-1111 expires soon");
        assert!(tags.contains(&PII_FINANCIAL_CARD.to_string()));
    }

    #[test]
    fn test_keyword_tags() {
        assert_eq!(detect_tags("The Patient saw a doctor"), vec![PHI_MEDICAL]);
        assert_eq!(detect_tags("What is my ACCOUNT NUMBER"), vec![FINANCIAL_TERMS]);
    }

    #[test]
    fn test_tags_are_sorted_and_unique() {
        let tags = detect_tags("patient a@b.io has a mortgage at the hospital, bank a@b.io");
        assert_eq!(tags, vec![FINANCIAL_TERMS, PHI_MEDICAL, PII_EMAIL]);
    }

    #[test]
    fn test_merge_tags() {
        let a = vec![PII_EMAIL.to_string(), PHI_MEDICAL.to_string()];
        let b = vec![PHI_MEDICAL.to_string(), FINANCIAL_TERMS.to_string()];
        assert_eq!(merge_tags([a.as_slice(), b.as_slice()]), vec![FINANCIAL_TERMS, PHI_MEDICAL, PII_EMAIL]);
    }
}
