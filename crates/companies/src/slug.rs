//! URL identifiers for companies.

use std::borrow::Cow;

/// Path segments under `/companies/` that are pages, not companies.
pub const RESERVED_SLUGS: &[&str] = &["register"];

/// Fallback when a name has no usable characters.
pub const FALLBACK_SLUG: &str = "company";

/// Room left for a `-N` suffix inside the 100-character column.
const BASE_MAX_CHARS: usize = 90;

pub fn is_reserved_slug(slug: &str) -> bool {
    RESERVED_SLUGS.contains(&slug)
}

/// Lowercase, keep unicode letters/digits/underscores, collapse whitespace
/// and hyphen runs into a single `-`, trim leading/trailing `-` and `_`.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '_' {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }

    let trimmed: String = out
        .trim_matches(|c| c == '-' || c == '_')
        .chars()
        .take(BASE_MAX_CHARS)
        .collect();
    let trimmed = trimmed.trim_end_matches(['-', '_']);

    if trimmed.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `slug` as one URL path segment. Unicode slugs are percent-encoded.
pub fn encode_slug(slug: &str) -> Cow<'_, str> {
    urlencoding::encode(slug)
}

/// Slug of a raw path segment; `None` when the escapes are not UTF-8.
pub fn decode_slug(segment: &str) -> Option<Cow<'_, str>> {
    urlencoding::decode(segment).ok()
}

/// First free candidate among `base`, `base-1`, `base-2`, ...
///
/// Reserved slugs always count as taken.
pub fn unique_slug(base: &str, mut is_taken: impl FnMut(&str) -> bool) -> String {
    let mut taken = |candidate: &str| is_reserved_slug(candidate) || is_taken(candidate);
    if !taken(base) {
        return base.to_string();
    }
    let mut counter: u32 = 1;
    loop {
        let candidate = format!("{base}-{counter}");
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ascii_names() {
        assert_eq!(slugify("Acme Trading Co."), "acme-trading-co");
        assert_eq!(slugify("  --Hello   World--  "), "hello-world");
        assert_eq!(slugify("snake_case name"), "snake_case-name");
    }

    #[test]
    fn unicode_is_kept() {
        assert_eq!(slugify("Рога и Копыта"), "рога-и-копыта");
    }

    #[test]
    fn unicode_slugs_survive_a_url_round_trip() {
        let slug = slugify("Рога и Копыта");
        let segment = encode_slug(&slug);
        assert!(segment.is_ascii());
        assert_eq!(decode_slug(&segment).as_deref(), Some(slug.as_str()));
        assert_eq!(encode_slug("acme-1"), "acme-1");
    }

    #[test]
    fn punctuation_only_falls_back() {
        assert_eq!(slugify("!!!"), FALLBACK_SLUG);
        assert_eq!(slugify(""), FALLBACK_SLUG);
    }

    #[test]
    fn collisions_get_numeric_suffixes() {
        let existing = ["acme", "acme-1"];
        assert_eq!(unique_slug("acme", |s| existing.contains(&s)), "acme-2");
        assert_eq!(unique_slug("fresh", |s| existing.contains(&s)), "fresh");
    }

    #[test]
    fn reserved_slug_is_never_returned() {
        assert_eq!(unique_slug("register", |_| false), "register-1");
    }

    proptest! {
        #[test]
        fn slugs_are_url_safe(name in "\\PC{0,60}") {
            let slug = slugify(&name);
            prop_assert!(!slug.is_empty());
            prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
            prop_assert!(slug.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_'));
        }
    }
}
