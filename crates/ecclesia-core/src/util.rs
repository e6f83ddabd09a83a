//! Identifier and slug helpers

use uuid::Uuid;

/// Fresh document id
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// URL-friendly slug
///
/// Punctuation is dropped, runs of whitespace, underscores and dashes become
/// one dash, and leading or trailing dashes are trimmed.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for ch in input.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || ch == '_' || ch == '-' {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Grace Chapel"), "grace-chapel");
        assert_eq!(slugify("  St. Mary's -- Lagos "), "st-marys-lagos");
        assert_eq!(slugify("house_of_grace"), "house-of-grace");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_new_id_is_unique() {
        assert_ne!(new_id(), new_id());
        assert_eq!(new_id().len(), 36);
    }
}
