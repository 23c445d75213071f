//! Message personalization.
//!
//! Templates may contain a `{name}` placeholder (case-insensitive). It is
//! replaced with the recipient's display name, or a fixed fallback when
//! the contact list carries no name for that recipient.

use std::sync::OnceLock;

use regex::{NoExpand, Regex};

/// Substituted when a recipient has no display name.
pub const NAME_FALLBACK: &str = "Friend";

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"(?i)\{name\}").expect("placeholder regex is valid"))
}

/// Resolve a message template for one recipient.
///
/// Every occurrence of `{name}` (any casing) is replaced. Templates
/// without the placeholder pass through unchanged.
pub fn resolve_message(template: &str, display_name: Option<&str>) -> String {
    let name = match display_name {
        Some(n) if !n.trim().is_empty() => n.trim(),
        _ => NAME_FALLBACK,
    };
    // NoExpand: names are literal text, never capture-group syntax.
    placeholder()
        .replace_all(template, NoExpand(name))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_display_name() {
        assert_eq!(resolve_message("Hi {name}", Some("Ana")), "Hi Ana");
    }

    #[test]
    fn missing_name_uses_fallback() {
        assert_eq!(resolve_message("Hi {name}", None), "Hi Friend");
    }

    #[test]
    fn blank_name_uses_fallback() {
        assert_eq!(resolve_message("Hi {name}", Some("   ")), "Hi Friend");
    }

    #[test]
    fn placeholder_is_case_insensitive() {
        assert_eq!(
            resolve_message("Hi {Name}, really {NAME}", Some("Ana")),
            "Hi Ana, really Ana"
        );
    }

    #[test]
    fn replaces_every_occurrence() {
        assert_eq!(
            resolve_message("{name} {name} {name}", Some("Bo")),
            "Bo Bo Bo"
        );
    }

    #[test]
    fn template_without_placeholder_unchanged() {
        assert_eq!(
            resolve_message("Fixed offer, today only", Some("Ana")),
            "Fixed offer, today only"
        );
    }

    #[test]
    fn surrounding_whitespace_in_name_is_trimmed() {
        assert_eq!(resolve_message("Hi {name}", Some("  Ana ")), "Hi Ana");
    }

    #[test]
    fn name_with_replacement_syntax_stays_literal() {
        assert_eq!(resolve_message("Hi {name}", Some("$1 Ana")), "Hi $1 Ana");
    }
}
