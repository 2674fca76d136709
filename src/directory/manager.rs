use std::sync::LazyLock;

use regex::Regex;

static MANAGER_DN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"mail=([^,]+)").expect("manager DN regex"));

/// `mail=foo@mozilla.com,o=com,dc=mozilla` -> `foo@mozilla.com`. Values that
/// are not a DN come back unchanged.
pub fn clean_manager_attr(value: &str) -> String {
    MANAGER_DN_RE
        .captures(value)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_mail_from_dn() {
        assert_eq!(
            clean_manager_attr("mail=boss@mozilla.com,o=com,dc=mozilla"),
            "boss@mozilla.com"
        );
    }

    #[test]
    fn test_passes_through_plain_values() {
        assert_eq!(clean_manager_attr("boss@mozilla.com"), "boss@mozilla.com");
        assert_eq!(clean_manager_attr(""), "");
    }
}
