//! Module path encoding for registry URLs.
//!
//! Registries are case-insensitive on the wire, so upper-case letters are
//! spelled as `!` followed by the lower-case letter (`Azure` → `!azure`).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{PlugmanError, Result};

static MODULE_SEGMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._~+\-]+$").expect("module segment pattern is valid")
});

/// Escape a module path for use in registry URLs.
///
/// Every ASCII letter in `A..=Z` becomes `!` plus its lower-case form; all
/// other characters are copied through unchanged.
pub fn escape_module_path(module: &str) -> String {
    let mut escaped = String::with_capacity(module.len() + 4);
    for ch in module.chars() {
        if ch.is_ascii_uppercase() {
            escaped.push('!');
            escaped.push(ch.to_ascii_lowercase());
        } else {
            escaped.push(ch);
        }
    }
    escaped
}

/// Check that a module path is addressable on a registry.
///
/// Paths are `/`-separated, with no empty segments and no `.`/`..` segments.
pub fn validate_module_path(module: &str) -> Result<()> {
    if module.is_empty() || module.starts_with('/') || module.ends_with('/') {
        return Err(PlugmanError::InvalidModulePath(module.to_string()));
    }
    for segment in module.split('/') {
        if segment == "." || segment == ".." || !MODULE_SEGMENT_RE.is_match(segment) {
            return Err(PlugmanError::InvalidModulePath(module.to_string()));
        }
    }
    Ok(())
}

/// Check that a version string is a single safe path segment.
///
/// Versions end up in archive file names and URLs, so empty values, `.`/`..`
/// and anything containing a separator are refused.
pub fn is_valid_version(version: &str) -> bool {
    version != "." && version != ".." && MODULE_SEGMENT_RE.is_match(version)
}

/// Last path segment of a module, used to name cached archives.
pub fn module_leaf(module: &str) -> &str {
    module.rsplit('/').next().unwrap_or(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_lowercase_untouched() {
        assert_eq!(
            escape_module_path("github.com/acme/tool"),
            "github.com/acme/tool"
        );
    }

    #[test]
    fn test_escape_boundary_letters() {
        assert_eq!(escape_module_path("A"), "!a");
        assert_eq!(escape_module_path("Z"), "!z");
        assert_eq!(escape_module_path("AZ"), "!a!z");
        assert_eq!(
            escape_module_path("github.com/Azure/ZedTool"),
            "github.com/!azure/!zed!tool"
        );
    }

    #[test]
    fn test_escape_every_uppercase_letter() {
        let upper: String = ('A'..='Z').collect();
        let escaped = escape_module_path(&upper);
        let expected: String = ('a'..='z').flat_map(|c| ['!', c]).collect();
        assert_eq!(escaped, expected);
    }

    #[test]
    fn test_escape_leaves_other_characters_byte_identical() {
        let input = "example.com/m_1-2~x+y/v2@é[]";
        assert_eq!(escape_module_path(input), input);
        assert_eq!(escape_module_path("a@B"), "a@!b");
    }

    #[test]
    fn test_escape_non_ascii_uppercase_untouched() {
        assert_eq!(escape_module_path("ÀÉ"), "ÀÉ");
    }

    #[test]
    fn test_validate_module_path() {
        assert!(validate_module_path("github.com/WangYneos/GoModuleTest").is_ok());
        assert!(validate_module_path("example.com/a/b/v2").is_ok());

        assert!(validate_module_path("").is_err());
        assert!(validate_module_path("/leading").is_err());
        assert!(validate_module_path("trailing/").is_err());
        assert!(validate_module_path("a//b").is_err());
        assert!(validate_module_path("a/../b").is_err());
        assert!(validate_module_path("has space/x").is_err());
        assert!(validate_module_path("query?x=1").is_err());
    }

    #[test]
    fn test_version_is_single_segment() {
        for ok in ["v1.0.0", "v0.0.0-20230101120000-abcdef123456", "v2.1.0+incompatible"] {
            assert!(is_valid_version(ok), "{ok}");
        }
        for bad in ["", ".", "..", "../../../../escaped", "v1/../x", "v1\\x", "v1 0"] {
            assert!(!is_valid_version(bad), "{bad:?}");
        }
    }

    #[test]
    fn test_module_leaf() {
        assert_eq!(module_leaf("github.com/acme/tool"), "tool");
        assert_eq!(module_leaf("tool"), "tool");
    }
}
