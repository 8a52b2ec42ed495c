//! Reference name rules, following git's conventions.
//!
//! A valid name:
//! - is non-empty
//! - contains no whitespace and none of `~ ^ : ? * [ \`
//! - contains neither `..` nor `@{`
//! - does not start or end with `.` or `/`
//! - does not end with `.lock`
//! - has no empty path components and no component starting with `.`

use vstore_types::{VersionError, VersionResult};

const FORBIDDEN_CHARS: &[char] = &['~', '^', ':', '?', '*', '[', '\\'];

fn invalid(name: &str, reason: impl Into<String>) -> VersionError {
    VersionError::InvalidReferenceName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Check a branch or tag name.
///
/// ```
/// use vstore_refs::validate_reference_name;
///
/// assert!(validate_reference_name("main").is_ok());
/// assert!(validate_reference_name("release/2024-q1").is_ok());
/// assert!(validate_reference_name("bad..name").is_err());
/// ```
pub fn validate_reference_name(name: &str) -> VersionResult<()> {
    if name.is_empty() {
        return Err(invalid(name, "must not be empty"));
    }
    if let Some(ch) = name
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_CHARS.contains(c))
    {
        return Err(invalid(name, format!("contains forbidden character {ch:?}")));
    }
    if name.contains("..") {
        return Err(invalid(name, "must not contain '..'"));
    }
    if name.contains("@{") {
        return Err(invalid(name, "must not contain '@{'"));
    }
    if name.starts_with(['.', '/']) || name.ends_with(['.', '/']) {
        return Err(invalid(name, "must not start or end with '.' or '/'"));
    }
    if name.ends_with(".lock") {
        return Err(invalid(name, "must not end with '.lock'"));
    }
    for component in name.split('/') {
        if component.is_empty() {
            return Err(invalid(name, "path components must not be empty"));
        }
        if component.starts_with('.') {
            return Err(invalid(
                name,
                format!("component {component:?} must not start with '.'"),
            ));
        }
    }
    Ok(())
}
