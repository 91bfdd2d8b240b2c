//! Validation of stage names.
//!
//! Stage names double as artifact file names, so they are restricted to a
//! portable character set and may not be hidden files.

use crate::errors::ScreenflowError;
use regex::Regex;
use std::sync::OnceLock;

const STAGE_NAME_PATTERN: &str = r"^[A-Za-z0-9_.-]+$";

static STAGE_NAME: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

/// Checks that `name` can identify a stage artifact.
///
/// # Errors
///
/// Returns [`ScreenflowError::InvalidStageName`] if the name is empty,
/// starts with `.`, or contains characters outside `[A-Za-z0-9_.-]`.
pub fn validate_stage_name(name: &str) -> Result<(), ScreenflowError> {
    let invalid = |reason: &str| ScreenflowError::InvalidStageName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.starts_with('.') {
        return Err(invalid("name must not start with '.'"));
    }

    let pattern = STAGE_NAME
        .get_or_init(|| Regex::new(STAGE_NAME_PATTERN))
        .as_ref()
        .map_err(|err| ScreenflowError::Internal(format!("stage name pattern: {err}")))?;

    if pattern.is_match(name) {
        Ok(())
    } else {
        Err(invalid("only letters, digits, '_', '.' and '-' are allowed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_portable_names() {
        for name in ["nasdaq_listings", "relative-strengths", "stage.2", "A1"] {
            assert!(validate_stage_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_rejects_bad_names() {
        for name in ["", ".hidden", "../escape", "a/b", "has space", "ünïcode"] {
            let err = validate_stage_name(name).unwrap_err();
            assert!(
                matches!(err, ScreenflowError::InvalidStageName { .. }),
                "{name} should be rejected"
            );
        }
    }
}
