//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_IDENTIFIER_LEN: usize = 128;

/// Validates a player identifier handed out by the identity provider.
///
/// ```ignore
/// validate_identifier("uid-42")  // Ok
/// validate_identifier("")        // Err - empty
/// validate_identifier("a b")     // Err - whitespace
/// ```
pub fn validate_identifier(id: &str) -> Result<(), ValidationError> {
    let len = id.chars().count();
    if len == 0 || len > MAX_IDENTIFIER_LEN {
        let mut err = ValidationError::new("identifier_length");
        err.message = Some(
            format!("Identifier must be 1 to {MAX_IDENTIFIER_LEN} characters (got {len})").into(),
        );
        return Err(err);
    }

    if id.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("identifier_format");
        err.message = Some("Identifier must not contain whitespace".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_opaque_identifiers() {
        assert!(validate_identifier("uid-42").is_ok());
        assert!(validate_identifier("ZrP0k9xQmTs1").is_ok());
        assert!(validate_identifier(&"x".repeat(128)).is_ok());
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier(&"x".repeat(129)).is_err());
    }

    #[test]
    fn rejects_whitespace() {
        assert!(validate_identifier("a b").is_err());
        assert!(validate_identifier("tab\t").is_err());
    }
}
