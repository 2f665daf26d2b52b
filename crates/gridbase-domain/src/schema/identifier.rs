//! SQL identifier safety.
//!
//! Every identifier that reaches DDL or DML through string interpolation
//! (schema names, table names, column names) is validated against a
//! whitelist before it is quoted. This is the only SQL-injection defense
//! at the schema level (spec §4.1) — parameterized queries handle values,
//! but PostgreSQL has no way to bind an identifier as a parameter.

use crate::constants::MAX_IDENTIFIER_LENGTH;
use crate::error::{Error, Result};

/// Validate that `ident` is safe to interpolate into DDL/DML: ASCII
/// letters, digits, and underscores only, non-empty, within the length
/// cap, and not starting with a digit.
///
/// # Errors
///
/// Returns [`Error::Validation`] if `ident` fails the whitelist.
pub fn validate_identifier(ident: &str) -> Result<()> {
    if ident.is_empty() {
        return Err(Error::validation("identifier must not be empty"));
    }
    if ident.len() > MAX_IDENTIFIER_LENGTH {
        return Err(Error::validation(format!(
            "identifier exceeds max length of {MAX_IDENTIFIER_LENGTH}"
        )));
    }
    let mut chars = ident.chars();
    let first = chars.next().expect("checked non-empty above");
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(Error::validation(
            "identifier must start with a letter or underscore",
        ));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::validation(
            "identifier must contain only letters, digits, and underscores",
        ));
    }
    Ok(())
}

/// Quote a pre-validated identifier per PostgreSQL double-quote rules.
///
/// Callers MUST have passed `ident` through [`validate_identifier`]
/// first; this function does not re-validate, it only escapes embedded
/// quotes (there should be none after validation, but doubling them is
/// cheap insurance at the final interpolation site).
#[must_use]
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        assert!(validate_identifier("tbl_abc123").is_ok());
        assert!(validate_identifier("_leading_underscore").is_ok());
    }

    #[test]
    fn rejects_injection_attempts() {
        assert!(validate_identifier("tbl; DROP TABLE users;--").is_err());
        assert!(validate_identifier("tbl\" OR \"1\"=\"1").is_err());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1leading_digit").is_err());
    }

    #[test]
    fn quotes_and_escapes() {
        assert_eq!(quote_ident("tbl_x"), "\"tbl_x\"");
    }
}
