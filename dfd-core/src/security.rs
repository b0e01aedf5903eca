//! SQL identifier escaping for generated queries.
//!
//! Column names come straight from dataset headers, so they may contain
//! spaces, quotes or keywords. Every identifier interpolated into SQL goes
//! through [`SqlSecurity::escape_identifier`].

use crate::analyzers::errors::{AnalyzerError, AnalyzerResult};

/// Longest identifier accepted in generated SQL.
pub const MAX_IDENTIFIER_LENGTH: usize = 1024;

/// SQL identifier validation and escaping utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates and quotes an identifier.
    ///
    /// The identifier is wrapped in double quotes with embedded quotes doubled,
    /// which keeps its exact case and spelling.
    ///
    /// # Examples
    /// ```rust
    /// use dfd_core::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::escape_identifier("age").unwrap(), "\"age\"");
    /// assert_eq!(
    ///     SqlSecurity::escape_identifier("say \"hi\"").unwrap(),
    ///     "\"say \"\"hi\"\"\""
    /// );
    /// assert!(SqlSecurity::escape_identifier("").is_err());
    /// ```
    pub fn escape_identifier(identifier: &str) -> AnalyzerResult<String> {
        Self::validate_identifier(identifier)?;
        let escaped = identifier.replace('"', "\"\"");
        Ok(format!("\"{escaped}\""))
    }

    /// Validates an identifier without escaping it.
    pub fn validate_identifier(identifier: &str) -> AnalyzerResult<()> {
        if identifier.is_empty() {
            return Err(AnalyzerError::invalid_data(
                "SQL identifier cannot be empty",
            ));
        }

        if identifier.len() > MAX_IDENTIFIER_LENGTH {
            return Err(AnalyzerError::invalid_data(format!(
                "SQL identifier too long (max {MAX_IDENTIFIER_LENGTH} bytes)"
            )));
        }

        if identifier.contains('\0') {
            return Err(AnalyzerError::invalid_data(
                "SQL identifier cannot contain null bytes",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_identifiers() {
        assert_eq!(
            SqlSecurity::escape_identifier("customer_id").unwrap(),
            "\"customer_id\""
        );
        assert_eq!(
            SqlSecurity::escape_identifier("First Name").unwrap(),
            "\"First Name\""
        );
    }

    #[test]
    fn test_injection_stays_inside_quotes() {
        let escaped = SqlSecurity::escape_identifier("x\" FROM t; DROP TABLE t; --").unwrap();
        assert_eq!(escaped, "\"x\"\" FROM t; DROP TABLE t; --\"");
    }

    #[test]
    fn test_rejected_identifiers() {
        assert!(SqlSecurity::escape_identifier("").is_err());
        assert!(SqlSecurity::escape_identifier("a\0b").is_err());
        assert!(SqlSecurity::escape_identifier(&"x".repeat(MAX_IDENTIFIER_LENGTH + 1)).is_err());
    }
}
