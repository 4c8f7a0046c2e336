//! Configuration validation utilities

use bonded_core::BondedError;

/// Configuration validation result
pub type ValidationResult = Result<(), ValidationError>;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Value is out of acceptable range
    #[error("Field '{field}' must be {range} (got {actual})")]
    OutOfRange {
        /// Offending field
        field: String,
        /// Human-readable accepted range
        range: String,
        /// Supplied value
        actual: u64,
    },

    /// Value format is invalid
    #[error("Field '{field}' has invalid format. Expected: {expected}, got: {actual}")]
    InvalidFormat {
        /// Offending field
        field: String,
        /// What was expected
        expected: String,
        /// Supplied value
        actual: String,
    },

    /// Custom validation failed
    #[error("Field '{field}': {message}")]
    Custom {
        /// Offending field
        field: String,
        /// Rule description
        message: String,
    },
}

impl From<ValidationError> for BondedError {
    fn from(err: ValidationError) -> Self {
        BondedError::invalid(err.to_string())
    }
}

/// Validator that accumulates errors across fields
#[derive(Debug, Default)]
pub struct ConfigValidator {
    errors: Vec<ValidationError>,
    field_prefix: String,
}

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator for a nested field
    pub fn for_field(&self, field_name: &str) -> Self {
        Self {
            errors: Vec::new(),
            field_prefix: self.full_field_name(field_name),
        }
    }

    /// Validate that a number is within an inclusive range
    pub fn range(&mut self, field_name: &str, value: u64, min: Option<u64>, max: Option<u64>) -> &mut Self {
        let below = min.is_some_and(|min| value < min);
        let above = max.is_some_and(|max| value > max);
        if below || above {
            let range = match (min, max) {
                (Some(min), Some(max)) => format!("between {min} and {max}"),
                (Some(min), None) => format!("at least {min}"),
                (None, Some(max)) => format!("at most {max}"),
                (None, None) => "in valid range".to_string(),
            };
            self.errors.push(ValidationError::OutOfRange {
                field: self.full_field_name(field_name),
                range,
                actual: value,
            });
        }
        self
    }

    /// Validate that a number is non-zero
    pub fn positive(&mut self, field_name: &str, value: u64) -> &mut Self {
        self.range(field_name, value, Some(1), None)
    }

    /// Validate using a custom predicate
    pub fn custom<T, F>(&mut self, field_name: &str, value: &T, predicate: F, message: &str) -> &mut Self
    where
        F: FnOnce(&T) -> bool,
    {
        if !predicate(value) {
            self.errors.push(ValidationError::Custom {
                field: self.full_field_name(field_name),
                message: message.to_string(),
            });
        }
        self
    }

    /// Record a format error for a value that failed to parse
    pub fn invalid_format(&mut self, field_name: &str, expected: &str, actual: &str) -> &mut Self {
        self.errors.push(ValidationError::InvalidFormat {
            field: self.full_field_name(field_name),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
        self
    }

    /// Merge errors from another validator
    pub fn merge(&mut self, other: ConfigValidator) {
        self.errors.extend(other.errors);
    }

    /// First error, if any
    pub fn result(self) -> ValidationResult {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// All validation errors
    pub fn all_errors(self) -> Vec<ValidationError> {
        self.errors
    }

    fn full_field_name(&self, field_name: &str) -> String {
        if self.field_prefix.is_empty() {
            field_name.to_string()
        } else {
            format!("{}.{}", self.field_prefix, field_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_reports_bounds() {
        let mut v = ConfigValidator::new();
        v.range("ttl", 5, Some(10), Some(20));
        let err = v.result().unwrap_err();
        assert_eq!(err.to_string(), "Field 'ttl' must be between 10 and 20 (got 5)");
    }

    #[test]
    fn test_nested_fields_are_prefixed() {
        let root = ConfigValidator::new();
        let mut nested = root.for_field("min_bonds");
        nested.positive("MEDIATOR", 0);
        let errors = nested.all_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("min_bonds.MEDIATOR"));
    }

    #[test]
    fn test_accumulates_multiple_errors() {
        let mut v = ConfigValidator::new();
        v.positive("a", 0)
            .positive("b", 1)
            .custom("c", &"", |s| !s.is_empty(), "must not be empty");
        assert_eq!(v.all_errors().len(), 2);
    }
}
