use itertools::Itertools;
use simple_error::SimpleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    RuleSyntax(#[from] RuleSyntaxError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Every invalid field found while validating one configuration.
#[derive(Debug, Error)]
#[error("invalid configuration: {}", .errors.iter().map(|e| e.as_str()).join("; "))]
pub struct ConfigurationError {
    errors: Vec<SimpleError>,
}

impl ConfigurationError {
    pub fn new(errors: Vec<SimpleError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[SimpleError] {
        &self.errors
    }

    pub fn messages(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.as_str()).collect()
    }

    /// `Ok` when nothing was collected.
    pub fn check(errors: Vec<SimpleError>) -> Result<(), ConfigurationError> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self::new(errors))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSyntaxErrorKind {
    UnknownIdentifier,
    DisallowedOperator,
    MalformedLiteral,
    UnexpectedToken,
    UnexpectedEnd,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("learning rule syntax error at position {position}: {kind:?} '{token}'")]
pub struct RuleSyntaxError {
    pub token: String,
    pub position: usize,
    pub kind: RuleSyntaxErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{what}: length mismatch ({left_len} vs {right_len})")]
pub struct ShapeError {
    pub what: String,
    pub left_len: usize,
    pub right_len: usize,
}

impl ShapeError {
    pub fn check(what: &str, left_len: usize, right_len: usize) -> Result<(), ShapeError> {
        if left_len == right_len {
            Ok(())
        } else {
            Err(ShapeError {
                what: what.to_string(),
                left_len,
                right_len,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_lists_every_field() {
        let err = ConfigurationError::new(vec![
            SimpleError::new("decay_v has to be between 0 and 4096, got 5000"),
            SimpleError::new("refractory_period has to be between 1 and 64, got 0"),
        ]);

        assert_eq!(err.errors().len(), 2);
        assert_eq!(
            err.to_string(),
            "invalid configuration: decay_v has to be between 0 and 4096, got 5000; \
             refractory_period has to be between 1 and 64, got 0"
        );
    }

    #[test]
    fn empty_collection_is_ok() {
        assert!(ConfigurationError::check(Vec::new()).is_ok());
        assert!(ConfigurationError::check(vec![SimpleError::new("x")]).is_err());
    }

    #[test]
    fn shape_check() {
        assert!(ShapeError::check("spike source", 3, 3).is_ok());
        let err = ShapeError::check("spike source", 3, 4).unwrap_err();
        assert_eq!(err.to_string(), "spike source: length mismatch (3 vs 4)");
    }
}
