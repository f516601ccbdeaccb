//! The success/failure wrapper returned by every public actor operation.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Result of a DSL operation: either a value or a [`DomainError`].
///
/// Actors never panic or return `Err` to signal a failed operation; the
/// failure is always inspectable here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
#[must_use]
pub enum Outcome<T> {
    Success(T),
    Failure(DomainError),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success(v) => Some(v),
            Self::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&DomainError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(e) => Some(e),
        }
    }

    /// Error code of a failure, `None` on success.
    pub fn code(&self) -> Option<&str> {
        self.error().map(|e| e.code.as_str())
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(v) => Outcome::Success(f(v)),
            Self::Failure(e) => Outcome::Failure(e),
        }
    }

    /// Chain another fallible step onto a success.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self {
            Self::Success(v) => f(v),
            Self::Failure(e) => Outcome::Failure(e),
        }
    }

    pub fn into_result(self) -> Result<T, DomainError> {
        match self {
            Self::Success(v) => Ok(v),
            Self::Failure(e) => Err(e),
        }
    }
}

impl<T> From<Outcome<T>> for Result<T, DomainError> {
    fn from(outcome: Outcome<T>) -> Self {
        outcome.into_result()
    }
}

impl<T> From<Result<T, DomainError>> for Outcome<T> {
    fn from(result: Result<T, DomainError>) -> Self {
        match result {
            Ok(v) => Self::Success(v),
            Err(e) => Self::Failure(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;

    #[test]
    fn exactly_one_side_is_populated() {
        let ok: Outcome<u32> = Outcome::Success(7);
        assert!(ok.is_success() && !ok.is_failure());
        assert_eq!(ok.value(), Some(&7));
        assert!(ok.error().is_none());

        let err: Outcome<u32> = Outcome::Failure(DomainError::business(codes::NO_CLIENT, "none"));
        assert!(err.is_failure() && !err.is_success());
        assert!(err.value().is_none());
        assert_eq!(err.code(), Some(codes::NO_CLIENT));
    }

    #[test]
    fn map_keeps_failure() {
        let err: Outcome<u32> = Outcome::Failure(DomainError::system("X_FAILED", "boom"));
        assert_eq!(err.map(|v| v * 2).code(), Some("X_FAILED"));
        assert_eq!(Outcome::Success(2).map(|v| v * 2).value(), Some(&4));
    }

    #[test]
    fn serializes_with_status_tag() {
        let json = serde_json::to_value(Outcome::Success(1.5)).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"], 1.5);
    }
}
