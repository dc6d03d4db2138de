use std::fmt::{self, Debug, Display};
use std::io;

/// Provides `SimError` and maps to other errors to
/// convert to a `SimError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum SimError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CSVError(csv::Error),
    /// A configuration value is malformed or out of range. Raised before any day-step runs.
    ParameterError(String),
    /// The compartment bookkeeping has been corrupted. This always indicates a bug in the
    /// orchestration and is never corrected silently.
    InvariantViolation(String),
    /// A results slot (batch directory, run file or parameter snapshot) is already occupied.
    ResultsConflict(String),
    SimError(String),
}

impl From<io::Error> for SimError {
    fn from(error: io::Error) -> Self {
        SimError::IoError(error)
    }
}

impl From<serde_json::Error> for SimError {
    fn from(error: serde_json::Error) -> Self {
        SimError::JsonError(error)
    }
}

impl From<csv::Error> for SimError {
    fn from(error: csv::Error) -> Self {
        SimError::CSVError(error)
    }
}

impl From<String> for SimError {
    fn from(error: String) -> Self {
        SimError::SimError(error)
    }
}

impl From<&str> for SimError {
    fn from(error: &str) -> Self {
        SimError::SimError(error.to_string())
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::IoError(error) => Some(error),
            SimError::JsonError(error) => Some(error),
            SimError::CSVError(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimError::ParameterError(msg) => write!(f, "Invalid parameter: {msg}"),
            SimError::InvariantViolation(msg) => write!(f, "Invariant violated: {msg}"),
            SimError::ResultsConflict(msg) => write!(f, "Results conflict: {msg}"),
            SimError::SimError(msg) => write!(f, "Error: {msg}"),
            _ => write!(f, "Error: {self:?}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_names_the_kind_of_failure() {
        let error = SimError::ParameterError("days_in_isolation must be at least 1".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid parameter: days_in_isolation must be at least 1"
        );

        let error = SimError::ResultsConflict("results/batch_00000".to_string());
        assert!(error.to_string().starts_with("Results conflict"));
    }

    #[test]
    fn io_errors_convert_and_keep_their_source() {
        let error: SimError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(error, SimError::IoError(_)));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn strings_convert_to_generic_errors() {
        let error: SimError = "something went wrong".into();
        assert!(matches!(error, SimError::SimError(ref msg) if msg == "something went wrong"));
    }
}
