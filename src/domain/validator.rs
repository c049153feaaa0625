use crate::domain::{RemoteError, StaleResponse};
use thiserror::Error;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum ValidationState {
    #[default]
    Unvalidated,
    Pending(String),
    Valid(String),
    Invalid(String),
}

/// What the service said about a directory it managed to check.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationVerdict {
    Valid,
    Invalid,
}

/// Tags an outgoing validation request; only the most recently issued ticket is honored.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationTicket {
    seq: u64,
    pub path: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Stale(#[from] StaleResponse),

    #[error("could not check directory {path}: {source}")]
    CouldNotCheck { path: String, source: RemoteError },
}

#[derive(Clone, Debug, Default)]
pub struct DirectoryValidator {
    state: ValidationState,
    next_seq: u64,
    latest: Option<u64>,
    check_failed: Option<String>,
}

impl DirectoryValidator {
    pub fn state(&self) -> &ValidationState {
        &self.state
    }

    /// Reason of the last "could not check" failure for the current path, if any.
    pub fn check_failed(&self) -> Option<&str> {
        self.check_failed.as_deref()
    }

    pub fn is_valid_for(&self, path: &str) -> bool {
        matches!(&self.state, ValidationState::Valid(valid) if valid == path)
    }

    /// Records a new candidate path. Returns the request to send, or `None` for a blank path.
    ///
    /// Every call supersedes whatever validation was still in flight.
    pub fn set_path(&mut self, path: &str) -> Option<ValidationTicket> {
        self.check_failed = None;
        if path.trim().is_empty() {
            self.state = ValidationState::Unvalidated;
            self.latest = None;
            return None;
        }

        self.next_seq += 1;
        self.latest = Some(self.next_seq);
        self.state = ValidationState::Pending(path.to_string());
        Some(ValidationTicket {
            seq: self.next_seq,
            path: path.to_string(),
        })
    }

    /// Applies a validation response if its ticket is still the latest one.
    ///
    /// Transport failures and unreadable rejections leave the gate closed for that path and are
    /// reported as [`ValidationError::CouldNotCheck`], distinct from a plain `Invalid` verdict.
    pub fn apply(
        &mut self,
        ticket: &ValidationTicket,
        result: Result<ValidationVerdict, RemoteError>,
    ) -> Result<ValidationVerdict, ValidationError> {
        if self.latest != Some(ticket.seq) {
            return Err(StaleResponse.into());
        }
        self.latest = None;

        match result {
            Ok(ValidationVerdict::Valid) => {
                self.state = ValidationState::Valid(ticket.path.clone());
                Ok(ValidationVerdict::Valid)
            }
            Ok(ValidationVerdict::Invalid) => {
                self.state = ValidationState::Invalid(ticket.path.clone());
                Ok(ValidationVerdict::Invalid)
            }
            Err(source) => {
                self.state = ValidationState::Invalid(ticket.path.clone());
                self.check_failed = Some(source.reason());
                Err(ValidationError::CouldNotCheck {
                    path: ticket.path.clone(),
                    source,
                })
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match &self.state {
            ValidationState::Unvalidated => "No directory",
            ValidationState::Pending(_) => "Checking…",
            ValidationState::Valid(_) => "Valid",
            ValidationState::Invalid(_) if self.check_failed.is_some() => "Could not check",
            ValidationState::Invalid(_) => "Invalid directory",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_response_marks_path_valid() {
        let mut validator = DirectoryValidator::default();
        let ticket = validator.set_path("/tmp").expect("ticket");
        assert_eq!(validator.state(), &ValidationState::Pending("/tmp".to_string()));
        assert_eq!(
            validator.apply(&ticket, Ok(ValidationVerdict::Valid)),
            Ok(ValidationVerdict::Valid)
        );
        assert!(validator.is_valid_for("/tmp"));
        assert!(!validator.is_valid_for("/tmp/other"));
        assert_eq!(validator.label(), "Valid");
    }

    #[test]
    fn invalid_response_marks_path_invalid() {
        let mut validator = DirectoryValidator::default();
        let ticket = validator.set_path("/nope").expect("ticket");
        validator
            .apply(&ticket, Ok(ValidationVerdict::Invalid))
            .expect("apply");
        assert_eq!(validator.state(), &ValidationState::Invalid("/nope".to_string()));
        assert_eq!(validator.check_failed(), None);
        assert_eq!(validator.label(), "Invalid directory");
    }

    #[test]
    fn blank_path_resets_without_request() {
        let mut validator = DirectoryValidator::default();
        let ticket = validator.set_path("/tmp").expect("ticket");
        assert_eq!(validator.set_path("   "), None);
        assert_eq!(validator.state(), &ValidationState::Unvalidated);
        assert_eq!(
            validator.apply(&ticket, Ok(ValidationVerdict::Valid)),
            Err(ValidationError::Stale(StaleResponse))
        );
        assert_eq!(validator.state(), &ValidationState::Unvalidated);
    }

    #[test]
    fn out_of_order_responses_for_older_paths_are_discarded() {
        let mut validator = DirectoryValidator::default();
        let first = validator.set_path("/t").expect("ticket");
        let second = validator.set_path("/tm").expect("ticket");
        let third = validator.set_path("/tmp").expect("ticket");

        validator
            .apply(&third, Ok(ValidationVerdict::Valid))
            .expect("apply latest");
        assert_eq!(
            validator.apply(&first, Ok(ValidationVerdict::Invalid)),
            Err(ValidationError::Stale(StaleResponse))
        );
        assert_eq!(
            validator.apply(&second, Ok(ValidationVerdict::Invalid)),
            Err(ValidationError::Stale(StaleResponse))
        );
        assert!(validator.is_valid_for("/tmp"));
    }

    #[test]
    fn retyping_the_same_path_still_discards_the_older_request() {
        let mut validator = DirectoryValidator::default();
        let older = validator.set_path("/tmp").expect("ticket");
        let newer = validator.set_path("/tmp").expect("ticket");
        assert!(validator.apply(&older, Ok(ValidationVerdict::Valid)).is_err());
        assert!(!validator.is_valid_for("/tmp"));
        validator
            .apply(&newer, Ok(ValidationVerdict::Valid))
            .expect("apply");
        assert!(validator.is_valid_for("/tmp"));
    }

    #[test]
    fn transport_failure_is_reported_as_could_not_check() {
        let mut validator = DirectoryValidator::default();
        let ticket = validator.set_path("/srv").expect("ticket");
        let result = validator.apply(
            &ticket,
            Err(RemoteError::Transport("connection refused".to_string())),
        );
        assert!(matches!(result, Err(ValidationError::CouldNotCheck { .. })));
        assert!(!validator.is_valid_for("/srv"));
        assert!(validator.check_failed().is_some());
        assert_eq!(validator.label(), "Could not check");

        let retry = validator.set_path("/srv").expect("ticket");
        assert_eq!(validator.check_failed(), None);
        validator
            .apply(&retry, Ok(ValidationVerdict::Valid))
            .expect("apply");
        assert!(validator.is_valid_for("/srv"));
    }
}
