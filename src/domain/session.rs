use crate::domain::{DirectoryValidator, RemoteError};
use thiserror::Error;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum MonitoringSession {
    #[default]
    Stopped,
    Starting {
        directory: String,
    },
    Monitoring {
        directory: String,
    },
    Stopping {
        directory: String,
    },
}

/// The remote call a toggle resolved to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SessionRequest {
    Start { directory: String },
    Stop { directory: String },
}

impl SessionRequest {
    pub fn directory(&self) -> &str {
        match self {
            Self::Start { directory } | Self::Stop { directory } => directory,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum SessionError {
    #[error("enter a valid directory before starting monitoring")]
    NotValidated,

    #[error("a start/stop request is already in progress")]
    SessionBusy,

    #[error("failed to start monitoring: {0}")]
    StartFailed(String),

    #[error("failed to stop monitoring: {0}")]
    StopFailed(String),

    #[error("response does not match the pending start/stop request")]
    Unexpected,
}

/// Monitoring lifecycle: `Stopped -> Starting -> Monitoring -> Stopping -> Stopped`.
///
/// A failed start falls back to `Stopped`, a failed stop back to `Monitoring`.
#[derive(Clone, Debug, Default)]
pub struct SessionController {
    state: MonitoringSession,
}

impl SessionController {
    /// Controller for a session the service is already running for `directory`.
    pub fn attached(directory: impl Into<String>) -> Self {
        Self {
            state: MonitoringSession::Monitoring {
                directory: directory.into(),
            },
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &MonitoringSession {
        &self.state
    }

    pub fn is_monitoring(&self) -> bool {
        matches!(self.state, MonitoringSession::Monitoring { .. })
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            MonitoringSession::Starting { .. } | MonitoringSession::Stopping { .. }
        )
    }

    /// Directory bound to the running session; set on entering `Monitoring`, cleared on `Stopped`.
    pub fn bound_directory(&self) -> Option<&str> {
        match &self.state {
            MonitoringSession::Monitoring { directory }
            | MonitoringSession::Stopping { directory } => Some(directory),
            MonitoringSession::Stopped | MonitoringSession::Starting { .. } => None,
        }
    }

    /// Starts or stops depending on the current state and returns the remote call to make.
    ///
    /// Starting requires `validator` to hold a `Valid` verdict for exactly `path`.
    pub fn toggle(
        &mut self,
        path: &str,
        validator: &DirectoryValidator,
    ) -> Result<SessionRequest, SessionError> {
        match &self.state {
            MonitoringSession::Stopped => {
                if !validator.is_valid_for(path) {
                    return Err(SessionError::NotValidated);
                }
                let directory = path.to_string();
                self.state = MonitoringSession::Starting {
                    directory: directory.clone(),
                };
                Ok(SessionRequest::Start { directory })
            }
            MonitoringSession::Monitoring { directory } => {
                let directory = directory.clone();
                self.state = MonitoringSession::Stopping {
                    directory: directory.clone(),
                };
                Ok(SessionRequest::Stop { directory })
            }
            MonitoringSession::Starting { .. } | MonitoringSession::Stopping { .. } => {
                Err(SessionError::SessionBusy)
            }
        }
    }

    /// Applies the outcome of the request returned by [`SessionController::toggle`].
    ///
    /// On success returns the status text reported by the service.
    pub fn complete(
        &mut self,
        request: &SessionRequest,
        result: Result<String, RemoteError>,
    ) -> Result<String, SessionError> {
        match (&self.state, request) {
            (MonitoringSession::Starting { directory }, SessionRequest::Start { directory: sent })
                if directory == sent =>
            {
                match result {
                    Ok(status) => {
                        self.state = MonitoringSession::Monitoring {
                            directory: directory.clone(),
                        };
                        Ok(status)
                    }
                    Err(error) => {
                        self.state = MonitoringSession::Stopped;
                        Err(SessionError::StartFailed(error.reason()))
                    }
                }
            }
            (MonitoringSession::Stopping { directory }, SessionRequest::Stop { directory: sent })
                if directory == sent =>
            {
                match result {
                    Ok(status) => {
                        self.state = MonitoringSession::Stopped;
                        Ok(status)
                    }
                    Err(error) => {
                        self.state = MonitoringSession::Monitoring {
                            directory: directory.clone(),
                        };
                        Err(SessionError::StopFailed(error.reason()))
                    }
                }
            }
            _ => Err(SessionError::Unexpected),
        }
    }

    pub fn label(&self) -> &'static str {
        match self.state {
            MonitoringSession::Stopped => "Stopped",
            MonitoringSession::Starting { .. } => "Starting…",
            MonitoringSession::Monitoring { .. } => "Monitoring",
            MonitoringSession::Stopping { .. } => "Stopping…",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ValidationVerdict;

    fn validator_with(path: &str, verdict: ValidationVerdict) -> DirectoryValidator {
        let mut validator = DirectoryValidator::default();
        let ticket = validator.set_path(path).expect("ticket");
        validator.apply(&ticket, Ok(verdict)).expect("apply");
        validator
    }

    #[test]
    fn valid_path_starts_and_binds_directory() {
        let validator = validator_with("/tmp", ValidationVerdict::Valid);
        let mut session = SessionController::default();

        let request = session.toggle("/tmp", &validator).expect("toggle");
        assert_eq!(
            request,
            SessionRequest::Start {
                directory: "/tmp".to_string()
            }
        );
        assert_eq!(session.label(), "Starting…");
        assert_eq!(session.bound_directory(), None);

        let status = session
            .complete(&request, Ok("Monitoring Started in /tmp".to_string()))
            .expect("complete");
        assert_eq!(status, "Monitoring Started in /tmp");
        assert!(session.is_monitoring());
        assert_eq!(session.bound_directory(), Some("/tmp"));
    }

    #[test]
    fn invalid_path_is_rejected_without_state_change() {
        let validator = validator_with("/nope", ValidationVerdict::Invalid);
        let mut session = SessionController::default();
        assert_eq!(
            session.toggle("/nope", &validator),
            Err(SessionError::NotValidated)
        );
        assert_eq!(session.state(), &MonitoringSession::Stopped);
    }

    #[test]
    fn unvalidated_or_pending_path_is_rejected() {
        let mut session = SessionController::default();
        let validator = DirectoryValidator::default();
        assert_eq!(
            session.toggle("/tmp", &validator),
            Err(SessionError::NotValidated)
        );

        let mut pending = DirectoryValidator::default();
        let _ticket = pending.set_path("/tmp");
        assert_eq!(
            session.toggle("/tmp", &pending),
            Err(SessionError::NotValidated)
        );
        assert_eq!(session.state(), &MonitoringSession::Stopped);
    }

    #[test]
    fn verdict_for_a_different_path_does_not_unlock_start() {
        let validator = validator_with("/tmp", ValidationVerdict::Valid);
        let mut session = SessionController::default();
        assert_eq!(
            session.toggle("/var", &validator),
            Err(SessionError::NotValidated)
        );
    }

    #[test]
    fn toggle_twice_round_trips_to_stopped_without_bound_directory() {
        let validator = validator_with("/tmp", ValidationVerdict::Valid);
        let mut session = SessionController::default();
        assert_eq!(session.bound_directory(), None);

        let start = session.toggle("/tmp", &validator).expect("start");
        session
            .complete(&start, Ok("started".to_string()))
            .expect("complete start");
        assert!(session.is_monitoring());

        let stop = session.toggle("/tmp", &validator).expect("stop");
        assert_eq!(
            stop,
            SessionRequest::Stop {
                directory: "/tmp".to_string()
            }
        );
        assert_eq!(session.bound_directory(), Some("/tmp"));
        session
            .complete(&stop, Ok("stopped".to_string()))
            .expect("complete stop");
        assert_eq!(session.state(), &MonitoringSession::Stopped);
        assert_eq!(session.bound_directory(), None);
    }

    #[test]
    fn toggle_while_request_in_flight_is_busy() {
        let validator = validator_with("/tmp", ValidationVerdict::Valid);
        let mut session = SessionController::default();
        let _start = session.toggle("/tmp", &validator).expect("start");
        assert!(session.is_busy());
        assert_eq!(
            session.toggle("/tmp", &validator),
            Err(SessionError::SessionBusy)
        );
        assert_eq!(
            session.state(),
            &MonitoringSession::Starting {
                directory: "/tmp".to_string()
            }
        );
    }

    #[test]
    fn failed_start_reverts_to_stopped() {
        let validator = validator_with("/tmp", ValidationVerdict::Valid);
        let mut session = SessionController::default();
        let start = session.toggle("/tmp", &validator).expect("start");
        let result = session.complete(
            &start,
            Err(RemoteError::Rejected {
                status: 400,
                message: "already running".to_string(),
            }),
        );
        assert_eq!(
            result,
            Err(SessionError::StartFailed("already running".to_string()))
        );
        assert_eq!(session.state(), &MonitoringSession::Stopped);
    }

    #[test]
    fn failed_stop_reverts_to_monitoring() {
        let validator = DirectoryValidator::default();
        let mut session = SessionController::attached("/tmp");
        let stop = session.toggle("/ignored", &validator).expect("stop");
        assert_eq!(stop.directory(), "/tmp");
        let result = session.complete(
            &stop,
            Err(RemoteError::Transport("connection reset".to_string())),
        );
        assert!(matches!(result, Err(SessionError::StopFailed(_))));
        assert_eq!(session.bound_directory(), Some("/tmp"));
        assert!(session.is_monitoring());
    }

    #[test]
    fn completion_without_pending_request_is_unexpected() {
        let mut session = SessionController::default();
        let request = SessionRequest::Start {
            directory: "/tmp".to_string(),
        };
        assert_eq!(
            session.complete(&request, Ok("ok".to_string())),
            Err(SessionError::Unexpected)
        );
        assert_eq!(session.state(), &MonitoringSession::Stopped);
    }
}
