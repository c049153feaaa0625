use std::time::Duration;
use thiserror::Error;

/// Failure of a single request against the monitor service.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum RemoteError {
    #[error("could not reach monitor service: {0}")]
    Transport(String),

    #[error("monitor service did not answer within {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("monitor service rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected response from monitor service: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Short human reason, preferring the message the service sent back.
    pub fn reason(&self) -> String {
        match self {
            Self::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// A response that arrived for a request that has since been superseded.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[error("stale response discarded")]
pub struct StaleResponse;
