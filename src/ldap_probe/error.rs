use std::time::Duration;

use thiserror::Error;

use super::result::Phase;

/// Errors surfaced by a directory client implementation.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Protocol(#[from] ldap3::LdapError),

    /// The server answered, but with a non-success LDAP result code.
    #[error("server returned result code {rc}: {text}")]
    Result { rc: u32, text: String },
}

#[derive(Debug, Error)]
pub enum PhaseFailure {
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("cancelled by shutdown")]
    Cancelled,
}

/// A phase-tagged probe failure.
#[derive(Debug, Error)]
#[error("{phase} phase failed")]
pub struct PhaseError {
    pub phase: Phase,
    #[source]
    pub cause: PhaseFailure,
}

impl PhaseError {
    pub fn new(phase: Phase, cause: PhaseFailure) -> Self {
        Self { phase, cause }
    }

    /// True when shutdown interrupted the phase rather than the directory failing it.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause, PhaseFailure::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::error::Error;

    #[test]
    fn test_phase_error_keeps_cause_as_source() {
        let error = PhaseError::new(
            Phase::Bind,
            DirectoryError::Result {
                rc: 49,
                text: "invalid credentials".to_string(),
            }
            .into(),
        );
        assert_eq!(error.to_string(), "bind phase failed");
        assert_eq!(
            error.source().map(|cause| cause.to_string()),
            Some("server returned result code 49: invalid credentials".to_string())
        );
    }
}
