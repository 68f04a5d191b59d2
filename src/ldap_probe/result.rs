use std::fmt;
use std::time::Duration;

use super::error::PhaseError;

/// The three timed phases of a probe cycle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Connect,
    Bind,
    Search,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Connect, Phase::Bind, Phase::Search];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Connect => "connect",
            Phase::Bind => "bind",
            Phase::Search => "search",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to a single phase during one cycle.
#[derive(Debug)]
pub enum PhaseOutcome {
    /// Never started because an earlier phase failed.
    Skipped,
    Completed(Duration),
    Failed { elapsed: Duration, error: PhaseError },
}

impl PhaseOutcome {
    /// Duration in milliseconds of a phase that ran to completion, whether it
    /// succeeded or failed. Skipped phases and phases cut short by shutdown
    /// have no measurement.
    pub fn measured_ms(&self) -> Option<f64> {
        match self {
            PhaseOutcome::Completed(elapsed) => Some(as_millis(*elapsed)),
            PhaseOutcome::Failed { error, .. } if error.is_cancelled() => None,
            PhaseOutcome::Failed { elapsed, .. } => Some(as_millis(*elapsed)),
            PhaseOutcome::Skipped => None,
        }
    }
}

/// Outcome of one connect/bind/search cycle.
#[derive(Debug)]
pub struct ProbeResult {
    pub connection: PhaseOutcome,
    pub bind: PhaseOutcome,
    pub search: PhaseOutcome,
    /// Wall-clock time of the whole cycle, session release included.
    pub total: Duration,
}

impl ProbeResult {
    pub fn outcome(&self, phase: Phase) -> &PhaseOutcome {
        match phase {
            Phase::Connect => &self.connection,
            Phase::Bind => &self.bind,
            Phase::Search => &self.search,
        }
    }

    /// The error that ended the cycle early, if any.
    pub fn failure(&self) -> Option<&PhaseError> {
        Phase::ALL
            .into_iter()
            .find_map(|phase| match self.outcome(phase) {
                PhaseOutcome::Failed { error, .. } => Some(error),
                _ => None,
            })
    }

    pub fn failed_phase(&self) -> Option<Phase> {
        self.failure().map(|error| error.phase)
    }

    pub fn is_success(&self) -> bool {
        Phase::ALL
            .iter()
            .all(|phase| matches!(self.outcome(*phase), PhaseOutcome::Completed(_)))
    }
}

pub(crate) fn as_millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
