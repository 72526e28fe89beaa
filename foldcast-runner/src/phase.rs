//! Run phases — the lifecycle of one backtest, recorded as a trail.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Why a run ended in [`RunPhase::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InsufficientData,
    Leakage,
    InvalidSetup,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Started,
    Splitting,
    Validating,
    FittingFolds,
    Aggregating,
    Completed,
    Failed(FailureKind),
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }

    /// Legal forward transitions. Failure is reachable from any non-terminal phase.
    pub fn can_advance_to(&self, next: RunPhase) -> bool {
        use RunPhase::*;
        match (self, next) {
            (current, Failed(_)) => !current.is_terminal(),
            (Started, Splitting)
            | (Splitting, Validating)
            | (Validating, FittingFolds)
            | (FittingFolds, Aggregating)
            | (Aggregating, Completed) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Splitting => "splitting",
            Self::Validating => "validating",
            Self::FittingFolds => "fitting_folds",
            Self::Aggregating => "aggregating",
            Self::Completed => "completed",
            Self::Failed(_) => "failed",
        }
    }
}

/// Ordered record of the phases a run went through.
#[derive(Debug, Clone)]
pub(crate) struct PhaseTrail {
    entity: String,
    phases: Vec<RunPhase>,
}

impl PhaseTrail {
    pub(crate) fn start(entity: &str) -> Self {
        debug!(entity, phase = RunPhase::Started.as_str(), "run phase");
        Self {
            entity: entity.to_string(),
            phases: vec![RunPhase::Started],
        }
    }

    pub(crate) fn current(&self) -> RunPhase {
        self.phases.last().copied().unwrap_or(RunPhase::Started)
    }

    pub(crate) fn advance(&mut self, next: RunPhase) {
        debug_assert!(
            self.current().can_advance_to(next),
            "illegal phase transition {:?} -> {:?}",
            self.current(),
            next
        );
        debug!(
            entity = %self.entity,
            from = self.current().as_str(),
            phase = next.as_str(),
            "run phase"
        );
        self.phases.push(next);
    }

    pub(crate) fn fail(&mut self, kind: FailureKind) {
        debug!(entity = %self.entity, from = self.current().as_str(), reason = ?kind, "run failed");
        self.phases.push(RunPhase::Failed(kind));
    }

    pub(crate) fn into_phases(self) -> Vec<RunPhase> {
        self.phases
    }
}
