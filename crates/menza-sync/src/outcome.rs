use std::fmt;

use crate::unit::UnitError;

/// Coarse classification of a failed sync, for reporting at the UI boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Unauthorized,
    Parse,
    Storage,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Parse => write!(f, "parse"),
            Self::Storage => write!(f, "storage"),
        }
    }
}

/// The error carried by [`Outcome::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub kind: FailureKind,
    /// Resource whose unit failed.
    pub resource: String,
    pub message: String,
}

impl SyncFailure {
    pub fn from_unit_error(resource: &str, error: &UnitError) -> Self {
        Self {
            kind: error.kind(),
            resource: resource.to_owned(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error in {}: {}", self.kind, self.resource, self.message)
    }
}

/// Terminal, caller-visible result of a sync attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// At least one unit changed local data and nothing failed.
    Success,
    /// Nothing was written: the validity window was still open or every
    /// fingerprint was unchanged.
    Skipped,
    /// The remote source confirmed the resource does not exist.
    Unavailable,
    Failed(SyncFailure),
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Whether the validity window may be advanced after this outcome.
    pub fn confirms_freshness(&self) -> bool {
        !self.is_failed()
    }

    pub fn failure(&self) -> Option<&SyncFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "updated"),
            Self::Skipped => write!(f, "up to date"),
            Self::Unavailable => write!(f, "not available"),
            Self::Failed(failure) => write!(f, "failed: {failure}"),
        }
    }
}

/// Result of a single unit within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Updated,
    Unchanged,
    Unavailable,
    Failed(SyncFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    pub resource: String,
    pub outcome: UnitOutcome,
}

/// Per-unit results of one orchestrator run, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub units: Vec<UnitReport>,
    pub outcome: Outcome,
    /// True when a batch-fatal error or an unavailable resource stopped the
    /// run before every unit was attempted.
    pub aborted: bool,
}

impl BatchReport {
    pub fn new(units: Vec<UnitReport>, aborted: bool) -> Self {
        let outcome = aggregate(&units);
        Self {
            units,
            outcome,
            aborted,
        }
    }

    pub fn unit(&self, resource: &str) -> Option<&UnitOutcome> {
        self.units
            .iter()
            .find(|u| u.resource == resource)
            .map(|u| &u.outcome)
    }

    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Updated))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Unchanged))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&UnitOutcome) -> bool) -> usize {
        self.units.iter().filter(|u| pred(&u.outcome)).count()
    }
}

/// Merge unit results into one outcome.
///
/// Unavailable wins over everything, then the first failure, then any update.
/// A batch where nothing changed (including an empty one) is skipped.
pub fn aggregate(units: &[UnitReport]) -> Outcome {
    if units
        .iter()
        .any(|u| matches!(u.outcome, UnitOutcome::Unavailable))
    {
        return Outcome::Unavailable;
    }

    if let Some(failure) = units.iter().find_map(|u| match &u.outcome {
        UnitOutcome::Failed(failure) => Some(failure.clone()),
        _ => None,
    }) {
        return Outcome::Failed(failure);
    }

    if units
        .iter()
        .any(|u| matches!(u.outcome, UnitOutcome::Updated))
    {
        Outcome::Success
    } else {
        Outcome::Skipped
    }
}
