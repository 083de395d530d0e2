use core::fmt;

use crate::{Error, GeneratedIdentifier, LotSummary, SerialState};

/// Stages of one allocation run, in order. The back side stages only run
/// for two-sided products.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RunState {
    ResolveLastSerial,
    GenerateFront,
    PersistFront,
    GenerateBack,
    PersistBack,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ResolveLastSerial => "resolve-last-serial",
            Self::GenerateFront => "generate-front",
            Self::PersistFront => "persist-front",
            Self::GenerateBack => "generate-back",
            Self::PersistBack => "persist-back",
            Self::Done => "done",
        })
    }
}

/// A run that stopped in `state`.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("run failed during {state}: {error}")]
pub struct RunFailure {
    pub state: RunState,
    #[source]
    pub error: Error,
}

impl RunFailure {
    /// See [`Error::is_retryable`].
    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

/// Everything generated for one side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SideBatch {
    pub identifiers: Vec<GeneratedIdentifier>,
    /// The serial state after the last unit.
    pub final_serial: SerialState,
    /// One per lot table written.
    pub summaries: Vec<LotSummary>,
}

impl SideBatch {
    pub fn first(&self) -> Option<&GeneratedIdentifier> {
        self.identifiers.first()
    }

    pub fn last(&self) -> Option<&GeneratedIdentifier> {
        self.identifiers.last()
    }
}

/// A completed run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOutcome {
    /// The last front side primary identifier.
    pub result: String,
    pub front: SideBatch,
    pub back: Option<SideBatch>,
}
