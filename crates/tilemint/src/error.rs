use crate::SerialPattern;

/// A result type defaulting to the crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors that `tilemint` can produce.
///
/// Every variant is fatal to the current allocation run. The only variant a
/// caller may retry is [`Error::Conflict`], which signals that another run
/// holds an overlapping scope.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A product template or customer policy is missing or invalid.
    #[error("config error: {reason}")]
    Config {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The serial has no successor under its pattern and alphabet.
    #[error("serial `{serial}` exceeds the range of pattern `{pattern}`")]
    Overflow {
        /// The serial that could not be advanced.
        serial: String,
        /// The pattern that was applied.
        pattern: SerialPattern,
    },

    /// An identifier collides with one in the same batch (`lot` is `None`)
    /// or with one already issued in a historical lot.
    #[error("duplicate identifier `{value}` in {}", .lot.as_deref().unwrap_or("current batch"))]
    Duplicate {
        /// The colliding identifier.
        value: String,
        /// The historical lot holding the identifier, if any.
        lot: Option<String>,
    },

    /// A historical record carries a terminal identifier but no serial.
    #[error("lot `{lot}` records terminal identifier `{terminal}` without a serial")]
    InconsistentState {
        /// The lot the record belongs to.
        lot: String,
        /// The terminal identifier found on the record.
        terminal: String,
    },

    /// A collaborator failed while resolving the last serial or duplicates.
    #[error("lookup failed: {reason}")]
    Lookup {
        /// Collaborator failure description.
        reason: String,
    },

    /// A collaborator failed while persisting a batch or summary.
    #[error("persist failed: {reason}")]
    Persist {
        /// Collaborator failure description.
        reason: String,
    },

    /// Another run holds the transactional scope.
    #[error("concurrent writer holds scope `{scope}`")]
    Conflict {
        /// Display form of the contended scope.
        scope: String,
    },
}

/// Discriminant of [`Error`] for callers that only need the category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Overflow,
    Duplicate,
    InconsistentState,
    Lookup,
    Persist,
    Conflict,
}

impl Error {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Returns the category of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Config,
            Self::Overflow { .. } => ErrorKind::Overflow,
            Self::Duplicate { .. } => ErrorKind::Duplicate,
            Self::InconsistentState { .. } => ErrorKind::InconsistentState,
            Self::Lookup { .. } => ErrorKind::Lookup,
            Self::Persist { .. } => ErrorKind::Persist,
            Self::Conflict { .. } => ErrorKind::Conflict,
        }
    }

    /// Whether the failed run may be attempted again unchanged.
    ///
    /// Only a transaction abort caused by a concurrent writer qualifies.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_display_names_the_lot() {
        let batch = Error::Duplicate {
            value: "AB001".into(),
            lot: None,
        };
        assert_eq!(
            batch.to_string(),
            "duplicate identifier `AB001` in current batch"
        );

        let historical = Error::Duplicate {
            value: "AB001".into(),
            lot: Some("WB2025".into()),
        };
        assert_eq!(
            historical.to_string(),
            "duplicate identifier `AB001` in WB2025"
        );
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(
            Error::Conflict {
                scope: "C1/P1".into()
            }
            .is_retryable()
        );
        assert!(!Error::config("missing").is_retryable());
        assert_eq!(
            Error::Persist {
                reason: "disk".into()
            }
            .kind(),
            ErrorKind::Persist
        );
    }
}
