use core::fmt;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{Alphabet, Result, SerialPattern};

/// The current serial of a run.
///
/// A run owns exactly one `SerialState` at a time. Incrementing consumes the
/// state and hands back its successor, so the left-to-right, field-to-field
/// ordering of serial consumption is visible in the types.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct SerialState(String);

impl SerialState {
    pub fn new(serial: impl Into<String>) -> Self {
        Self(serial.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for SerialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SerialState({:?})", self.0)
    }
}

impl fmt::Display for SerialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SerialState {
    fn from(serial: String) -> Self {
        Self(serial)
    }
}

/// Encodes serials for one customer: a [`SerialPattern`] applied over an
/// [`Alphabet`].
///
/// # Example
///
/// ```
/// use tilemint::{Alphabet, SerialCodec, SerialPattern, SerialState};
///
/// let alphabet = Alphabet::new("ABCXYZ0123456789", "").unwrap();
/// let codec = SerialCodec::new(SerialPattern::Plain, alphabet);
///
/// let state = codec.next(SerialState::new("A2C9")).unwrap();
/// assert_eq!(state.as_str(), "A2XA");
/// assert_eq!(codec.peek(&state), "A2XA");
/// ```
#[derive(Clone, Debug)]
pub struct SerialCodec {
    pattern: SerialPattern,
    alphabet: Alphabet,
}

impl SerialCodec {
    pub fn new(pattern: SerialPattern, alphabet: Alphabet) -> Self {
        Self { pattern, alphabet }
    }

    pub fn pattern(&self) -> SerialPattern {
        self.pattern
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// The seed serial for a customer with no history.
    pub fn seed(&self, length: usize) -> SerialState {
        SerialState(self.pattern.seed(&self.alphabet, length))
    }

    /// Consumes `state` and returns its successor.
    ///
    /// # Errors
    ///
    /// - [`Error::Overflow`] when the pattern's leading position has no
    ///   successor in the alphabet.
    /// - [`Error::Config`] when the serial does not fit the pattern's shape
    ///   or uses a character outside the alphabet.
    ///
    /// [`Error::Overflow`]: crate::Error::Overflow
    /// [`Error::Config`]: crate::Error::Config
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self), fields(pattern = %self.pattern)))]
    pub fn next(&self, state: SerialState) -> Result<SerialState> {
        self.pattern
            .advance(&state.0, &self.alphabet)
            .map(SerialState)
    }

    /// Reads the current serial without consuming it.
    pub fn peek<'s>(&self, state: &'s SerialState) -> &'s str {
        state.as_str()
    }

    /// Resolves a serial token: increments when `increment` is set, otherwise
    /// returns the current value unchanged. Either way the value produced and
    /// the state to continue with are returned together.
    ///
    /// # Errors
    ///
    /// See [`SerialCodec::next`].
    pub fn encode(&self, state: SerialState, increment: bool) -> Result<(String, SerialState)> {
        let state = if increment { self.next(state)? } else { state };
        Ok((state.0.clone(), state))
    }
}
