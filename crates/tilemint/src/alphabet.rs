use core::fmt;

use crate::{Error, Result};

/// Character set used when a customer policy leaves it blank.
pub const DEFAULT_CHARSET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// The ordered set of characters a customer's serials may use.
///
/// Built from a base character set minus a list of excluded characters. The
/// base ordering is preserved, so the position of a character is its digit
/// value during carry propagation.
///
/// # Example
///
/// ```
/// use tilemint::Alphabet;
///
/// let alphabet = Alphabet::new("ABCDEF", "B, E").unwrap();
/// assert_eq!(alphabet.as_str(), "ACDF");
/// assert_eq!(alphabet.successor('D'), Some('F'));
/// assert_eq!(alphabet.successor('F'), None);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Alphabet {
    chars: Vec<char>,
    text: String,
}

impl Alphabet {
    /// Builds an alphabet from `base` with every character listed in
    /// `exclusions` removed.
    ///
    /// `exclusions` is a comma-separated list of single characters.
    /// Whitespace around entries is ignored and empty entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an exclusion entry is longer than one
    /// character, if the resulting alphabet is empty, or if it contains the
    /// same character twice.
    pub fn new(base: &str, exclusions: &str) -> Result<Self> {
        let mut excluded = Vec::new();
        for entry in exclusions.split(',').map(str::trim) {
            let mut it = entry.chars();
            match (it.next(), it.next()) {
                (None, _) => {}
                (Some(c), None) => excluded.push(c),
                (Some(_), Some(_)) => {
                    return Err(Error::config(format!(
                        "exclusion `{entry}` is not a single character"
                    )));
                }
            }
        }

        let chars: Vec<char> = base.chars().filter(|c| !excluded.contains(c)).collect();
        if chars.is_empty() {
            return Err(Error::config(format!(
                "alphabet `{base}` is empty after excluding `{exclusions}`"
            )));
        }
        for (i, c) in chars.iter().enumerate() {
            if chars[..i].contains(c) {
                return Err(Error::config(format!(
                    "alphabet `{base}` repeats character `{c}`"
                )));
            }
        }

        let text = chars.iter().collect();
        Ok(Self { chars, text })
    }

    /// Number of characters in the alphabet.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Always `false`: construction rejects empty alphabets.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// The lowest-valued character.
    pub fn first(&self) -> char {
        self.chars[0]
    }

    /// Digit value of `c`, if it belongs to the alphabet.
    pub fn position(&self, c: char) -> Option<usize> {
        self.chars.iter().position(|&x| x == c)
    }

    pub fn contains(&self, c: char) -> bool {
        self.chars.contains(&c)
    }

    /// The character following `c`, or `None` if `c` is the last character
    /// or not part of the alphabet.
    pub fn successor(&self, c: char) -> Option<char> {
        self.position(c)
            .and_then(|i| self.chars.get(i + 1))
            .copied()
    }

    /// The character at digit value `index`.
    pub fn get(&self, index: usize) -> Option<char> {
        self.chars.get(index).copied()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        let chars: Vec<char> = DEFAULT_CHARSET.chars().collect();
        Self {
            chars,
            text: DEFAULT_CHARSET.to_owned(),
        }
    }
}

impl fmt::Debug for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Alphabet").field(&self.text).finish()
    }
}

impl fmt::Display for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
