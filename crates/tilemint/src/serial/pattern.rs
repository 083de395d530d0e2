use core::{fmt, str::FromStr};

use crate::{Alphabet, Error, Result};

/// The carry scheme a customer's serials follow.
///
/// Each variant owns its own carry propagation rule. The set is closed: a
/// policy naming an unknown pattern only becomes [`SerialPattern::Plain`]
/// through the explicit [`SerialPattern::from_policy_name`] path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SerialPattern {
    /// Every position is an alphabet digit; the serial keeps its length.
    #[default]
    Plain,
    /// `[letter][alnum][0-9]`.
    A00,
    /// `[letter][letter]-[01-98]`.
    AaDash00,
    /// `[letter][001-999]`.
    A000,
}

impl SerialPattern {
    /// Canonical policy name of the pattern.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Plain => "",
            Self::A00 => "A00",
            Self::AaDash00 => "AA-00",
            Self::A000 => "A000",
        }
    }

    /// Maps a customer policy's pattern name to a pattern.
    ///
    /// Empty and unrecognized names select [`SerialPattern::Plain`]; the
    /// latter is logged as a warning so misspelled policies are visible.
    pub fn from_policy_name(name: &str) -> Self {
        match name.parse() {
            Ok(pattern) => pattern,
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(pattern = name, "unknown serial pattern, using plain");
                Self::Plain
            }
        }
    }

    /// The serial a customer starts from when no history exists.
    ///
    /// Plain serials are `length` zeroes, or the alphabet's first character
    /// when `0` is excluded. Fixed-shape patterns start at their lowest value
    /// with the alphabet's first character in every letter position.
    pub fn seed(self, alphabet: &Alphabet, length: usize) -> String {
        let first = alphabet.first();
        match self {
            Self::Plain => {
                let zero = if alphabet.contains('0') { '0' } else { first };
                core::iter::repeat_n(zero, length).collect()
            }
            Self::A00 => format!("{first}00"),
            Self::AaDash00 => format!("{first}{first}-00"),
            Self::A000 => format!("{first}000"),
        }
    }

    /// Computes the successor of `serial`.
    pub(crate) fn advance(self, serial: &str, alphabet: &Alphabet) -> Result<String> {
        match self {
            Self::Plain => advance_plain(serial, alphabet),
            Self::A00 => advance_a00(serial, alphabet),
            Self::AaDash00 => advance_aa_dash_00(serial, alphabet),
            Self::A000 => advance_a000(serial, alphabet),
        }
    }

    fn overflow(self, serial: &str) -> Error {
        Error::Overflow {
            serial: serial.to_owned(),
            pattern: self,
        }
    }
}

impl FromStr for SerialPattern {
    type Err = Error;

    /// Strict parse: only the four canonical names (and the `AA00` alias)
    /// are accepted.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => Ok(Self::Plain),
            "A00" => Ok(Self::A00),
            "AA-00" | "AA00" => Ok(Self::AaDash00),
            "A000" => Ok(Self::A000),
            other => Err(Error::config(format!("unknown serial pattern `{other}`"))),
        }
    }
}

impl fmt::Display for SerialPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => f.write_str("plain"),
            other => f.write_str(other.name()),
        }
    }
}

/// Position of `c` in `alphabet`, or a config error naming the serial.
fn digit(alphabet: &Alphabet, c: char, serial: &str) -> Result<usize> {
    alphabet.position(c).ok_or_else(|| {
        Error::config(format!(
            "serial `{serial}` uses `{c}` which is not in alphabet `{alphabet}`"
        ))
    })
}

/// Successor of `c`, `None` when `c` is the alphabet's last character.
fn bump(alphabet: &Alphabet, c: char, serial: &str) -> Result<Option<char>> {
    let i = digit(alphabet, c, serial)?;
    Ok(alphabet.get(i + 1))
}

fn malformed(serial: &str, pattern: SerialPattern) -> Error {
    Error::config(format!(
        "serial `{serial}` does not match pattern `{pattern}`"
    ))
}

fn advance_plain(serial: &str, alphabet: &Alphabet) -> Result<String> {
    let mut chars: Vec<char> = serial.chars().collect();
    for slot in chars.iter_mut().rev() {
        match bump(alphabet, *slot, serial)? {
            Some(next) => {
                *slot = next;
                return Ok(chars.into_iter().collect());
            }
            None => *slot = alphabet.first(),
        }
    }
    // carry ran past the leftmost position (or there was nothing to bump)
    Err(SerialPattern::Plain.overflow(serial))
}

fn advance_a00(serial: &str, alphabet: &Alphabet) -> Result<String> {
    let pattern = SerialPattern::A00;
    let chars: Vec<char> = serial.chars().collect();
    let [mut lead, mut middle, last] = chars[..] else {
        return Err(malformed(serial, pattern));
    };
    let Some(mut number) = last.to_digit(10) else {
        return Err(malformed(serial, pattern));
    };

    number += 1;
    if number > 9 {
        number = 0;
        if middle.is_ascii_digit() {
            lead = bump(alphabet, lead, serial)?.ok_or_else(|| pattern.overflow(serial))?;
        } else if let Some(next) = bump(alphabet, middle, serial)? {
            middle = next;
        } else {
            middle = alphabet.first();
            lead = bump(alphabet, lead, serial)?.ok_or_else(|| pattern.overflow(serial))?;
        }
    }
    Ok(format!("{lead}{middle}{number}"))
}

fn advance_aa_dash_00(serial: &str, alphabet: &Alphabet) -> Result<String> {
    let pattern = SerialPattern::AaDash00;
    let chars: Vec<char> = serial.chars().collect();
    let [mut lead, mut second, '-', tens, ones] = chars[..] else {
        return Err(malformed(serial, pattern));
    };
    let (Some(tens), Some(ones)) = (tens.to_digit(10), ones.to_digit(10)) else {
        return Err(malformed(serial, pattern));
    };

    let mut number = tens * 10 + ones + 1;
    if number > 98 {
        number = 1;
        if let Some(next) = bump(alphabet, second, serial)? {
            second = next;
        } else {
            second = alphabet.first();
            lead = bump(alphabet, lead, serial)?.ok_or_else(|| pattern.overflow(serial))?;
        }
    }
    Ok(format!("{lead}{second}-{number:02}"))
}

fn advance_a000(serial: &str, alphabet: &Alphabet) -> Result<String> {
    let pattern = SerialPattern::A000;
    let mut chars = serial.chars();
    let Some(mut lead) = chars.next() else {
        return Err(malformed(serial, pattern));
    };
    let rest = chars.as_str();
    if rest.len() != 3 || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(serial, pattern));
    }
    let mut number: u32 = rest.parse().map_err(|_| malformed(serial, pattern))?;

    number += 1;
    if number > 999 {
        number = 1;
        lead = bump(alphabet, lead, serial)?.ok_or_else(|| pattern.overflow(serial))?;
    }
    Ok(format!("{lead}{number:03}"))
}
