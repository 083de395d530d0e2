use std::collections::BTreeMap;

use crate::{DateParts, Error, Result, SerialCodec, SerialState};

/// Which custom date-code table a lookup goes through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DateCodeKind {
    /// Keyed by the two-digit year.
    Year,
    /// Keyed by the two-digit month.
    Month,
    /// Keyed by the two-digit day of month.
    Day,
}

impl DateCodeKind {
    /// The date value the table is keyed by.
    pub fn key(self, date: &DateParts) -> String {
        match self {
            Self::Year => date.yy(),
            Self::Month => date.mm(),
            Self::Day => date.dd(),
        }
    }
}

/// The year, month and day custom code tables of a product template.
///
/// Each table is written as `key=code` pairs separated by commas, e.g.
/// `24=AA,25=BB`. Whitespace around entries is ignored.
///
/// # Example
///
/// ```
/// use tilemint::{DateCodeKind, DateCodeTable};
///
/// let table = DateCodeTable::parse("24=AA,25=BB", "", "").unwrap();
/// assert_eq!(table.get(DateCodeKind::Year, "25"), Some("BB"));
/// assert_eq!(table.get(DateCodeKind::Month, "03"), None);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DateCodeTable {
    year: BTreeMap<String, String>,
    month: BTreeMap<String, String>,
    day: BTreeMap<String, String>,
}

impl DateCodeTable {
    /// Parses the three code tables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an entry without `=` or with an empty
    /// key.
    pub fn parse(year: &str, month: &str, day: &str) -> Result<Self> {
        Ok(Self {
            year: parse_table(year)?,
            month: parse_table(month)?,
            day: parse_table(day)?,
        })
    }

    pub fn get(&self, kind: DateCodeKind, key: &str) -> Option<&str> {
        let table = match kind {
            DateCodeKind::Year => &self.year,
            DateCodeKind::Month => &self.month,
            DateCodeKind::Day => &self.day,
        };
        table.get(key).map(String::as_str)
    }

    /// The code for today's date, or the unmapped date value when the table
    /// has no entry for it.
    pub fn code(&self, kind: DateCodeKind, date: &DateParts) -> String {
        let key = kind.key(date);
        match self.get(kind, &key) {
            Some(code) => code.to_owned(),
            None => key,
        }
    }

    /// Looks `key` up in the year, month and day tables, in that order.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        [DateCodeKind::Year, DateCodeKind::Month, DateCodeKind::Day]
            .into_iter()
            .find_map(|kind| self.get(kind, key))
    }
}

fn parse_table(src: &str) -> Result<BTreeMap<String, String>> {
    let mut table = BTreeMap::new();
    for entry in src.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((key, code)) = entry.split_once('=') else {
            return Err(Error::config(format!(
                "date code entry `{entry}` is not of the form key=code"
            )));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::config(format!(
                "date code entry `{entry}` has an empty key"
            )));
        }
        table.insert(key.to_owned(), code.trim().to_owned());
    }
    Ok(table)
}

/// One element of a field template.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token<'a> {
    /// `TXT=<text>` or `DWG=<text>`.
    Literal(&'a str),
    /// `LN`: the request's lot number.
    LotNumber,
    /// `LN2`: the lot number without its first `-` segment.
    LotSuffix,
    /// `YC`, `MC`, `DC`.
    DateCode(DateCodeKind),
    /// `YYYY`.
    Year4,
    /// `YY`.
    Year2,
    /// `MM`.
    Month,
    /// `DD`.
    Day,
    /// `WW`.
    Week,
    /// `SN1`, `GSC1`: advances the serial and yields the new value.
    SerialNext,
    /// `SN`, `GSC`: yields the current serial.
    SerialCurrent,
    /// Anything else, emitted verbatim.
    Passthrough(&'a str),
}

impl<'a> Token<'a> {
    /// Classifies a raw token. Literal and lot rules are matched before the
    /// date rules so a date-code table can never shadow `LN` or `LN2`.
    pub fn parse(raw: &'a str) -> Self {
        if let Some(text) = raw
            .strip_prefix("TXT=")
            .or_else(|| raw.strip_prefix("DWG="))
        {
            return Self::Literal(text);
        }
        match raw {
            "LN" => Self::LotNumber,
            "LN2" => Self::LotSuffix,
            "YC" => Self::DateCode(DateCodeKind::Year),
            "MC" => Self::DateCode(DateCodeKind::Month),
            "DC" => Self::DateCode(DateCodeKind::Day),
            "YYYY" => Self::Year4,
            "YY" => Self::Year2,
            "MM" => Self::Month,
            "DD" => Self::Day,
            "WW" => Self::Week,
            "SN1" | "GSC1" => Self::SerialNext,
            "SN" | "GSC" => Self::SerialCurrent,
            other => Self::Passthrough(other),
        }
    }

    pub const fn is_serial(&self) -> bool {
        matches!(self, Self::SerialNext | Self::SerialCurrent)
    }

    /// Resolves a token that does not touch the serial. Returns `None` for
    /// serial tokens.
    pub fn resolve_static(&self, ctx: &ResolveContext<'_>) -> Option<String> {
        let value = match *self {
            Self::Literal(text) | Self::Passthrough(text) => text.to_owned(),
            Self::LotNumber => ctx.lot_number.to_owned(),
            Self::LotSuffix => lot_suffix(ctx.lot_number).to_owned(),
            Self::DateCode(kind) => ctx.date_codes.code(kind, &ctx.date),
            Self::Year4 => ctx.date.yyyy(),
            Self::Year2 => ctx.date.yy(),
            Self::Month => ctx.date.mm(),
            Self::Day => ctx.date.dd(),
            Self::Week => ctx.date.ww(),
            Self::SerialNext | Self::SerialCurrent => return None,
        };
        Some(value)
    }

    /// Resolves the token, threading the serial state through.
    ///
    /// # Errors
    ///
    /// Serial tokens propagate [`SerialCodec::next`] failures.
    pub fn resolve(
        &self,
        ctx: &ResolveContext<'_>,
        state: SerialState,
    ) -> Result<(String, SerialState)> {
        match self {
            Self::SerialNext => ctx.codec.encode(state, true),
            Self::SerialCurrent => ctx.codec.encode(state, false),
            other => {
                let value = other.resolve_static(ctx).unwrap_or_default();
                Ok((value, state))
            }
        }
    }
}

/// Drops the first `-` delimited segment; a lot without `-` is returned
/// unchanged.
fn lot_suffix(lot: &str) -> &str {
    lot.split_once('-').map_or(lot, |(_, rest)| rest)
}

/// Everything a token needs besides the serial state.
#[derive(Clone, Copy, Debug)]
pub struct ResolveContext<'a> {
    pub lot_number: &'a str,
    pub date_codes: &'a DateCodeTable,
    pub date: DateParts,
    pub codec: &'a SerialCodec,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{Alphabet, SerialPattern};

    fn date() -> DateParts {
        DateParts::at(
            NaiveDate::from_ymd_opt(2025, 3, 7)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        )
    }

    fn resolve_all(raw: &str, lot: &str, codes: &DateCodeTable) -> String {
        let codec = SerialCodec::new(SerialPattern::Plain, Alphabet::default());
        let ctx = ResolveContext {
            lot_number: lot,
            date_codes: codes,
            date: date(),
            codec: &codec,
        };
        let (value, _) = Token::parse(raw)
            .resolve(&ctx, SerialState::new("00007"))
            .unwrap();
        value
    }

    #[test]
    fn literals_strip_their_prefix() {
        let codes = DateCodeTable::default();
        assert_eq!(resolve_all("TXT=ABC", "L1", &codes), "ABC");
        assert_eq!(resolve_all("DWG=X-1", "L1", &codes), "X-1");
        assert_eq!(resolve_all("TXT=", "L1", &codes), "");
    }

    #[test]
    fn lot_tokens() {
        let codes = DateCodeTable::default();
        assert_eq!(resolve_all("LN", "A-B-C", &codes), "A-B-C");
        assert_eq!(resolve_all("LN2", "A-B-C", &codes), "B-C");
        assert_eq!(resolve_all("LN2", "ABC", &codes), "ABC");
        assert_eq!(resolve_all("LN2", "A-", &codes), "");
    }

    #[test]
    fn lot_tokens_are_not_shadowed_by_date_codes() {
        let codes = DateCodeTable::parse("LN=XX", "LN2=YY", "").unwrap();
        assert_eq!(resolve_all("LN", "L-9", &codes), "L-9");
        assert_eq!(resolve_all("LN2", "L-9", &codes), "9");
    }

    #[test]
    fn date_tokens() {
        let codes = DateCodeTable::default();
        assert_eq!(resolve_all("YYYY", "", &codes), "2025");
        assert_eq!(resolve_all("YY", "", &codes), "25");
        assert_eq!(resolve_all("MM", "", &codes), "03");
        assert_eq!(resolve_all("DD", "", &codes), "07");
        assert_eq!(resolve_all("WW", "", &codes), "10");
    }

    #[test]
    fn date_codes_map_or_fall_back_to_date_value() {
        let codes = DateCodeTable::parse("24=AA, 25=BB", "03=C", "").unwrap();
        assert_eq!(resolve_all("YC", "", &codes), "BB");
        assert_eq!(resolve_all("MC", "", &codes), "C");
        assert_eq!(resolve_all("DC", "", &codes), "07");
    }

    #[test]
    fn serial_tokens() {
        let codes = DateCodeTable::default();
        assert_eq!(resolve_all("SN", "", &codes), "00007");
        assert_eq!(resolve_all("GSC", "", &codes), "00007");
        assert_eq!(resolve_all("SN1", "", &codes), "00008");
        assert_eq!(resolve_all("GSC1", "", &codes), "00008");
    }

    #[test]
    fn unknown_tokens_pass_through() {
        let codes = DateCodeTable::default();
        assert_eq!(resolve_all("-", "", &codes), "-");
        assert_eq!(resolve_all("sn1", "", &codes), "sn1");
        assert_eq!(resolve_all("", "", &codes), "");
    }

    #[test]
    fn malformed_tables_are_rejected() {
        assert!(DateCodeTable::parse("24AA", "", "").is_err());
        assert!(DateCodeTable::parse("", "=A", "").is_err());
        assert!(DateCodeTable::parse(" , ", "", "").is_ok());
    }

    #[test]
    fn lookup_searches_every_table() {
        let codes = DateCodeTable::parse("24=AA", "07=M7", "07=D7").unwrap();
        assert_eq!(codes.lookup("24"), Some("AA"));
        assert_eq!(codes.lookup("07"), Some("M7"));
        assert_eq!(codes.lookup("99"), None);
    }
}
