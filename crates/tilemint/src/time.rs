use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};

/// A trait for sources of the current local date and time.
///
/// Date-code tokens, mark dates and lot summaries all read "now" through this
/// abstraction, so a run can be pinned to a fixed instant in tests and
/// replays.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use tilemint::{DateSource, FixedClock};
///
/// let at = NaiveDate::from_ymd_opt(2025, 3, 7)
///     .unwrap()
///     .and_hms_opt(8, 30, 0)
///     .unwrap();
/// let clock = FixedClock::new(at);
/// assert_eq!(clock.now(), at);
/// ```
pub trait DateSource {
    /// Returns the current local date and time.
    fn now(&self) -> NaiveDateTime;
}

/// The system's local wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalClock;

impl DateSource for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock frozen at one instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedClock(NaiveDateTime);

impl FixedClock {
    pub const fn new(at: NaiveDateTime) -> Self {
        Self(at)
    }
}

impl DateSource for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

impl<T: DateSource + ?Sized> DateSource for &T {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

/// The date fields tokens and predicates substitute, captured once per run so
/// every identifier in a batch sees the same instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateParts {
    at: NaiveDateTime,
}

impl DateParts {
    pub fn capture(source: &impl DateSource) -> Self {
        Self { at: source.now() }
    }

    pub const fn at(at: NaiveDateTime) -> Self {
        Self { at }
    }

    /// Four-digit year.
    pub fn yyyy(&self) -> String {
        format!("{:04}", self.at.year())
    }

    /// Two-digit year.
    pub fn yy(&self) -> String {
        format!("{:02}", self.at.year().rem_euclid(100))
    }

    /// Two-digit month.
    pub fn mm(&self) -> String {
        format!("{:02}", self.at.month())
    }

    /// Two-digit day of month.
    pub fn dd(&self) -> String {
        format!("{:02}", self.at.day())
    }

    /// Two-digit week of year.
    pub fn ww(&self) -> String {
        format!("{:02}", week_of_year(self.at.date()))
    }

    /// `yyMMdd`, the mark date stamped on each identifier.
    pub fn mark_date(&self) -> String {
        format!("{}{}{}", self.yy(), self.mm(), self.dd())
    }

    /// `HHmmss`, the mark time stamped on each identifier.
    pub fn mark_time(&self) -> String {
        format!(
            "{:02}{:02}{:02}",
            self.at.hour(),
            self.at.minute(),
            self.at.second()
        )
    }

    /// `yyMMddWW`, the creation date of a lot summary.
    pub fn summary_date(&self) -> String {
        format!("{}{}", self.mark_date(), self.ww())
    }

    /// `HH:mm:ss`, the creation time of a lot summary.
    pub fn summary_time(&self) -> String {
        format!(
            "{:02}:{:02}:{:02}",
            self.at.hour(),
            self.at.minute(),
            self.at.second()
        )
    }

    pub const fn datetime(&self) -> NaiveDateTime {
        self.at
    }
}

/// Week of year under the first-day rule with Sunday starting the week: the
/// week holding January 1st is week 1 and each Sunday opens a new week.
pub fn week_of_year(date: NaiveDate) -> u32 {
    let ordinal0 = date.ordinal0();
    let weekday = date.weekday().num_days_from_sunday();
    // weekday of January 1st, counted from Sunday
    let jan1 = (weekday + 7 - ordinal0 % 7) % 7;
    (ordinal0 + jan1) / 7 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn week_one_holds_january_first() {
        // 2025-01-01 is a Wednesday
        assert_eq!(week_of_year(date(2025, 1, 1)), 1);
        assert_eq!(week_of_year(date(2025, 1, 4)), 1);
        // the following Sunday starts week 2
        assert_eq!(week_of_year(date(2025, 1, 5)), 2);
    }

    #[test]
    fn week_counts_through_year_end() {
        // 2023-01-01 is a Sunday
        assert_eq!(week_of_year(date(2023, 1, 1)), 1);
        assert_eq!(week_of_year(date(2023, 1, 7)), 1);
        assert_eq!(week_of_year(date(2023, 1, 8)), 2);
        assert_eq!(week_of_year(date(2023, 12, 31)), 53);
        // 2024-12-31 is a Tuesday in the week starting Sunday 12-29
        assert_eq!(week_of_year(date(2024, 12, 31)), 53);
    }

    #[test]
    fn formats_zero_padded_parts() {
        let at = date(2025, 3, 7).and_hms_opt(8, 5, 9).unwrap();
        let parts = DateParts::capture(&FixedClock::new(at));
        assert_eq!(parts.yyyy(), "2025");
        assert_eq!(parts.yy(), "25");
        assert_eq!(parts.mm(), "03");
        assert_eq!(parts.dd(), "07");
        assert_eq!(parts.ww(), "10");
        assert_eq!(parts.mark_date(), "250307");
        assert_eq!(parts.mark_time(), "080509");
        assert_eq!(parts.summary_date(), "25030710");
        assert_eq!(parts.summary_time(), "08:05:09");
    }
}
