//! Builds the predicate that locates the last identifier issued for a
//! template family.
//!
//! A select template mixes literal text with `{@KEY}` placeholders:
//!
//! - `{@TILEPREFIX}` and `{@KEY.SUBSTRING(start[,len])}` insert all or part of
//!   the tile prefix, the resolved non-serial head of the primary field.
//! - `{@YC}`/`{@MC}`/`{@DC}` (or `YEAR_CODE`/`MONTH_CODE`/`DAY_CODE`) insert
//!   today's custom date code.
//! - Keys containing `yy`, `MM`, `dd` or `WW` have those markers replaced by
//!   today's date.
//! - Any other key is looked up in the date code tables.
//!
//! Rendering never fails. A placeholder that cannot be resolved renders as
//! the empty string so that a partially configured template does not block
//! generation; such substitutions are logged at debug level.

mod segment;

use core::fmt;

pub use segment::Segment;

use crate::{DateCodeTable, DateParts};

/// Select template applied when a customer policy leaves it blank: every
/// identifier sharing the tile prefix.
pub const DEFAULT_SELECT_TEMPLATE: &str = "{@TILEPREFIX}%";

/// A parsed select template.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use tilemint::{DateCodeTable, DateParts, PredicateContext, PredicateTemplate};
///
/// let codes = DateCodeTable::parse("25=K", "", "").unwrap();
/// let date = DateParts::at(
///     NaiveDate::from_ymd_opt(2025, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
/// );
/// let ctx = PredicateContext { prefix: "AB12", date_codes: &codes, date };
///
/// let template = PredicateTemplate::parse("{@TILEPREFIX.SUBSTRING(0,2)}{@YC}%");
/// assert_eq!(template.render(&ctx).as_str(), "ABK%");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PredicateTemplate {
    segments: Vec<Segment>,
}

impl PredicateTemplate {
    /// Parses a select template. A blank template becomes
    /// [`DEFAULT_SELECT_TEMPLATE`].
    pub fn parse(src: &str) -> Self {
        let src = if src.trim().is_empty() {
            DEFAULT_SELECT_TEMPLATE
        } else {
            src
        };
        Self {
            segments: segment::parse(src),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Substitutes every placeholder.
    pub fn render(&self, ctx: &PredicateContext<'_>) -> LookupPredicate {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Prefix => out.push_str(ctx.prefix),
                Segment::Substring { start, len } => {
                    out.extend(ctx.prefix.chars().skip(*start).take(len.unwrap_or(usize::MAX)));
                }
                Segment::DateCode(kind) => out.push_str(&ctx.date_codes.code(*kind, &ctx.date)),
                Segment::DatePattern(key) => out.push_str(&fill_date_markers(key, &ctx.date)),
                Segment::Lookup(key) => match ctx.date_codes.lookup(key) {
                    Some(code) => out.push_str(code),
                    None => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(key = %key, "unresolved placeholder, substituting empty");
                    }
                },
                Segment::Empty => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("malformed placeholder, substituting empty");
                }
            }
        }
        LookupPredicate(out)
    }
}

impl Default for PredicateTemplate {
    fn default() -> Self {
        Self::parse(DEFAULT_SELECT_TEMPLATE)
    }
}

fn fill_date_markers(key: &str, date: &DateParts) -> String {
    key.replace("yyyy", &date.yyyy())
        .replace("yy", &date.yy())
        .replace("MM", &date.mm())
        .replace("dd", &date.dd())
        .replace("WW", &date.ww())
}

/// Inputs to [`PredicateTemplate::render`].
#[derive(Clone, Copy, Debug)]
pub struct PredicateContext<'a> {
    /// Resolved tile prefix of the primary field.
    pub prefix: &'a str,
    pub date_codes: &'a DateCodeTable,
    pub date: DateParts,
}

/// A rendered lookup predicate. Record stores match it against the terminal
/// identifier of historical lots as a SQL `LIKE` pattern (`%` matches any run
/// of characters, `_` exactly one) and return the newest match.
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct LookupPredicate(String);

impl LookupPredicate {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LookupPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LookupPredicate({:?})", self.0)
    }
}

impl fmt::Display for LookupPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
