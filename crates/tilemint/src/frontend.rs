use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDateTime};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::store::{RecordStore, Transaction};
use crate::{
    DateParts, DateSource, Error, GeneratedIdentifier, LookupPredicate, LotSummary, ProductKey,
    Result, ScopeKey, SerialPattern, Side,
};

/// Digits of frontend range codes, in value order.
pub const FRONTEND_DIGITS: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Width of a frontend range code.
pub const FRONTEND_CODE_WIDTH: usize = 3;

/// Width the product number is left-padded to in a frontend prefix.
pub const PRODUCT_NO_WIDTH: usize = 15;

const RADIX: u32 = 36;
const MIN_CODE: u32 = 1;
const MAX_CODE: u32 = RADIX * RADIX * RADIX - 1;

/// Returns the `count` codes following `last`.
///
/// Codes are fixed-width base-36 numbers. An empty `last` starts the range
/// at `001`. Lowercase input is accepted.
///
/// # Errors
///
/// - [`Error::Config`] if `last` holds a character outside `0-9A-Z`.
/// - [`Error::Overflow`] if the range would pass `ZZZ`.
///
/// # Example
///
/// ```
/// use tilemint::next_codes;
///
/// assert_eq!(next_codes("", 2).unwrap(), ["001", "002"]);
/// assert_eq!(next_codes("00z", 2).unwrap(), ["010", "011"]);
/// ```
pub fn next_codes(last: &str, count: usize) -> Result<Vec<String>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let last = last.trim();
    let start = if last.is_empty() {
        MIN_CODE
    } else {
        decode(last)?.saturating_add(1)
    };

    let end = u32::try_from(count - 1)
        .ok()
        .and_then(|n| start.checked_add(n))
        .filter(|&end| end <= MAX_CODE)
        .ok_or_else(|| Error::Overflow {
            serial: last.to_owned(),
            pattern: SerialPattern::Plain,
        })?;

    Ok((start..=end).map(encode).collect())
}

fn decode(code: &str) -> Result<u32> {
    code.chars().try_fold(0u32, |acc, c| {
        let digit = c.to_digit(RADIX).ok_or_else(|| {
            Error::config(format!("frontend code `{code}` holds invalid character `{c}`"))
        })?;
        // values past MAX_CODE only need to stay past it
        Ok(acc.saturating_mul(RADIX).saturating_add(digit))
    })
}

fn encode(mut value: u32) -> String {
    let mut digits = [b'0'; FRONTEND_CODE_WIDTH];
    for slot in digits.iter_mut().rev() {
        *slot = FRONTEND_DIGITS.as_bytes()[(value % RADIX) as usize];
        value /= RADIX;
    }
    digits.iter().map(|&b| char::from(b)).collect()
}

/// Machine, year, month and day code tables used to build frontend
/// prefixes. The first entry for a source wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FrontendCodeTables {
    pub machine: BTreeMap<String, String>,
    pub year: BTreeMap<String, String>,
    pub month: BTreeMap<String, String>,
    pub day: BTreeMap<String, String>,
}

impl FrontendCodeTables {
    /// Adds a row. `item` names the table (`MACHINE`, `YEAR`, `MONTH`,
    /// `DAY`, case-insensitive); rows for other items are ignored.
    pub fn insert(&mut self, item: &str, source: &str, transfer: &str) {
        let table = match item.trim().to_ascii_uppercase().as_str() {
            "MACHINE" => &mut self.machine,
            "YEAR" => &mut self.year,
            "MONTH" => &mut self.month,
            "DAY" => &mut self.day,
            _ => return,
        };
        table
            .entry(source.to_owned())
            .or_insert_with(|| transfer.to_owned());
    }
}

/// The fixed head of a frontend identifier: the zero-padded product number
/// followed by the machine and checkout date codes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrontendPrefix(String);

impl FrontendPrefix {
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first code missing from
    /// `tables`.
    pub fn build(
        product_no: &str,
        equipment: &str,
        checkout: NaiveDateTime,
        tables: &FrontendCodeTables,
    ) -> Result<Self> {
        let machine = find(&tables.machine, "machine", &[equipment.to_owned()])?;
        let year = find(&tables.year, "year", &[format!("{:04}", checkout.year())])?;
        let month = find(
            &tables.month,
            "month",
            &[checkout.month().to_string(), format!("{:02}", checkout.month())],
        )?;
        let day = find(
            &tables.day,
            "day",
            &[checkout.day().to_string(), format!("{:02}", checkout.day())],
        )?;
        Ok(Self(format!(
            "{product_no:0>width$}{machine}{year}{month}{day}",
            width = PRODUCT_NO_WIDTH
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

fn find<'a>(table: &'a BTreeMap<String, String>, what: &str, keys: &[String]) -> Result<&'a str> {
    keys.iter()
        .find_map(|key| table.get(key))
        .map(String::as_str)
        .ok_or_else(|| {
            Error::config(format!(
                "no {what} code for {}",
                keys.join(" / ")
            ))
        })
}

/// One frontend marking request: `qty` codes for `lot_number`, under the
/// prefix built from `product_no`, `equipment` and `checkout`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrontendRequest {
    pub lot_number: String,
    pub product_no: String,
    pub equipment: String,
    pub qty: usize,
    pub checkout: NaiveDateTime,
}

impl FrontendRequest {
    /// Frontend history has no customer; every frontend run shares the
    /// blank customer's scope.
    pub fn scope(&self) -> ScopeKey {
        ScopeKey {
            customer: String::new(),
            product: ProductKey::new(&*self.product_no, "", ""),
        }
    }
}

/// What a frontend run issued and persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrontendOutcome {
    pub prefix: FrontendPrefix,
    pub identifiers: Vec<GeneratedIdentifier>,
    pub summary: LotSummary,
}

/// Issues the codes for `request` and persists them.
///
/// Inside one transaction on the request's scope this finds the newest lot
/// whose terminal identifier is the built prefix plus a code, continues the
/// code range after it, appends `prefix + code` units to the lot table and
/// records a summary for the lot.
///
/// # Errors
///
/// - [`Error::Config`] for a blank lot, a zero quantity or a missing code
///   table entry.
/// - [`Error::InconsistentState`] if the newest lot has no final code.
/// - [`Error::Overflow`] if the range would pass `ZZZ`.
/// - Any error from the store, including [`Error::Conflict`] when another
///   run holds the scope.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip_all,
        fields(lot = %request.lot_number, product_no = %request.product_no)
    )
)]
pub fn issue_frontend<S, D>(
    store: &S,
    tables: &FrontendCodeTables,
    request: &FrontendRequest,
    clock: &D,
) -> Result<FrontendOutcome>
where
    S: RecordStore,
    D: DateSource,
{
    if request.lot_number.trim().is_empty() {
        return Err(Error::config("frontend lot number is blank"));
    }
    if request.qty == 0 {
        return Err(Error::config("frontend quantity must be at least 1"));
    }
    let prefix = FrontendPrefix::build(
        &request.product_no,
        &request.equipment,
        request.checkout,
        tables,
    )?;
    let date = DateParts::capture(clock);

    let mut txn = store.begin(&request.scope())?;
    let predicate = LookupPredicate::new(format!(
        "{}{}",
        prefix.as_str(),
        "_".repeat(FRONTEND_CODE_WIDTH)
    ));
    let last = txn.find_last_issued(&predicate)?;
    let last_code = match &last {
        Some(last) => {
            last.check_consistent()?;
            last.serial().unwrap_or_default().to_owned()
        }
        None => String::new(),
    };
    let codes = next_codes(&last_code, request.qty)?;

    let identifiers: Vec<_> = codes
        .iter()
        .map(|code| {
            let id = format!("{}{code}", prefix.as_str());
            GeneratedIdentifier {
                primary: id.clone(),
                tile_fields: vec![id],
                ..Default::default()
            }
        })
        .collect();
    txn.persist_batch(&request.lot_number, &identifiers)?;

    let summary = LotSummary {
        lot: request.lot_number.clone(),
        customer: String::new(),
        product_name: request.product_no.clone(),
        side: Side::Front,
        first: identifiers
            .first()
            .map(|id| id.primary.clone())
            .unwrap_or_default(),
        terminal: identifiers
            .last()
            .map(|id| id.primary.clone())
            .unwrap_or_default(),
        final_serial: codes.last().cloned().unwrap_or_default(),
        count: identifiers.len(),
        created_date: date.mark_date(),
        created_time: date.summary_time(),
    };
    txn.persist_lot_summary(&summary)?;
    txn.commit()?;

    #[cfg(feature = "tracing")]
    tracing::info!(
        prefix = prefix.as_str(),
        after = %last_code,
        first = %summary.first,
        terminal = %summary.terminal,
        "frontend codes issued"
    );
    Ok(FrontendOutcome {
        prefix,
        identifiers,
        summary,
    })
}
