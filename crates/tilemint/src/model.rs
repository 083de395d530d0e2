use core::fmt;

use crate::{
    Alphabet, DEFAULT_CHARSET, DateCodeTable, Error, PredicateTemplate, Result, SerialCodec,
    SerialPattern, SideTemplate,
};

/// Serial length used when a customer policy does not set one.
pub const DEFAULT_SERIAL_LENGTH: usize = 5;

/// Reference units appended to every batch on top of the productive blocks.
pub const BATCH_OVERHEAD: usize = 4;

/// Which face of a panel a batch is marked on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Side {
    Front,
    Back,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Front => "front",
            Self::Back => "back",
        })
    }
}

/// Where the back side of a two-sided product starts counting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum BackSeed {
    /// From the serial the run started with, like the front side.
    #[default]
    Original,
    /// From the front side's final serial.
    ContinueFront,
}

/// Per-product generation settings.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProductTemplate {
    pub name: String,
    pub customer: String,
    /// 1 or 2.
    pub sides: u8,
    pub block_qty: usize,
    pub panel_qty: usize,
    /// `yy=code` pairs, e.g. `24=AA,25=BB`.
    pub year_code: String,
    /// `MM=code` pairs.
    pub month_code: String,
    /// `dd=code` pairs.
    pub day_code: String,
    pub front: SideTemplate,
    pub back: SideTemplate,
    pub back_seed: BackSeed,
}

impl Default for ProductTemplate {
    fn default() -> Self {
        Self {
            name: String::new(),
            customer: String::new(),
            sides: 1,
            block_qty: 1,
            panel_qty: 0,
            year_code: String::new(),
            month_code: String::new(),
            day_code: String::new(),
            front: SideTemplate::default(),
            back: SideTemplate::default(),
            back_seed: BackSeed::default(),
        }
    }
}

impl ProductTemplate {
    pub fn is_two_sided(&self) -> bool {
        self.sides >= 2
    }

    pub fn side(&self, side: Side) -> &SideTemplate {
        match side {
            Side::Front => &self.front,
            Side::Back => &self.back,
        }
    }

    /// Parses the year, month and day code tables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a malformed table entry.
    pub fn date_codes(&self) -> Result<DateCodeTable> {
        DateCodeTable::parse(&self.year_code, &self.month_code, &self.day_code)
    }

    /// Identifiers per side for a sub-batch: `sub_batch_qty * block_qty`
    /// plus [`BATCH_OVERHEAD`]. A block quantity of 0 counts as 1.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `sub_batch_qty` is 0 or the count does
    /// not fit in `usize`.
    pub fn iteration_count(&self, sub_batch_qty: usize) -> Result<usize> {
        if sub_batch_qty == 0 {
            return Err(Error::config("sub-batch quantity must be greater than 0"));
        }
        sub_batch_qty
            .checked_mul(self.block_qty.max(1))
            .and_then(|n| n.checked_add(BATCH_OVERHEAD))
            .ok_or_else(|| {
                Error::config(format!(
                    "sub-batch quantity {sub_batch_qty} x block quantity {} overflows",
                    self.block_qty
                ))
            })
    }

    /// Checks the side count and field lists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.sides, 1 | 2) {
            return Err(Error::config(format!(
                "product `{}` has {} sides, expected 1 or 2",
                self.name, self.sides
            )));
        }
        self.front.validate()?;
        if self.is_two_sided() {
            self.back.validate()?;
        }
        Ok(())
    }
}

/// Per-customer serial encoding policy.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CustomerPolicy {
    pub customer: String,
    pub serial_length: usize,
    pub charset: String,
    /// Comma-separated characters removed from `charset`.
    pub exclude: String,
    /// `""`, `A00`, `AA-00` or `A000`.
    pub pattern: String,
    /// Select template for the last-issued lookup.
    pub select_last_serial: String,
}

impl Default for CustomerPolicy {
    fn default() -> Self {
        Self {
            customer: String::new(),
            serial_length: DEFAULT_SERIAL_LENGTH,
            charset: DEFAULT_CHARSET.to_owned(),
            exclude: String::new(),
            pattern: String::new(),
            select_last_serial: String::new(),
        }
    }
}

impl CustomerPolicy {
    /// # Errors
    ///
    /// See [`Alphabet::new`].
    pub fn alphabet(&self) -> Result<Alphabet> {
        let base = if self.charset.is_empty() {
            DEFAULT_CHARSET
        } else {
            &self.charset
        };
        Alphabet::new(base, &self.exclude)
    }

    /// Unknown pattern names fall back to plain serials.
    pub fn pattern(&self) -> SerialPattern {
        SerialPattern::from_policy_name(&self.pattern)
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero serial length or an invalid
    /// alphabet.
    pub fn codec(&self) -> Result<SerialCodec> {
        if self.serial_length == 0 {
            return Err(Error::config(format!(
                "customer `{}` has a zero serial length",
                self.customer
            )));
        }
        Ok(SerialCodec::new(self.pattern(), self.alphabet()?))
    }

    pub fn select_template(&self) -> PredicateTemplate {
        PredicateTemplate::parse(&self.select_last_serial)
    }
}

/// Identifies a product template: product, version and step code.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProductKey {
    pub product: String,
    pub version: String,
    pub step: String,
}

impl ProductKey {
    pub fn new(
        product: impl Into<String>,
        version: impl Into<String>,
        step: impl Into<String>,
    ) -> Self {
        Self {
            product: product.into(),
            version: version.into(),
            step: step.into(),
        }
    }
}

/// `product-version-step`, skipping empty parts.
impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for part in [&self.product, &self.version, &self.step] {
            if !part.is_empty() {
                write!(f, "{sep}{part}")?;
                sep = "-";
            }
        }
        Ok(())
    }
}

/// What a run locks. Runs whose scopes share history must not overlap.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeKey {
    pub customer: String,
    pub product: ProductKey,
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.customer, self.product)
    }
}

/// One allocation request.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenerationRequest {
    pub customer: String,
    pub product: String,
    pub version: String,
    pub step: String,
    pub lot_number: String,
    pub sub_batch_qty: usize,
    /// Selects the configuration and record store; not used by generation.
    #[cfg_attr(feature = "serde", serde(default))]
    pub environment: String,
}

impl GenerationRequest {
    pub fn product_key(&self) -> ProductKey {
        ProductKey::new(&*self.product, &*self.version, &*self.step)
    }

    pub fn scope(&self) -> ScopeKey {
        ScopeKey {
            customer: self.customer.clone(),
            product: self.product_key(),
        }
    }
}

/// One generated unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeneratedIdentifier {
    /// The first tile field; unique within a batch.
    pub primary: String,
    pub tile_fields: Vec<String>,
    pub cell_fields: Vec<String>,
    /// `yyMMdd`.
    pub mark_date: String,
    /// `HHmmss`.
    pub mark_time: String,
}

impl GeneratedIdentifier {
    /// Tile field `n`, counting from 1; empty when absent.
    pub fn tile_field(&self, n: usize) -> &str {
        n.checked_sub(1)
            .and_then(|i| self.tile_fields.get(i))
            .map_or("", String::as_str)
    }

    /// Whether any tile field equals `value`.
    pub fn holds(&self, value: &str) -> bool {
        self.tile_fields.iter().any(|f| f == value)
    }
}

/// The identifier recorded as a lot's end: the last non-empty second tile
/// field of the batch, otherwise the last primary identifier.
pub fn terminal_identifier(batch: &[GeneratedIdentifier]) -> Option<&str> {
    batch
        .iter()
        .rev()
        .map(|id| id.tile_field(2))
        .find(|f| !f.is_empty())
        .or_else(|| batch.last().map(|id| id.primary.as_str()))
}

/// A persisted lot (table) and the product name its summary carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LotTable {
    pub name: String,
    pub product_name: String,
}

/// Tables a side's batch is written to.
///
/// Split steps write the batch twice, as the `C` and `D` halves. Back side
/// tables are prefixed with `B`.
pub fn lot_tables(product: &str, lot: &str, side: Side, split: bool) -> Vec<LotTable> {
    let (lot_prefix, product_suffix) = match side {
        Side::Front => ("", "TOP"),
        Side::Back => ("B", "BACK"),
    };
    let table = |half: &str| LotTable {
        name: format!("{lot_prefix}{half}{lot}"),
        product_name: if half.is_empty() {
            format!("{product}-{product_suffix}")
        } else {
            format!("{product}-{product_suffix}-{half}")
        },
    };
    if split {
        vec![table("C"), table("D")]
    } else {
        vec![table("")]
    }
}

/// The summary row written once per lot table.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LotSummary {
    pub lot: String,
    pub customer: String,
    pub product_name: String,
    pub side: Side,
    /// Primary identifier of the first unit.
    pub first: String,
    /// See [`terminal_identifier`].
    pub terminal: String,
    /// The serial to continue from.
    pub final_serial: String,
    pub count: usize,
    /// `yyMMddWW`.
    pub created_date: String,
    /// `HH:mm:ss`.
    pub created_time: String,
}

/// The newest historical lot matching a lookup predicate.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LastIssued {
    pub lot: String,
    pub terminal: String,
    /// `None` or empty when the record never stored a serial.
    pub serial: Option<String>,
}

impl LastIssued {
    /// The recorded serial, if one is present.
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref().filter(|s| !s.is_empty())
    }

    /// A terminal identifier without a serial means the record was written
    /// incompletely; continuing from it could reissue identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InconsistentState`] in that case.
    pub fn check_consistent(&self) -> Result<()> {
        if !self.terminal.is_empty() && self.serial().is_none() {
            return Err(Error::InconsistentState {
                lot: self.lot.clone(),
                terminal: self.terminal.clone(),
            });
        }
        Ok(())
    }
}
