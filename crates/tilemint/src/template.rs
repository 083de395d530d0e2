use core::fmt;

use crate::{Error, ResolveContext, Result, SerialState, Token};

/// Maximum number of tile fields, and of cell fields, on one side.
pub const MAX_FIELDS: usize = 5;

/// A comma-separated sequence of tokens whose resolved values are
/// concatenated into one field value.
///
/// Tokens are not trimmed: `"TXT=A, SN1"` holds the passthrough token
/// `" SN1"`.
#[derive(Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "String", into = "String")
)]
pub struct FieldTemplate(String);

impl FieldTemplate {
    pub fn new(src: impl Into<String>) -> Self {
        Self(src.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tokens(&self) -> impl Iterator<Item = Token<'_>> {
        self.0.split(',').map(Token::parse)
    }

    /// Resolves every token in order and concatenates the results.
    ///
    /// # Errors
    ///
    /// Propagates serial codec failures from `SN`/`SN1` tokens.
    pub fn expand(
        &self,
        ctx: &ResolveContext<'_>,
        mut state: SerialState,
    ) -> Result<(String, SerialState)> {
        let mut out = String::new();
        for token in self.tokens() {
            let (value, next) = token.resolve(ctx, state)?;
            out.push_str(&value);
            state = next;
        }
        Ok((out, state))
    }

    /// The resolved leading tokens before the first serial token. Scopes the
    /// last-issued lookup to identifiers of the same template family.
    pub fn prefix(&self, ctx: &ResolveContext<'_>) -> String {
        self.tokens()
            .map_while(|token| token.resolve_static(ctx))
            .collect()
    }
}

impl fmt::Debug for FieldTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldTemplate({:?})", self.0)
    }
}

impl From<String> for FieldTemplate {
    fn from(src: String) -> Self {
        Self(src)
    }
}

impl From<&str> for FieldTemplate {
    fn from(src: &str) -> Self {
        Self(src.to_owned())
    }
}

impl From<FieldTemplate> for String {
    fn from(template: FieldTemplate) -> Self {
        template.0
    }
}

/// The tile and cell field templates of one side of a product.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SideTemplate {
    #[cfg_attr(feature = "serde", serde(default))]
    pub tile_fields: Vec<FieldTemplate>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub cell_fields: Vec<FieldTemplate>,
}

/// The field values produced by one expansion of a [`SideTemplate`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Expansion {
    /// Non-empty tile field templates, expanded in order. The first value is
    /// the primary identifier.
    pub tile: Vec<String>,
    pub cell: Vec<String>,
}

impl Expansion {
    /// The primary identifier: the first expanded tile field.
    pub fn primary(&self) -> &str {
        self.tile.first().map_or("", String::as_str)
    }
}

impl SideTemplate {
    /// Builds a side template, rejecting more than [`MAX_FIELDS`] tile or
    /// cell fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a field list is too long.
    pub fn new<T, C>(tile_fields: T, cell_fields: C) -> Result<Self>
    where
        T: IntoIterator,
        T::Item: Into<FieldTemplate>,
        C: IntoIterator,
        C::Item: Into<FieldTemplate>,
    {
        let side = Self {
            tile_fields: tile_fields.into_iter().map(Into::into).collect(),
            cell_fields: cell_fields.into_iter().map(Into::into).collect(),
        };
        side.validate()?;
        Ok(side)
    }

    /// Checks the field counts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either list exceeds [`MAX_FIELDS`].
    pub fn validate(&self) -> Result<()> {
        if self.tile_fields.len() > MAX_FIELDS || self.cell_fields.len() > MAX_FIELDS {
            return Err(Error::config(format!(
                "a side holds at most {MAX_FIELDS} tile and {MAX_FIELDS} cell fields, got {} and {}",
                self.tile_fields.len(),
                self.cell_fields.len()
            )));
        }
        Ok(())
    }

    /// The template producing the primary identifier.
    pub fn primary_field(&self) -> Option<&FieldTemplate> {
        self.tile_fields.iter().find(|f| !f.is_empty())
    }

    /// Expands tile fields, then cell fields, skipping empty templates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no tile field is configured, and
    /// propagates serial codec failures.
    pub fn expand(
        &self,
        ctx: &ResolveContext<'_>,
        state: SerialState,
    ) -> Result<(Expansion, SerialState)> {
        if self.primary_field().is_none() {
            return Err(Error::config("side template has no tile field"));
        }
        let (tile, state) = expand_fields(&self.tile_fields, ctx, state)?;
        let (cell, state) = expand_fields(&self.cell_fields, ctx, state)?;
        Ok((Expansion { tile, cell }, state))
    }
}

fn expand_fields(
    fields: &[FieldTemplate],
    ctx: &ResolveContext<'_>,
    mut state: SerialState,
) -> Result<(Vec<String>, SerialState)> {
    let mut values = Vec::with_capacity(fields.len());
    for field in fields.iter().filter(|f| !f.is_empty()) {
        let (value, next) = field.expand(ctx, state)?;
        values.push(value);
        state = next;
    }
    Ok((values, state))
}
