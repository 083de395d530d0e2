//! Collaborator traits the orchestrator drives.
//!
//! The engine owns no storage format. Configuration comes from a
//! [`ConfigSource`] and history is read and written through a
//! [`RecordStore`], whose [`Transaction`] spans one run from the last-issued
//! lookup to the final persist.

use crate::{
    CustomerPolicy, GeneratedIdentifier, LastIssued, LookupPredicate, LotSummary, ProductKey,
    ProductTemplate, Result, ScopeKey,
};

/// Supplies product templates, customer policies and split-step codes.
pub trait ConfigSource {
    /// Returns `Ok(None)` when no template is configured for `key`.
    fn load_product_template(&self, key: &ProductKey) -> Result<Option<ProductTemplate>>;

    /// Returns `Ok(None)` when the customer has no policy.
    fn load_customer_policy(&self, customer: &str) -> Result<Option<CustomerPolicy>>;

    /// Whether batches at `step` are written as separate `C` and `D` lots.
    fn is_split_step(&self, step: &str) -> Result<bool>;
}

impl<T: ConfigSource + ?Sized> ConfigSource for &T {
    fn load_product_template(&self, key: &ProductKey) -> Result<Option<ProductTemplate>> {
        (**self).load_product_template(key)
    }

    fn load_customer_policy(&self, customer: &str) -> Result<Option<CustomerPolicy>> {
        (**self).load_customer_policy(customer)
    }

    fn is_split_step(&self, step: &str) -> Result<bool> {
        (**self).is_split_step(step)
    }
}

/// Historical identifier records with an all-or-nothing transaction
/// boundary.
pub trait RecordStore {
    type Txn<'a>: Transaction
    where
        Self: 'a;

    /// Opens a transaction on `scope`. While it is open, no other
    /// transaction may read or write the history its lookups see, which for
    /// the customer-wide lookups below means the scope's whole customer.
    ///
    /// # Errors
    ///
    /// Implementations return [`Error::Conflict`] when another transaction
    /// already holds an overlapping scope.
    ///
    /// [`Error::Conflict`]: crate::Error::Conflict
    fn begin(&self, scope: &ScopeKey) -> Result<Self::Txn<'_>>;
}

impl<T: RecordStore + ?Sized> RecordStore for &T {
    type Txn<'a>
        = T::Txn<'a>
    where
        Self: 'a;

    fn begin(&self, scope: &ScopeKey) -> Result<Self::Txn<'_>> {
        (**self).begin(scope)
    }
}

/// One run's view of the record store. Dropping a transaction without
/// calling [`Transaction::commit`] discards its writes.
pub trait Transaction {
    /// The newest front-side lot of the scope's customer whose terminal
    /// identifier matches `predicate`.
    fn find_last_issued(&mut self, predicate: &LookupPredicate) -> Result<Option<LastIssued>>;

    /// Finds the newest lot of `customer` whose first identifier has
    /// `length` characters and sorts at or before `candidate`, then returns
    /// that lot's name if any of its units carries `candidate` in a tile
    /// field.
    fn check_historical_duplicate(
        &mut self,
        length: usize,
        customer: &str,
        candidate: &str,
    ) -> Result<Option<String>>;

    /// Creates the lot table if needed, then appends `identifiers`.
    fn persist_batch(&mut self, lot: &str, identifiers: &[GeneratedIdentifier]) -> Result<()>;

    fn persist_lot_summary(&mut self, summary: &LotSummary) -> Result<()>;

    fn commit(self) -> Result<()>;
}
