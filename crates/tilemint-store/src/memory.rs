//! A [`RecordStore`] over in-process [`Records`], optionally mirrored to a
//! [`JsonFile`].
//!
//! Each transaction claims its scope's customer for its whole lifetime, since
//! the last-issued lookup and the history check both read the customer's
//! whole history. A second `begin` for a claimed customer fails with
//! [`Error::Conflict`] instead of blocking, leaving the retry decision to the
//! caller. Writes are staged in the transaction and only become visible on
//! commit; reads see committed records only.
//!
//! A file-backed store also holds the file's exclusive lock from `begin` until
//! the transaction ends, and reloads the file under it. Only one transaction
//! at a time, across all processes and stores sharing the file, can write.

use std::collections::HashSet;
use std::path::PathBuf;

use parking_lot::Mutex;
use tilemint::store::{RecordStore, Transaction};
use tilemint::{
    Error, GeneratedIdentifier, LastIssued, LookupPredicate, LotSummary, Result, ScopeKey,
};

use crate::{FileLock, JsonFile, Records};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Records>,
    /// Customers with an open transaction.
    claims: Mutex<HashSet<String>>,
    sink: Option<JsonFile>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from existing `records`.
    pub fn with_records(records: Records) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    /// Loads `path` (empty if it does not exist) and rewrites it on every
    /// commit. Each transaction reloads it first.
    pub fn open(path: impl Into<PathBuf>) -> crate::Result<Self> {
        let sink = JsonFile::new(path);
        let records = sink.load()?;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            path = %sink.path().display(),
            lots = records.lots.len(),
            "opened record file"
        );
        Ok(Self {
            records: Mutex::new(records),
            claims: Mutex::default(),
            sink: Some(sink),
        })
    }

    /// A copy of the committed records.
    pub fn snapshot(&self) -> Records {
        self.records.lock().clone()
    }

    fn claim(&self, scope: &ScopeKey) -> Result<()> {
        if !self.claims.lock().insert(scope.customer.clone()) {
            #[cfg(feature = "tracing")]
            tracing::debug!(%scope, "customer already claimed");
            return Err(conflict(scope));
        }
        Ok(())
    }

    fn release(&self, scope: &ScopeKey) {
        self.claims.lock().remove(&scope.customer);
    }

    /// Locks the file and replaces the in-process records with its contents.
    fn lock_and_reload(&self, sink: &JsonFile, scope: &ScopeKey) -> Result<FileLock> {
        let Some(lock) = sink.try_lock()? else {
            #[cfg(feature = "tracing")]
            tracing::debug!(%scope, path = %sink.path().display(), "record file locked");
            return Err(conflict(scope));
        };
        *self.records.lock() = sink.load()?;
        Ok(lock)
    }

    fn apply(&self, staged: Records) -> crate::Result<()> {
        let mut records = self.records.lock();
        match &self.sink {
            Some(sink) => {
                let mut next = records.clone();
                next.merge(staged);
                sink.write(&next)?;
                *records = next;
            }
            None => records.merge(staged),
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    type Txn<'a>
        = MemoryTxn<'a>
    where
        Self: 'a;

    fn begin(&self, scope: &ScopeKey) -> Result<MemoryTxn<'_>> {
        self.claim(scope)?;
        let lock = match &self.sink {
            Some(sink) => match self.lock_and_reload(sink, scope) {
                Ok(lock) => Some(lock),
                Err(e) => {
                    self.release(scope);
                    return Err(e);
                }
            },
            None => None,
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(%scope, "transaction started");
        Ok(MemoryTxn {
            store: self,
            scope: scope.clone(),
            staged: Records::default(),
            _lock: lock,
        })
    }
}

fn conflict(scope: &ScopeKey) -> Error {
    Error::Conflict {
        scope: scope.to_string(),
    }
}

/// A transaction on a [`MemoryStore`]. Dropping it releases the customer
/// and the file lock, and discards staged writes.
#[derive(Debug)]
pub struct MemoryTxn<'a> {
    store: &'a MemoryStore,
    scope: ScopeKey,
    staged: Records,
    _lock: Option<FileLock>,
}

impl MemoryTxn<'_> {
    pub fn scope(&self) -> &ScopeKey {
        &self.scope
    }
}

impl Transaction for MemoryTxn<'_> {
    fn find_last_issued(&mut self, predicate: &LookupPredicate) -> Result<Option<LastIssued>> {
        Ok(self
            .store
            .records
            .lock()
            .find_last_issued(&self.scope.customer, predicate))
    }

    fn check_historical_duplicate(
        &mut self,
        length: usize,
        customer: &str,
        candidate: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .store
            .records
            .lock()
            .historical_duplicate(length, customer, candidate))
    }

    fn persist_batch(&mut self, lot: &str, identifiers: &[GeneratedIdentifier]) -> Result<()> {
        self.staged.append_batch(lot, identifiers);
        Ok(())
    }

    fn persist_lot_summary(&mut self, summary: &LotSummary) -> Result<()> {
        self.staged.push_summary(summary.clone());
        Ok(())
    }

    fn commit(mut self) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            scope = %self.scope,
            lots = staged.lots.len(),
            summaries = staged.summaries.len(),
            "committing"
        );
        Ok(self.store.apply(staged)?)
    }
}

impl Drop for MemoryTxn<'_> {
    fn drop(&mut self) {
        self.store.release(&self.scope);
    }
}
