//! Classifier working state behind an injectable interface
//!
//! The classifier only ever talks to [`SignalStore`]. [`MemoryStore`] holds
//! the state in memory and journals every mutation as a [`StoreChange`] so
//! the pipeline can persist each record's changes, in order, before the next
//! record is classified.

mod memory;
mod observed;

pub use memory::MemoryStore;
pub use observed::{KeyInsertion, ObservedKeySet, ProductKey};

use bvi_common::{AliasEntry, CompanyId, CompanyIdentity, FilingId, ReplayPosition};
use chrono::NaiveDate;

use crate::classifier::ClassifiedFiling;
use crate::error::ClassifyResult;

/// Alias registry, company directory and observed keys
pub trait SignalStore {
    /// Identity bound to this exact raw name
    fn lookup_alias(&self, raw_name: &str) -> Option<CompanyId>;

    /// Identity bound to any alias with this normalized form
    fn lookup_normalized(&self, normalized: &str) -> Option<CompanyId>;

    /// Bind a raw name. Re-binding to the same identity is a no-op; binding
    /// to a different identity fails with `AliasConflict`.
    fn bind_alias(&mut self, entry: AliasEntry) -> ClassifyResult<()>;

    fn company(&self, id: &CompanyId) -> Option<&CompanyIdentity>;

    /// All identities in creation order
    fn companies(&self) -> Box<dyn Iterator<Item = &CompanyIdentity> + '_>;

    fn create_company(&mut self, identity: CompanyIdentity) -> ClassifyResult<()>;

    /// Record a display-only "also operates as" name
    fn add_dba(&mut self, id: CompanyId, dba_name: &str) -> ClassifyResult<()>;

    fn observed_keys(&self) -> &ObservedKeySet;

    /// Idempotently insert the company, brand and product keys
    fn observe(&mut self, key: &ProductKey, first_seen: NaiveDate) -> KeyInsertion;

    /// Position of the last classified record
    fn high_water_mark(&self) -> Option<&ReplayPosition>;

    fn classified(&self, ttb_id: &FilingId) -> Option<&ClassifiedFiling>;

    /// Store a classification and advance the high-water mark
    fn record_classification(&mut self, filing: ClassifiedFiling);
}

/// One journaled store mutation
#[derive(Debug, Clone, PartialEq)]
pub enum StoreChange {
    CompanyCreated(CompanyIdentity),
    DbaAdded {
        company_id: CompanyId,
        dba_name: String,
    },
    AliasBound(AliasEntry),
    CompanyObserved {
        company_id: CompanyId,
        first_seen: NaiveDate,
    },
    BrandObserved {
        company_id: CompanyId,
        brand: String,
        first_seen: NaiveDate,
    },
    ProductObserved {
        key: ProductKey,
        first_seen: NaiveDate,
    },
    Classified(ClassifiedFiling),
}
