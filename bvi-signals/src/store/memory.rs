//! In-memory [`SignalStore`] with a change journal

use bvi_common::{AliasEntry, CompanyId, CompanyIdentity, FilingId, ReplayPosition};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::warn;

use super::{KeyInsertion, ObservedKeySet, ProductKey, SignalStore, StoreChange};
use crate::classifier::ClassifiedFiling;
use crate::error::{ClassifyError, ClassifyResult};

/// Working state for one classifier run.
///
/// Mutations through the [`SignalStore`] trait are appended to a journal that
/// the pipeline drains with [`MemoryStore::take_changes`]. The `restore_*`
/// methods load persisted state without journaling it.
#[derive(Debug)]
pub struct MemoryStore {
    companies: Vec<CompanyIdentity>,
    company_index: HashMap<CompanyId, usize>,
    aliases: HashMap<String, AliasEntry>,
    alias_order: Vec<String>,
    normalized_index: HashMap<String, CompanyId>,
    keys: ObservedKeySet,
    classified: HashMap<FilingId, ClassifiedFiling>,
    high_water: Option<ReplayPosition>,
    journal: Vec<StoreChange>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store holding only the unknown-filer identity
    pub fn new() -> Self {
        let mut store = Self {
            companies: Vec::new(),
            company_index: HashMap::new(),
            aliases: HashMap::new(),
            alias_order: Vec::new(),
            normalized_index: HashMap::new(),
            keys: ObservedKeySet::new(),
            classified: HashMap::new(),
            high_water: None,
            journal: Vec::new(),
        };
        store.insert_company(CompanyIdentity::unknown_filer());
        store
    }

    /// Drain journaled changes in the order they happened
    pub fn take_changes(&mut self) -> Vec<StoreChange> {
        std::mem::take(&mut self.journal)
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.journal.is_empty()
    }

    /// Bound aliases in binding order
    pub fn aliases(&self) -> impl Iterator<Item = &AliasEntry> + '_ {
        self.alias_order.iter().filter_map(|raw| self.aliases.get(raw))
    }

    pub fn alias_count(&self) -> usize {
        self.alias_order.len()
    }

    pub fn classified_count(&self) -> usize {
        self.classified.len()
    }

    pub fn restore_company(&mut self, identity: CompanyIdentity) {
        if let Some(&idx) = self.company_index.get(&identity.id) {
            // The seeded unknown filer may carry an edited display name on disk
            self.companies[idx] = identity;
            return;
        }
        self.insert_company(identity);
    }

    pub fn restore_alias(&mut self, entry: AliasEntry) {
        if let Some(existing) = self.aliases.get(&entry.raw_name) {
            if existing.company_id != entry.company_id {
                warn!(
                    raw_name = %entry.raw_name,
                    "Persisted alias bound twice, keeping first binding"
                );
            }
            return;
        }
        self.insert_alias(entry);
    }

    pub fn restore_dba(&mut self, company_id: CompanyId, dba_name: &str) {
        if let Some(&idx) = self.company_index.get(&company_id) {
            let company = &mut self.companies[idx];
            if !company.dba_names.iter().any(|d| d == dba_name) {
                company.dba_names.push(dba_name.to_string());
            }
        }
    }

    pub fn restore_observed_company(&mut self, company_id: CompanyId, first_seen: NaiveDate) {
        self.keys.insert_company(company_id, first_seen);
    }

    pub fn restore_observed_brand(&mut self, company_id: CompanyId, brand: &str, first_seen: NaiveDate) {
        self.keys.insert_brand(company_id, brand, first_seen);
    }

    pub fn restore_observed_product(&mut self, key: ProductKey, first_seen: NaiveDate) {
        self.keys.insert_product(key, first_seen);
    }

    pub fn restore_classification(&mut self, filing: ClassifiedFiling) {
        self.advance_high_water(&filing.position);
        self.classified.insert(filing.position.ttb_id.clone(), filing);
    }

    pub fn restore_high_water(&mut self, position: ReplayPosition) {
        self.advance_high_water(&position);
    }

    fn insert_company(&mut self, identity: CompanyIdentity) {
        self.company_index.insert(identity.id, self.companies.len());
        self.companies.push(identity);
    }

    fn insert_alias(&mut self, entry: AliasEntry) {
        if !entry.normalized_name.is_empty() {
            self.normalized_index
                .entry(entry.normalized_name.clone())
                .or_insert(entry.company_id);
        }
        self.alias_order.push(entry.raw_name.clone());
        self.aliases.insert(entry.raw_name.clone(), entry);
    }

    fn advance_high_water(&mut self, position: &ReplayPosition) {
        if self.high_water.as_ref().map_or(true, |hw| position > hw) {
            self.high_water = Some(position.clone());
        }
    }
}

impl SignalStore for MemoryStore {
    fn lookup_alias(&self, raw_name: &str) -> Option<CompanyId> {
        self.aliases.get(raw_name).map(|entry| entry.company_id)
    }

    fn lookup_normalized(&self, normalized: &str) -> Option<CompanyId> {
        if normalized.is_empty() {
            return None;
        }
        self.normalized_index.get(normalized).copied()
    }

    fn bind_alias(&mut self, entry: AliasEntry) -> ClassifyResult<()> {
        if let Some(existing) = self.aliases.get(&entry.raw_name) {
            if existing.company_id == entry.company_id {
                return Ok(());
            }
            return Err(ClassifyError::AliasConflict {
                raw_name: entry.raw_name,
                bound_to: existing.company_id,
                attempted: entry.company_id,
            });
        }
        if !self.company_index.contains_key(&entry.company_id) {
            return Err(ClassifyError::UnknownCompany(entry.company_id));
        }

        self.journal.push(StoreChange::AliasBound(entry.clone()));
        self.insert_alias(entry);
        Ok(())
    }

    fn company(&self, id: &CompanyId) -> Option<&CompanyIdentity> {
        self.company_index.get(id).map(|&idx| &self.companies[idx])
    }

    fn companies(&self) -> Box<dyn Iterator<Item = &CompanyIdentity> + '_> {
        Box::new(self.companies.iter())
    }

    fn create_company(&mut self, identity: CompanyIdentity) -> ClassifyResult<()> {
        if self.company_index.contains_key(&identity.id) {
            return Ok(());
        }
        self.journal.push(StoreChange::CompanyCreated(identity.clone()));
        self.insert_company(identity);
        Ok(())
    }

    fn add_dba(&mut self, id: CompanyId, dba_name: &str) -> ClassifyResult<()> {
        let idx = *self
            .company_index
            .get(&id)
            .ok_or(ClassifyError::UnknownCompany(id))?;
        let company = &mut self.companies[idx];
        if company.dba_names.iter().any(|d| d == dba_name) {
            return Ok(());
        }
        company.dba_names.push(dba_name.to_string());
        self.journal.push(StoreChange::DbaAdded {
            company_id: id,
            dba_name: dba_name.to_string(),
        });
        Ok(())
    }

    fn observed_keys(&self) -> &ObservedKeySet {
        &self.keys
    }

    fn observe(&mut self, key: &ProductKey, first_seen: NaiveDate) -> KeyInsertion {
        let inserted = self.keys.insert(key, first_seen);
        if inserted.company {
            self.journal.push(StoreChange::CompanyObserved {
                company_id: key.company_id,
                first_seen,
            });
        }
        if inserted.brand {
            self.journal.push(StoreChange::BrandObserved {
                company_id: key.company_id,
                brand: key.brand.clone(),
                first_seen,
            });
        }
        if inserted.product {
            self.journal.push(StoreChange::ProductObserved {
                key: key.clone(),
                first_seen,
            });
        }
        inserted
    }

    fn high_water_mark(&self) -> Option<&ReplayPosition> {
        self.high_water.as_ref()
    }

    fn classified(&self, ttb_id: &FilingId) -> Option<&ClassifiedFiling> {
        self.classified.get(ttb_id)
    }

    fn record_classification(&mut self, filing: ClassifiedFiling) {
        self.advance_high_water(&filing.position);
        self.journal.push(StoreChange::Classified(filing.clone()));
        self.classified.insert(filing.position.ttb_id.clone(), filing);
    }
}
