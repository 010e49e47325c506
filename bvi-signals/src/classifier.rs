//! Signal classification
//!
//! Records must arrive in ascending (approval date, TTB id) order. Each record
//! resolves its filer to a canonical company, then the first key level not
//! yet observed decides the signal:
//!
//! | company seen | brand seen | product seen | signal        |
//! |--------------|------------|--------------|---------------|
//! | no           | -          | -            | NEW_COMPANY   |
//! | yes          | no         | -            | NEW_BRAND     |
//! | yes          | yes        | no           | NEW_PRODUCT   |
//! | yes          | yes        | yes          | RESUBMISSION  |

use bvi_common::config::MatchingConfig;
use bvi_common::{CompanyId, FilingId, FilingRecord, ReplayPosition, Signal};
use serde::Serialize;
use tracing::{debug, error};

use crate::error::{ClassifyError, ClassifyResult};
use crate::normalizer::{normalize_key, IdentityNormalizer, Resolution};
use crate::store::{KeyInsertion, ProductKey, SignalStore};

/// Signal assigned to one filing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedFiling {
    pub position: ReplayPosition,
    pub key: ProductKey,
    pub signal: Signal,
}

impl ClassifiedFiling {
    pub fn ttb_id(&self) -> &FilingId {
        &self.position.ttb_id
    }

    pub fn company_id(&self) -> CompanyId {
        self.key.company_id
    }
}

/// Result of offering one record to the classifier
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifyOutcome {
    /// First classification of this record
    Classified {
        filing: ClassifiedFiling,
        resolution: Resolution,
    },
    /// Record was already classified; the stored result is returned unchanged
    Replayed(ClassifiedFiling),
}

impl ClassifyOutcome {
    pub fn filing(&self) -> &ClassifiedFiling {
        match self {
            ClassifyOutcome::Classified { filing, .. } => filing,
            ClassifyOutcome::Replayed(filing) => filing,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, ClassifyOutcome::Replayed(_))
    }
}

/// Map key insertions to the single signal they imply
pub fn signal_for(inserted: KeyInsertion) -> Signal {
    if inserted.company {
        Signal::NewCompany
    } else if inserted.brand {
        Signal::NewBrand
    } else if inserted.product {
        Signal::NewProduct
    } else {
        Signal::Resubmission
    }
}

/// Sort records into classification order
pub fn sort_chronologically(records: &mut [FilingRecord]) {
    records.sort_by(|a, b| {
        a.approval_date
            .cmp(&b.approval_date)
            .then_with(|| a.ttb_id.cmp(&b.ttb_id))
    });
}

pub struct SignalClassifier {
    normalizer: IdentityNormalizer,
}

impl SignalClassifier {
    pub fn new(normalizer: IdentityNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::new(IdentityNormalizer::from_config(config))
    }

    pub fn normalizer(&self) -> &IdentityNormalizer {
        &self.normalizer
    }

    /// Check a record can be classified next without mutating the store
    pub fn check_order<S: SignalStore + ?Sized>(
        &self,
        record: &FilingRecord,
        store: &S,
    ) -> ClassifyResult<()> {
        if store.classified(&record.ttb_id).is_some() {
            return Ok(());
        }
        let position = record.position();
        match store.high_water_mark() {
            Some(high_water) if position <= *high_water => Err(ClassifyError::NonMonotonicReplay {
                attempted: position,
                high_water: high_water.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Classify one record against the store.
    ///
    /// Already-classified records return their stored result and leave the
    /// store untouched. A new record at or before the high-water mark is
    /// rejected.
    pub fn classify<S: SignalStore + ?Sized>(
        &self,
        record: &FilingRecord,
        store: &mut S,
    ) -> ClassifyResult<ClassifyOutcome> {
        if let Some(existing) = store.classified(&record.ttb_id) {
            debug!(ttb_id = %record.ttb_id, "Already classified, replaying stored signal");
            return Ok(ClassifyOutcome::Replayed(existing.clone()));
        }

        if let Err(e) = self.check_order(record, store) {
            error!(ttb_id = %record.ttb_id, "{}", e);
            return Err(e);
        }

        let resolution = self.normalizer.resolve(&record.filer_name, store)?;
        let key = ProductKey::new(
            resolution.company_id,
            normalize_key(&record.brand_name),
            normalize_key(&record.variant_name),
        );
        let inserted = store.observe(&key, record.approval_date);
        let signal = signal_for(inserted);

        let filing = ClassifiedFiling {
            position: record.position(),
            key,
            signal,
        };
        store.record_classification(filing.clone());

        debug!(
            ttb_id = %record.ttb_id,
            company_id = %filing.company_id(),
            signal = %signal,
            "Classified filing"
        );

        Ok(ClassifyOutcome::Classified { filing, resolution })
    }

    /// Classify a chronologically sorted slice, stopping at the first error
    pub fn classify_all<S: SignalStore + ?Sized>(
        &self,
        records: &[FilingRecord],
        store: &mut S,
    ) -> ClassifyResult<Vec<ClassifyOutcome>> {
        records
            .iter()
            .map(|record| self.classify(record, store))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::TokenSort;
    use crate::store::MemoryStore;
    use bvi_common::{FilingStatus, UNKNOWN_FILER_ID};
    use chrono::NaiveDate;

    fn record(ttb_id: &str, filer: &str, brand: &str, variant: &str, date: &str) -> FilingRecord {
        FilingRecord {
            ttb_id: FilingId::new(ttb_id),
            filer_name: filer.to_string(),
            brand_name: brand.to_string(),
            variant_name: variant.to_string(),
            category_code: "140".to_string(),
            approval_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            status: FilingStatus::Approved,
        }
    }

    fn classifier() -> SignalClassifier {
        SignalClassifier::new(IdentityNormalizer::new(Box::new(TokenSort), 0.92, 5))
    }

    fn signals(outcomes: &[ClassifyOutcome]) -> Vec<Signal> {
        outcomes.iter().map(|o| o.filing().signal).collect()
    }

    fn acme_records() -> Vec<FilingRecord> {
        vec![
            record("1001", "Acme Spirits LLC", "Acme Gin", "", "2024-01-01"),
            record("1002", "Acme Spirits LLC", "Acme Vodka", "", "2024-03-01"),
            record("1003", "ACME SPIRITS, L.L.C.", "Acme Gin", "", "2024-06-01"),
        ]
    }

    #[test]
    fn test_suffix_variants_share_company() {
        let mut store = MemoryStore::new();
        let outcomes = classifier().classify_all(&acme_records(), &mut store).unwrap();

        assert_eq!(
            signals(&outcomes),
            vec![Signal::NewCompany, Signal::NewBrand, Signal::Resubmission]
        );
        assert_eq!(outcomes[0].filing().company_id(), outcomes[2].filing().company_id());
    }

    #[test]
    fn test_new_product_for_new_variant() {
        let records = vec![
            record("1", "Acme Spirits LLC", "Acme Gin", "", "2024-01-01"),
            record("2", "Acme Spirits LLC", "Acme Gin", "Sloe", "2024-01-02"),
            record("3", "Acme Spirits LLC", " acme  gin ", "SLOE", "2024-01-03"),
        ];
        let mut store = MemoryStore::new();
        let outcomes = classifier().classify_all(&records, &mut store).unwrap();

        assert_eq!(
            signals(&outcomes),
            vec![Signal::NewCompany, Signal::NewProduct, Signal::Resubmission]
        );
    }

    #[test]
    fn test_dba_filer_resolves_to_legal_entity() {
        let records = vec![
            record("1", "Widget Co, Brand Holdings LLC", "Widget", "", "2024-01-01"),
            record("2", "Brand Holdings LLC", "Other", "", "2024-01-02"),
        ];
        let mut store = MemoryStore::new();
        let outcomes = classifier().classify_all(&records, &mut store).unwrap();

        assert_eq!(signals(&outcomes), vec![Signal::NewCompany, Signal::NewBrand]);
        let company = store.company(&outcomes[0].filing().company_id()).unwrap();
        assert_eq!(company.display_name, "Brand Holdings LLC");
        assert_eq!(company.dba_names, vec!["Widget Co"]);
    }

    #[test]
    fn test_out_of_order_replay_rejected() {
        let records = acme_records();
        let mut store = MemoryStore::new();
        let classifier = classifier();

        classifier.classify(&records[2], &mut store).unwrap();
        let err = classifier.classify(&records[0], &mut store).unwrap_err();
        match err {
            ClassifyError::NonMonotonicReplay { attempted, high_water } => {
                assert_eq!(attempted, records[0].position());
                assert_eq!(high_water, records[2].position());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_same_date_lower_id_rejected_after_higher() {
        let mut store = MemoryStore::new();
        let classifier = classifier();
        classifier
            .classify(&record("20", "Acme Spirits LLC", "Gin", "", "2024-01-01"), &mut store)
            .unwrap();

        let err = classifier
            .classify(&record("3", "Acme Spirits LLC", "Gin", "", "2024-01-01"), &mut store)
            .unwrap_err();
        assert!(matches!(err, ClassifyError::NonMonotonicReplay { .. }));
    }

    #[test]
    fn test_empty_filer_is_unknown() {
        let records = vec![
            record("1", "", "Mystery Gin", "", "2024-01-01"),
            record("2", "   ", "Mystery Gin", "", "2024-01-02"),
            record("3", "...", "Other Gin", "", "2024-01-03"),
        ];
        let mut store = MemoryStore::new();
        let outcomes = classifier().classify_all(&records, &mut store).unwrap();

        for outcome in &outcomes {
            assert_eq!(outcome.filing().company_id(), UNKNOWN_FILER_ID);
        }
        assert_eq!(
            signals(&outcomes),
            vec![Signal::NewCompany, Signal::Resubmission, Signal::NewBrand]
        );
    }

    #[test]
    fn test_replaying_classified_record_changes_nothing() {
        let records = acme_records();
        let mut store = MemoryStore::new();
        let classifier = classifier();
        classifier.classify_all(&records, &mut store).unwrap();
        store.take_changes();
        let keys_before = store.observed_keys().clone();

        let outcome = classifier.classify(&records[0], &mut store).unwrap();
        assert!(outcome.is_replay());
        assert_eq!(outcome.filing().signal, Signal::NewCompany);
        assert_eq!(store.observed_keys(), &keys_before);
        assert!(!store.has_pending_changes());
    }

    #[test]
    fn test_classification_is_deterministic() {
        let records = vec![
            record("1", "Acme Spirits LLC", "Acme Gin", "", "2024-01-01"),
            record("2", "Widget Co, Brand Holdings LLC", "Widget", "", "2024-01-01"),
            record("3", "ACME SPIRITS, L.L.C.", "Acme Gin", "Sloe", "2024-02-01"),
            record("4", "Brand Holdings, Inc.", "Widget", "", "2024-02-01"),
            record("5", "", "Acme Gin", "", "2024-03-01"),
        ];

        let run = || {
            let mut store = MemoryStore::new();
            classifier()
                .classify_all(&records, &mut store)
                .unwrap()
                .into_iter()
                .map(|o| o.filing().clone())
                .collect::<Vec<_>>()
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_observed_keys_only_grow() {
        let mut records = acme_records();
        records.push(record("1004", "Other Distillery Inc", "Rum", "Dark", "2024-07-01"));
        let mut store = MemoryStore::new();
        let classifier = classifier();

        for record in &records {
            let before = store.observed_keys().clone();
            classifier.classify(record, &mut store).unwrap();
            assert!(store.observed_keys().is_superset_of(&before));
        }
        assert_eq!(store.observed_keys().company_count(), 2);
        assert_eq!(store.observed_keys().product_count(), 3);
    }

    #[test]
    fn test_signal_for_priority() {
        let all = KeyInsertion { company: true, brand: true, product: true };
        let brand = KeyInsertion { company: false, brand: true, product: true };
        let product = KeyInsertion { company: false, brand: false, product: true };
        assert_eq!(signal_for(all), Signal::NewCompany);
        assert_eq!(signal_for(brand), Signal::NewBrand);
        assert_eq!(signal_for(product), Signal::NewProduct);
        assert_eq!(signal_for(KeyInsertion::default()), Signal::Resubmission);
    }

    #[test]
    fn test_sort_chronologically_uses_numeric_ids() {
        let mut records = vec![
            record("100", "A", "B", "", "2024-01-02"),
            record("20", "A", "B", "", "2024-01-02"),
            record("999", "A", "B", "", "2024-01-01"),
        ];
        sort_chronologically(&mut records);
        let ids: Vec<&str> = records.iter().map(|r| r.ttb_id.as_str()).collect();
        assert_eq!(ids, vec!["999", "20", "100"]);
    }
}
