//! Classification runs against the database
//!
//! A [`Pipeline`] owns the single writer's view of classifier state. Records
//! are buffered and sorted before anything is written, and the whole run is
//! rejected up front if any new record sorts at or before the high-water
//! mark.

use bvi_common::config::TomlConfig;
use bvi_common::{FilingRecord, Signal};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::{error, info};

use crate::classifier::{sort_chronologically, ClassifyOutcome, SignalClassifier};
use crate::db::filings::{self, InsertSummary};
use crate::db::state;
use crate::error::ClassifyResult;
use crate::ingest::IngestBatch;
use crate::normalizer::{MatchMethod, Resolution};
use crate::refile::RefileCounter;
use crate::store::MemoryStore;

/// Totals for one classification run
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub classified: usize,
    /// Records offered again after already being classified
    pub replayed: usize,
    pub by_signal: BTreeMap<String, usize>,
    pub companies_created: usize,
    pub fuzzy_matches: usize,
}

impl RunSummary {
    fn count(&mut self, signal: Signal) {
        *self.by_signal.entry(signal.as_str().to_string()).or_insert(0) += 1;
    }

    pub fn signal_count(&self, signal: Signal) -> usize {
        self.by_signal.get(signal.as_str()).copied().unwrap_or(0)
    }
}

pub struct Pipeline {
    pool: SqlitePool,
    classifier: SignalClassifier,
    store: MemoryStore,
    refiles: RefileCounter,
}

impl Pipeline {
    /// Load persisted state and build the classifier from configuration
    pub async fn open(pool: SqlitePool, config: &TomlConfig) -> ClassifyResult<Self> {
        Self::with_classifier(pool, SignalClassifier::from_config(&config.matching)).await
    }

    pub async fn with_classifier(pool: SqlitePool, classifier: SignalClassifier) -> ClassifyResult<Self> {
        let store = state::load_store(&pool).await?;
        let refiles = state::load_refile_counter(&pool).await?;
        Ok(Self {
            pool,
            classifier,
            store,
            refiles,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// What a raw filer name would resolve to, without binding it
    pub fn preview(&self, raw_name: &str) -> Resolution {
        self.classifier.normalizer().preview(raw_name, &self.store)
    }

    /// Store the valid records of an ingested batch
    pub async fn ingest(&self, batch: &IngestBatch) -> ClassifyResult<InsertSummary> {
        Ok(filings::insert_filings(&self.pool, &batch.records).await?)
    }

    /// Classify every stored filing that has no signal yet
    pub async fn classify_pending(&mut self) -> ClassifyResult<RunSummary> {
        let records = filings::load_unclassified(&self.pool).await?;
        self.classify_records(records).await
    }

    /// Classify stored filings in chronological order.
    ///
    /// Every record must already be in the `filings` table. On an integrity
    /// error the in-memory state is reloaded from the last committed record.
    pub async fn classify_records(&mut self, mut records: Vec<FilingRecord>) -> ClassifyResult<RunSummary> {
        sort_chronologically(&mut records);

        for record in &records {
            if let Err(e) = self.classifier.check_order(record, &self.store) {
                error!("Refusing classification run: {}", e);
                return Err(e);
            }
        }

        let mut summary = RunSummary::default();
        for record in &records {
            if let Err(e) = self.classify_one(record, &mut summary).await {
                error!(ttb_id = %record.ttb_id, "Classification aborted: {}", e);
                self.reload().await?;
                return Err(e);
            }
        }

        info!(
            classified = summary.classified,
            replayed = summary.replayed,
            companies_created = summary.companies_created,
            "Classification run complete"
        );
        Ok(summary)
    }

    async fn classify_one(&mut self, record: &FilingRecord, summary: &mut RunSummary) -> ClassifyResult<()> {
        let outcome = self.classifier.classify(record, &mut self.store)?;

        let (filing, resolution) = match outcome {
            ClassifyOutcome::Replayed(_) => {
                summary.replayed += 1;
                return Ok(());
            }
            ClassifyOutcome::Classified { filing, resolution } => (filing, resolution),
        };

        let refile = self.refiles.record(&filing);
        let changes = self.store.take_changes();
        state::persist_step(&self.pool, &changes, refile.as_ref()).await?;

        summary.classified += 1;
        summary.count(filing.signal);
        match resolution.method {
            MatchMethod::Created => summary.companies_created += 1,
            MatchMethod::Fuzzy { .. } => summary.fuzzy_matches += 1,
            _ => {}
        }
        Ok(())
    }

    /// Replay every stored filing from a clean classification state.
    ///
    /// Aliases and companies are kept, so a raw name bound earlier must still
    /// resolve to the same identity.
    pub async fn reclassify(&mut self) -> ClassifyResult<RunSummary> {
        info!("Resetting classification state for full replay");
        state::reset_classification(&self.pool).await?;
        self.reload().await?;
        let records = filings::load_all_filings(&self.pool).await?;
        self.classify_records(records).await
    }

    /// Reload state from the database, discarding anything uncommitted
    pub async fn reload(&mut self) -> ClassifyResult<()> {
        self.store = state::load_store(&self.pool).await?;
        self.refiles = state::load_refile_counter(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn classifier(&self) -> &SignalClassifier {
        &self.classifier
    }
}
