//! Batch re-normalization
//!
//! Incremental classification never re-points an alias. This operation
//! rebuilds every company identity from scratch by resolving each distinct
//! raw filer name in the order it was first filed, re-points aliases to the
//! rebuilt identities and then replays classification over the full history.
//!
//! Operator-edited display names survive for identities whose id is rebuilt.

use bvi_common::CompanyId;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

use crate::db::{filings, state};
use crate::error::ClassifyResult;
use crate::pipeline::{Pipeline, RunSummary};
use crate::store::{MemoryStore, SignalStore, StoreChange};

/// One raw name bound to a different identity after the rebuild
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasMove {
    pub raw_name: String,
    pub from: CompanyId,
    pub to: CompanyId,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenormalizeReport {
    pub companies_before: usize,
    pub companies_after: usize,
    pub moved: Vec<AliasMove>,
    pub reclassified: RunSummary,
}

pub async fn renormalize(pipeline: &mut Pipeline) -> ClassifyResult<RenormalizeReport> {
    let old_bindings: HashMap<String, CompanyId> = pipeline
        .store()
        .aliases()
        .map(|a| (a.raw_name.clone(), a.company_id))
        .collect();
    let old_names: HashMap<CompanyId, String> = pipeline
        .store()
        .companies()
        .map(|c| (c.id, c.display_name.clone()))
        .collect();
    let companies_before = old_names.len();

    let first_seen = filings::load_first_seen_filer_names(pipeline.pool()).await?;
    info!("Rebuilding identities from {} distinct filer names", first_seen.len());

    let mut rebuilt = MemoryStore::new();
    let normalizer = pipeline.classifier().normalizer();
    for record in &first_seen {
        normalizer.resolve(&record.filer_name, &mut rebuilt)?;
    }

    let changes: Vec<StoreChange> = rebuilt
        .take_changes()
        .into_iter()
        .map(|change| match change {
            StoreChange::CompanyCreated(mut identity) => {
                if let Some(name) = old_names.get(&identity.id) {
                    identity.display_name = name.clone();
                }
                StoreChange::CompanyCreated(identity)
            }
            other => other,
        })
        .collect();

    let moved: Vec<AliasMove> = rebuilt
        .aliases()
        .filter_map(|alias| {
            let from = *old_bindings.get(&alias.raw_name)?;
            (from != alias.company_id).then(|| AliasMove {
                raw_name: alias.raw_name.clone(),
                from,
                to: alias.company_id,
            })
        })
        .collect();
    let companies_after = rebuilt.companies().count();

    let mut tx = pipeline.pool().begin().await?;
    state::reset_identities_tx(&mut tx).await?;
    state::apply_changes(&mut tx, &changes).await?;
    tx.commit().await?;

    for m in &moved {
        info!(raw_name = %m.raw_name, from = %m.from, to = %m.to, "Alias re-pointed");
    }
    info!(
        "Rebuilt {} companies (was {}), {} aliases re-pointed",
        companies_after,
        companies_before,
        moved.len()
    );

    let reclassified = pipeline.reclassify().await?;

    Ok(RenormalizeReport {
        companies_before,
        companies_after,
        moved,
        reclassified,
    })
}
