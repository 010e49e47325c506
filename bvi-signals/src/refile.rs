//! Refile counts
//!
//! Every first-occurrence filing carries the number of later filings that
//! share its exact (company, brand, variant) key. [`RefileCounter`] keeps the
//! counts current as resubmissions arrive, touching only the affected group;
//! [`count_refiles`] regroups a complete classified history from scratch.

use bvi_common::{FilingId, Signal};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use crate::classifier::ClassifiedFiling;
use crate::store::ProductKey;

#[derive(Debug, Clone, PartialEq, Eq)]
struct RefileGroup {
    first: FilingId,
    refiles: u32,
}

/// New refile count for one first-occurrence filing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefileUpdate {
    pub ttb_id: FilingId,
    pub refile_count: u32,
}

#[derive(Debug, Default)]
pub struct RefileCounter {
    groups: HashMap<ProductKey, RefileGroup>,
}

impl RefileCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a persisted group
    pub fn restore(&mut self, key: ProductKey, first: FilingId, refiles: u32) {
        self.groups.insert(key, RefileGroup { first, refiles });
    }

    /// Account for one newly classified filing.
    ///
    /// Returns the row whose count changed: the filing itself (count 0) when
    /// it opens a group, or the group's first filing when it is a
    /// resubmission. Callers must not pass replayed filings.
    pub fn record(&mut self, filing: &ClassifiedFiling) -> Option<RefileUpdate> {
        if filing.signal.is_first_occurrence() {
            if self.groups.contains_key(&filing.key) {
                warn!(
                    ttb_id = %filing.ttb_id(),
                    "First occurrence for a key that already has a group"
                );
                return None;
            }
            self.groups.insert(
                filing.key.clone(),
                RefileGroup {
                    first: filing.ttb_id().clone(),
                    refiles: 0,
                },
            );
            return Some(RefileUpdate {
                ttb_id: filing.ttb_id().clone(),
                refile_count: 0,
            });
        }

        match self.groups.get_mut(&filing.key) {
            Some(group) => {
                group.refiles += 1;
                Some(RefileUpdate {
                    ttb_id: group.first.clone(),
                    refile_count: group.refiles,
                })
            }
            None => {
                warn!(
                    ttb_id = %filing.ttb_id(),
                    "Resubmission without a first occurrence on record"
                );
                None
            }
        }
    }

    pub fn refile_count(&self, key: &ProductKey) -> Option<u32> {
        self.groups.get(key).map(|g| g.refiles)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

/// Refile counts for a complete classified history.
///
/// Groups by key; the earliest filing of each group gets `group size - 1`.
/// The order of resubmissions within a group does not matter.
pub fn count_refiles(filings: &[ClassifiedFiling]) -> BTreeMap<FilingId, u32> {
    let mut groups: HashMap<&ProductKey, (&ClassifiedFiling, u32)> = HashMap::new();

    for filing in filings {
        groups
            .entry(&filing.key)
            .and_modify(|(first, size)| {
                *size += 1;
                if filing.position < first.position {
                    *first = filing;
                }
            })
            .or_insert((filing, 1));
    }

    groups
        .into_values()
        .map(|(first, size)| {
            if first.signal == Signal::Resubmission {
                warn!(ttb_id = %first.ttb_id(), "Earliest filing of a group is a resubmission");
            }
            (first.ttb_id().clone(), size - 1)
        })
        .collect()
}
