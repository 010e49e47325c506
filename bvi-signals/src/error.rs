//! Error types for bvi-signals
//!
//! Alias conflicts and non-monotonic replays abort a run and need operator
//! intervention. Retrying reproduces them.

use bvi_common::{CompanyId, ReplayPosition};
use thiserror::Error;

pub type ClassifyResult<T> = std::result::Result<T, ClassifyError>;

#[derive(Debug, Error)]
pub enum ClassifyError {
    /// A raw name already bound to one identity was offered another
    #[error("Alias conflict: '{raw_name}' is bound to {bound_to}, refusing to re-bind to {attempted}")]
    AliasConflict {
        raw_name: String,
        bound_to: CompanyId,
        attempted: CompanyId,
    },

    /// A record sorts at or before the last classified position
    #[error("Non-monotonic replay: {attempted} does not sort after already classified {high_water}")]
    NonMonotonicReplay {
        attempted: ReplayPosition,
        high_water: ReplayPosition,
    },

    /// Alias or DBA referencing an identity the store does not hold
    #[error("Unknown company identity: {0}")]
    UnknownCompany(CompanyId),

    /// Persistence or configuration failure
    #[error(transparent)]
    Store(#[from] bvi_common::Error),
}

impl From<sqlx::Error> for ClassifyError {
    fn from(e: sqlx::Error) -> Self {
        ClassifyError::Store(bvi_common::Error::Database(e))
    }
}

impl ClassifyError {
    /// Data-integrity failures that must stop the run
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            ClassifyError::AliasConflict { .. }
                | ClassifyError::NonMonotonicReplay { .. }
                | ClassifyError::UnknownCompany(_)
        )
    }
}
