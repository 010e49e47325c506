//! Canonical company identities and their aliases

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{Error, Result};

/// Namespace for deriving canonical ids from normalized legal names
const COMPANY_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_04a2_9c3e_5d17_8e40_b2f5_c913_a7d0);

/// Fixed id of the "unknown filer" identity
pub const UNKNOWN_FILER_ID: CompanyId = CompanyId(Uuid::from_u128(1));

/// Display name of the "unknown filer" identity
pub const UNKNOWN_FILER_NAME: &str = "UNKNOWN FILER";

/// Opaque canonical company id, stable once assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(Uuid);

impl CompanyId {
    /// Derive the id for a newly created identity from its normalized name.
    ///
    /// Replaying the same raw names in the same order therefore yields the
    /// same ids.
    pub fn for_normalized_name(normalized: &str) -> Self {
        Self(Uuid::new_v5(&COMPANY_NAMESPACE, normalized.as_bytes()))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    pub fn is_unknown_filer(&self) -> bool {
        *self == UNKNOWN_FILER_ID
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for CompanyId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(CompanyId)
            .map_err(|e| Error::InvalidInput(format!("Invalid company id '{}': {}", s, e)))
    }
}

/// A canonical, deduplicated filer entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyIdentity {
    pub id: CompanyId,
    /// Operator-editable display name
    pub display_name: String,
    /// Normalized form of the legal-entity name the identity was created from
    pub normalized_name: String,
    /// Display-only "also operates as" trade names
    pub dba_names: Vec<String>,
}

impl CompanyIdentity {
    pub fn unknown_filer() -> Self {
        Self {
            id: UNKNOWN_FILER_ID,
            display_name: UNKNOWN_FILER_NAME.to_string(),
            // No real filer normalizes to the empty string
            normalized_name: String::new(),
            dba_names: Vec::new(),
        }
    }
}

/// Persisted binding of one raw filer name to one canonical identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub raw_name: String,
    pub normalized_name: String,
    pub company_id: CompanyId,
}
