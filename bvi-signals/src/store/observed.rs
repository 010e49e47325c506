//! Observed company / brand / product keys

use bvi_common::CompanyId;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

/// (company, brand, variant) key; brand and variant are normalized keys
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProductKey {
    pub company_id: CompanyId,
    pub brand: String,
    pub variant: String,
}

impl ProductKey {
    pub fn new(company_id: CompanyId, brand: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            company_id,
            brand: brand.into(),
            variant: variant.into(),
        }
    }
}

/// Which keys an insertion added
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyInsertion {
    pub company: bool,
    pub brand: bool,
    pub product: bool,
}

/// Every key ever seen, with the approval date it was first seen on.
///
/// Keys are never removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedKeySet {
    companies: HashMap<CompanyId, NaiveDate>,
    brands: HashMap<(CompanyId, String), NaiveDate>,
    products: HashMap<ProductKey, NaiveDate>,
}

impl ObservedKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &ProductKey, first_seen: NaiveDate) -> KeyInsertion {
        KeyInsertion {
            company: self.insert_company(key.company_id, first_seen),
            brand: self.insert_brand(key.company_id, &key.brand, first_seen),
            product: self.insert_product(key.clone(), first_seen),
        }
    }

    pub fn insert_company(&mut self, company_id: CompanyId, first_seen: NaiveDate) -> bool {
        if self.companies.contains_key(&company_id) {
            return false;
        }
        self.companies.insert(company_id, first_seen);
        true
    }

    pub fn insert_brand(&mut self, company_id: CompanyId, brand: &str, first_seen: NaiveDate) -> bool {
        let key = (company_id, brand.to_string());
        if self.brands.contains_key(&key) {
            return false;
        }
        self.brands.insert(key, first_seen);
        true
    }

    pub fn insert_product(&mut self, key: ProductKey, first_seen: NaiveDate) -> bool {
        if self.products.contains_key(&key) {
            return false;
        }
        self.products.insert(key, first_seen);
        true
    }

    #[cfg(test)]
    pub fn contains_company(&self, company_id: &CompanyId) -> bool {
        self.companies.contains_key(company_id)
    }

    #[cfg(test)]
    pub fn contains_brand(&self, company_id: CompanyId, brand: &str) -> bool {
        self.brands.contains_key(&(company_id, brand.to_string()))
    }

    #[cfg(test)]
    pub fn contains_product(&self, key: &ProductKey) -> bool {
        self.products.contains_key(key)
    }

    #[cfg(test)]
    pub fn company_first_seen(&self, company_id: &CompanyId) -> Option<NaiveDate> {
        self.companies.get(company_id).copied()
    }

    #[cfg(test)]
    pub fn product_first_seen(&self, key: &ProductKey) -> Option<NaiveDate> {
        self.products.get(key).copied()
    }

    pub fn company_count(&self) -> usize {
        self.companies.len()
    }

    pub fn brand_count(&self) -> usize {
        self.brands.len()
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    #[cfg(test)]
    /// True when every key in `other` is also in `self`
    pub fn is_superset_of(&self, other: &ObservedKeySet) -> bool {
        other.companies.keys().all(|k| self.companies.contains_key(k))
            && other.brands.keys().all(|k| self.brands.contains_key(k))
            && other.products.keys().all(|k| self.products.contains_key(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_insert_reports_new_keys() {
        let company = CompanyId::for_normalized_name("ACME SPIRITS LLC");
        let mut keys = ObservedKeySet::new();

        let first = keys.insert(&ProductKey::new(company, "ACME GIN", ""), date(1));
        assert_eq!(first, KeyInsertion { company: true, brand: true, product: true });

        let variant = keys.insert(&ProductKey::new(company, "ACME GIN", "SLOE"), date(2));
        assert_eq!(variant, KeyInsertion { company: false, brand: false, product: true });

        let repeat = keys.insert(&ProductKey::new(company, "ACME GIN", "SLOE"), date(3));
        assert_eq!(repeat, KeyInsertion::default());
    }

    #[test]
    fn test_insert_keeps_first_seen_date() {
        let company = CompanyId::for_normalized_name("ACME SPIRITS LLC");
        let key = ProductKey::new(company, "ACME GIN", "");
        let mut keys = ObservedKeySet::new();

        keys.insert(&key, date(5));
        keys.insert(&key, date(9));
        assert_eq!(keys.product_first_seen(&key), Some(date(5)));
        assert_eq!(keys.company_first_seen(&company), Some(date(5)));
    }

    #[test]
    fn test_superset() {
        let company = CompanyId::for_normalized_name("ACME SPIRITS LLC");
        let mut before = ObservedKeySet::new();
        before.insert(&ProductKey::new(company, "ACME GIN", ""), date(1));

        let mut after = before.clone();
        after.insert(&ProductKey::new(company, "ACME VODKA", ""), date(2));

        assert!(after.is_superset_of(&before));
        assert!(!before.is_superset_of(&after));
    }
}
