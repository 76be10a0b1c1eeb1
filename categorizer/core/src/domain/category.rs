// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Category reference data.
//!
//! The valid category set and the MCC routing table are loaded once per
//! session and shared read-only (behind an `Arc`) by every concurrent
//! categorization call, so no locking is needed here.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Category assigned to every CREDIT transaction by the rule stage
pub const INCOME_CATEGORY: &str = "Income";

/// Category used when nothing else can be trusted
pub const FALLBACK_CATEGORY: &str = "Transfers";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Category {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MccEntry {
    pub mcc: String,
    pub category_name: String,
}

impl MccEntry {
    pub fn new(mcc: impl Into<String>, category_name: impl Into<String>) -> Self {
        Self {
            mcc: mcc.into(),
            category_name: category_name.into(),
        }
    }
}

/// Immutable-per-session view of the valid categories and MCC map
#[derive(Debug, Clone, Default)]
pub struct CategoryReference {
    names: Vec<String>,
    lookup: HashSet<String>,
    mcc_map: HashMap<String, String>,
}

impl CategoryReference {
    /// Build the reference from storage contents.
    ///
    /// Category order is preserved (it is the order shown to the AI
    /// classifier); duplicate names are dropped.
    pub fn new(categories: Vec<String>, mcc_map: HashMap<String, String>) -> Self {
        let mut names = Vec::with_capacity(categories.len());
        let mut lookup = HashSet::with_capacity(categories.len());
        for name in categories {
            if lookup.insert(name.clone()) {
                names.push(name);
            }
        }
        Self {
            names,
            lookup,
            mcc_map,
        }
    }

    pub fn contains(&self, category: &str) -> bool {
        self.lookup.contains(category)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn category_for_mcc(&self, mcc: &str) -> Option<&str> {
        self.mcc_map.get(mcc.trim()).map(String::as_str)
    }

    pub fn mcc_count(&self) -> usize {
        self.mcc_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Built-in catalog used to seed the in-memory backend and generated configs
pub fn default_categories() -> Vec<Category> {
    [
        (INCOME_CATEGORY, "Salary, refunds, cashback, and other credits"),
        ("Food & Dining", "Restaurants, cafes, food delivery"),
        ("Groceries", "Supermarkets, local grocery stores"),
        ("Travel & Transport", "Flights, trains, cabs, fuel, tolls"),
        ("Utilities", "Electricity, water, gas, internet, mobile bills"),
        ("Shopping", "Clothing, electronics, e-commerce, department stores"),
        ("Health & Wellness", "Pharmacies, hospitals, gyms, checkups"),
        ("Entertainment", "Movies, streaming services, events, gaming"),
        (FALLBACK_CATEGORY, "P2P transfers, wallet top-ups, family support"),
        ("Investment", "Stocks, mutual funds, gold, crypto, savings"),
        ("Education", "School fees, courses, books, tuition"),
        ("Pets", "Pet food, vet visits, grooming"),
        ("Home Services", "Repairs, cleaning, decor, furniture"),
        ("Charity", "Donations, NGOs, religious contributions"),
        ("Insurance", "Life, health, car, home insurance premiums"),
        ("Taxes", "Income tax, property tax, GST payments"),
        ("Office & Business", "Co-working, software subscriptions, office supplies"),
        ("Gifts & Donations", "Personal gifts, wedding envelopes"),
        ("Kids", "Toys, baby products, allowances"),
        ("Personal Care", "Salon, spa, cosmetics, grooming products"),
    ]
    .into_iter()
    .map(|(name, description)| Category::new(name, description))
    .collect()
}

pub fn default_mcc_entries() -> Vec<MccEntry> {
    [
        ("5812", "Food & Dining"),
        ("5814", "Food & Dining"),
        ("5462", "Food & Dining"),
        ("5411", "Groceries"),
        ("5422", "Groceries"),
        ("4121", "Travel & Transport"),
        ("5541", "Travel & Transport"),
        ("4789", "Travel & Transport"),
        ("4511", "Travel & Transport"),
        ("4814", "Utilities"),
        ("4900", "Utilities"),
        ("5912", "Health & Wellness"),
        ("8011", "Health & Wellness"),
        ("7997", "Health & Wellness"),
        ("7832", "Entertainment"),
        ("5816", "Entertainment"),
        ("5311", "Shopping"),
        ("5732", "Shopping"),
        ("5651", "Shopping"),
        ("8211", "Education"),
        ("8299", "Education"),
        ("5995", "Pets"),
        ("0742", "Pets"),
        ("6300", "Insurance"),
        ("6011", FALLBACK_CATEGORY),
        ("6211", "Investment"),
        ("8398", "Charity"),
        ("7230", "Personal Care"),
    ]
    .into_iter()
    .map(|(mcc, category)| MccEntry::new(mcc, category))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_preserves_order_and_dedups() {
        let reference = CategoryReference::new(
            vec!["Groceries".into(), "Income".into(), "Groceries".into()],
            HashMap::new(),
        );
        assert_eq!(reference.names(), &["Groceries".to_string(), "Income".to_string()]);
        assert!(reference.contains("Income"));
        assert!(!reference.contains("income"));
    }

    #[test]
    fn test_mcc_lookup_trims_code() {
        let reference = CategoryReference::new(
            vec!["Groceries".into()],
            HashMap::from([("5411".to_string(), "Groceries".to_string())]),
        );
        assert_eq!(reference.category_for_mcc(" 5411 "), Some("Groceries"));
        assert_eq!(reference.category_for_mcc("9999"), None);
    }

    #[test]
    fn test_default_catalog_is_consistent() {
        let names: HashSet<String> = default_categories().into_iter().map(|c| c.name).collect();
        assert!(names.contains(INCOME_CATEGORY));
        assert!(names.contains(FALLBACK_CATEGORY));
        for entry in default_mcc_entries() {
            assert!(names.contains(&entry.category_name), "unknown category {}", entry.category_name);
        }
    }
}
