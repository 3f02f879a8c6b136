use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Canonical category labels, in menu order. The last entry doubles as the
/// fallback for unclassifiable products.
pub const CATEGORIES: [&str; 17] = [
    "Dairy",
    "Meat/Cold-cuts",
    "Fish/Seafood",
    "Frozen",
    "Vegetables",
    "Fruit",
    "Bread",
    "Dry/Bulk goods",
    "Snacks/Sweets",
    "Beverages",
    "Ready meals",
    "Spices/Sauces",
    "Preserves",
    "Household chemicals",
    "Cosmetics",
    "Children's products",
    "Other",
];

pub const FALLBACK_CATEGORY: &str = "Other";

pub fn is_canonical_category(label: &str) -> bool {
    CATEGORIES
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(label.trim()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub category: String,
    pub expiry_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub added_date: DateTime<Utc>,
    #[serde(default)]
    pub consumed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_receipt_id: Option<String>,
}

impl Product {
    /// Invariants: non-empty name, non-negative price. `added_date` is set
    /// to the creation instant.
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        expiry_date: NaiveDate,
        price: Option<f64>,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            bail!("product name cannot be empty");
        }
        if let Some(value) = price {
            if value < 0.0 {
                bail!("product price cannot be negative: {value}");
            }
        }

        Ok(Self {
            name,
            category: category.into(),
            expiry_date,
            price,
            added_date: Utc::now(),
            consumed: false,
            source_receipt_id: None,
        })
    }

    pub fn with_source_receipt(mut self, receipt_id: impl Into<String>) -> Self {
        self.source_receipt_id = Some(receipt_id.into());
        self
    }

    pub fn days_until_expiry(&self, today: NaiveDate) -> i64 {
        (self.expiry_date - today).num_days()
    }
}

/// A name/price pair scraped from receipt text. Category and expiry are
/// attached later, during reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProduct {
    pub name: String,
    pub price: f64,
}

/// Intermediate artifact written once per processed receipt (or PDF page)
/// and consumed by the import command. Moved to the archive folder after
/// reconciliation, never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    pub source_filename: String,
    pub processing_timestamp: String,
    pub source_sha256: String,
    pub raw_ocr_text: String,
    pub candidate_products: Vec<CandidateProduct>,
}
