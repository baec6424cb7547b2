use std::path::Path;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::models::{Classification, ClassifiedTransaction, Label, Overlay, Status};

/// A transaction the operator has to confirm or label before rendering.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewItem {
    pub index: usize,
    pub date: String,
    pub description: String,
    pub amount: Decimal,
    pub status: Status,
    pub suggested_label: Option<String>,
    pub review_hint: bool,
}

pub fn review_items(classification: &Classification) -> Vec<ReviewItem> {
    classification
        .transactions
        .iter()
        .enumerate()
        .filter(|(_, t)| t.status.needs_review())
        .map(|(index, t)| ReviewItem {
            index,
            date: t.raw.date_text.clone(),
            description: t.raw.description.clone(),
            amount: t.raw.amount,
            status: t.status,
            suggested_label: t.label.as_ref().and_then(Label::text).map(str::to_string),
            review_hint: t.review_hint,
        })
        .collect()
}

/// Overlay operator labels onto a classified list by index. An empty label
/// clears whatever label the entry had; indices past the end are ignored.
pub fn apply_overlay(
    mut transactions: Vec<ClassifiedTransaction>,
    overlay: &Overlay,
) -> Vec<ClassifiedTransaction> {
    for (&index, label) in overlay {
        let Some(txn) = transactions.get_mut(index) else {
            warn!(index, len = transactions.len(), "overlay index out of range");
            continue;
        };
        txn.label = match label {
            Label::Exclude => Some(Label::Exclude),
            Label::Text(s) if s.trim().is_empty() => None,
            Label::Text(s) => Some(Label::Text(s.trim().to_string())),
        };
    }
    transactions
}

/// Entries that remain in the rendered document.
pub fn visible(transactions: &[ClassifiedTransaction]) -> Vec<&ClassifiedTransaction> {
    transactions.iter().filter(|t| !t.is_excluded()).collect()
}

/// NeedsInput entries the overlay left without a label or exclusion.
pub fn unresolved(transactions: &[ClassifiedTransaction]) -> Vec<usize> {
    transactions
        .iter()
        .enumerate()
        .filter(|(_, t)| t.status == Status::NeedsInput && t.label.is_none())
        .map(|(i, _)| i)
        .collect()
}

pub fn load_overlay(path: &Path) -> Result<Overlay> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
