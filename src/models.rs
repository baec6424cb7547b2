use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Overlay value that removes a transaction from the rendered document.
pub const EXCLUDE_SENTINEL: &str = "__EXCLUDE__";

/// Header fields scraped from the fixed rows above the transaction table.
pub type HeaderInfo = BTreeMap<String, String>;

/// Operator-supplied labels keyed by transaction index.
pub type Overlay = BTreeMap<usize, Label>;

/// A qualifying deposit as read from the ledger export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub row: usize,
    pub date: Option<NaiveDate>,
    pub date_text: String,
    pub description: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    AutoOk,
    AutoLabeled,
    NeedsInput,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoOk => "auto_ok",
            Self::AutoLabeled => "auto_labeled",
            Self::NeedsInput => "needs_input",
        }
    }

    pub fn needs_review(&self) -> bool {
        !matches!(self, Self::AutoOk)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Label {
    Text(String),
    Exclude,
}

impl Label {
    pub fn is_exclude(&self) -> bool {
        matches!(self, Self::Exclude)
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Exclude => None,
        }
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        if s.trim() == EXCLUDE_SENTINEL {
            Self::Exclude
        } else {
            Self::Text(s)
        }
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        match label {
            Label::Text(s) => s,
            Label::Exclude => EXCLUDE_SENTINEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedTransaction {
    #[serde(flatten)]
    pub raw: RawTransaction,
    pub status: Status,
    pub label: Option<Label>,
    pub review_hint: bool,
}

impl ClassifiedTransaction {
    pub fn is_excluded(&self) -> bool {
        self.label.as_ref().is_some_and(Label::is_exclude)
    }
}

/// Result of one classifier pass over an extracted statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub needs_review: bool,
    pub usual_amount: Option<Decimal>,
    pub transactions: Vec<ClassifiedTransaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningField {
    Amount,
    Date,
}

/// A cell value that was defaulted instead of failing the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    pub row: usize,
    pub field: WarningField,
    pub raw: String,
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let what = match self.field {
            WarningField::Amount => "amount defaulted to $0.00",
            WarningField::Date => "date not recognised",
        };
        write!(f, "row {}: {what} ({:?})", self.row + 1, self.raw)
    }
}

/// Extractor output: header fields, candidate deposits in sheet order, and
/// any values that had to be defaulted.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub header: HeaderInfo,
    pub transactions: Vec<RawTransaction>,
    pub warnings: Vec<ParseWarning>,
}
