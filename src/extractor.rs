use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use calamine::{Data, Range, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::{Result, VodError};
use crate::models::{Extraction, HeaderInfo, ParseWarning, RawTransaction, WarningField};

// ---------------------------------------------------------------------------
// Sheet layout
// ---------------------------------------------------------------------------

/// Header rows (zero-based) and the labels each one may carry.
const HEADER_ROWS: &[(usize, &[&str])] = &[
    (7, &["Name", "Account Type", "Account #"]),
    (8, &["Allowance", "Direct Deposit #"]),
    (9, &["Date Opened", "Current Balance"]),
    (10, &["Res ID", "Status Reason"]),
    (11, &["Status", "Restraints"]),
    (12, &["Interest"]),
];

/// Labels kept on a bare prefix match ("Interest Rate: 0.5%" keeps the whole
/// cell as its value).
const PREFIX_LABELS: &[&str] = &["Interest"];

/// Widest column scanned for header fields.
const HEADER_SCAN_COLS: usize = 32;

const TABLE_HEADER_ROW: usize = 14;
const FIRST_TXN_ROW: usize = 15;
const COL_DATE: usize = 2;
const COL_DESCRIPTION: usize = 3;
const COL_CREDITS: usize = 7;

/// Description markers for recurring surplus deposits (matched upper-case).
const DEPOSIT_MARKERS: &[&str] = &["AUTO PMT-CHASE", "SURPLUS"];

// ---------------------------------------------------------------------------
// Cell grid
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn display(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Self::Number(n) => n.to_string(),
            Self::Date(dt) => dt.format("%m/%d/%Y").to_string(),
        }
    }
}

fn parse_iso_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::from_str(raw)
        .ok()
        .or_else(|| NaiveDate::from_str(raw).ok().and_then(|d| d.and_hms_opt(0, 0, 0)))
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Text(b.to_string()),
            Data::DateTime(dt) if dt.is_datetime() => dt
                .as_datetime()
                .map(Cell::Date)
                .unwrap_or(Cell::Number(dt.as_f64())),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::DateTimeIso(s) => parse_iso_datetime(s)
                .map(Cell::Date)
                .unwrap_or_else(|| Cell::Text(s.clone())),
            Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(_) => Cell::Empty,
        }
    }
}

/// Worksheet addressed by absolute (row, column), independent of where the
/// used range starts.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    /// Only columns the layout reads are kept: up to the credits column, and
    /// a wider band on the header rows.
    pub fn from_range(range: &Range<Data>) -> Self {
        let (Some((start_row, start_col)), Some((end_row, _))) = (range.start(), range.end())
        else {
            return Self::default();
        };
        let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); end_row as usize + 1];
        for (r, c, value) in range.used_cells() {
            let row = start_row as usize + r;
            let col = start_col as usize + c;
            if col >= row_width(row) {
                continue;
            }
            let cells = &mut rows[row];
            if cells.len() <= col {
                cells.resize(col + 1, Cell::Empty);
            }
            cells[col] = Cell::from(value);
        }
        Self { rows }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, idx: usize) -> &[Cell] {
        self.rows.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        const EMPTY: &Cell = &Cell::Empty;
        self.row(row).get(col).unwrap_or(EMPTY)
    }
}

fn row_width(row: usize) -> usize {
    if HEADER_ROWS.iter().any(|(r, _)| *r == row) {
        HEADER_SCAN_COLS.max(COL_CREDITS + 1)
    } else {
        COL_CREDITS + 1
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Currency-tolerant amount parsing: "$1,234.56", "\"500.00\"", "(50.00)".
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let s = raw.replace(',', "").replace('"', "").replace('$', "");
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return Decimal::from_str(inner.trim()).ok().map(|d| -d);
    }
    Decimal::from_str(s).ok()
}

fn cell_amount(cell: &Cell) -> Option<Decimal> {
    match cell {
        Cell::Number(n) => Decimal::from_f64(*n).map(|d| d.round_dp(2)),
        Cell::Text(s) => parse_amount(s).map(|d| d.round_dp(2)),
        _ => None,
    }
}

fn label_regex(label: &str) -> Regex {
    let label = regex::escape(label);
    let pattern = if PREFIX_LABELS.iter().any(|l| regex::escape(l) == label) {
        format!(r"(?s)^(?:{label}\s*:\s*(.*)|({label}.*))$")
    } else {
        format!(r"(?s)^{label}\s*:\s*(.*)$")
    };
    Regex::new(&pattern).expect("header label pattern")
}

fn header_patterns() -> &'static [(usize, Vec<(&'static str, Regex)>)] {
    static PATTERNS: OnceLock<Vec<(usize, Vec<(&'static str, Regex)>)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        HEADER_ROWS
            .iter()
            .map(|(row, labels)| (*row, labels.iter().map(|l| (*l, label_regex(l))).collect()))
            .collect()
    })
}

fn is_deposit(description: &str) -> bool {
    let upper = description.to_uppercase();
    DEPOSIT_MARKERS.iter().any(|m| upper.contains(m))
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

fn extract_header(sheet: &Sheet) -> HeaderInfo {
    let mut header = HeaderInfo::new();
    for (row, patterns) in header_patterns() {
        for cell in sheet.row(*row) {
            let text = cell.display();
            if text.is_empty() {
                continue;
            }
            if let Some((label, caps)) = patterns
                .iter()
                .find_map(|(label, re)| re.captures(&text).map(|c| (*label, c)))
            {
                let value = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
                header.insert(label.to_string(), value.trim().to_string());
            }
        }
    }
    header
}

/// Pull header fields and qualifying deposits out of a ledger sheet.
pub fn extract(sheet: &Sheet) -> Result<Extraction> {
    if sheet.height() <= TABLE_HEADER_ROW {
        return Err(VodError::MalformedInput(format!(
            "expected the transaction table header at row {}, sheet has {} rows",
            TABLE_HEADER_ROW + 1,
            sheet.height()
        )));
    }

    let header = extract_header(sheet);
    let mut transactions = Vec::new();
    let mut warnings = Vec::new();

    for row in FIRST_TXN_ROW..sheet.height() {
        let credits = sheet.cell(row, COL_CREDITS);
        if credits.is_empty() {
            continue;
        }
        let description = sheet.cell(row, COL_DESCRIPTION).display();
        if !is_deposit(&description) {
            continue;
        }

        let amount = match cell_amount(credits) {
            Some(a) => a,
            None => {
                let warning = ParseWarning {
                    row,
                    field: WarningField::Amount,
                    raw: credits.display(),
                };
                warn!(%warning, "unparsable credit amount");
                warnings.push(warning);
                Decimal::ZERO
            }
        };

        let (date, date_text) = match sheet.cell(row, COL_DATE) {
            Cell::Date(dt) => (Some(dt.date()), dt.format("%m/%d/%Y").to_string()),
            Cell::Empty => (None, String::new()),
            other => {
                let raw = other.display();
                if !raw.is_empty() {
                    let warning = ParseWarning {
                        row,
                        field: WarningField::Date,
                        raw: raw.clone(),
                    };
                    warn!(%warning, "date cell is not a native date");
                    warnings.push(warning);
                }
                (None, raw)
            }
        };

        transactions.push(RawTransaction {
            row,
            date,
            date_text,
            description,
            amount,
        });
    }

    debug!(
        fields = header.len(),
        deposits = transactions.len(),
        warnings = warnings.len(),
        "extracted ledger"
    );
    Ok(Extraction {
        header,
        transactions,
        warnings,
    })
}

/// Open a workbook and extract from its first worksheet.
pub fn extract_file(file_path: &Path) -> Result<Extraction> {
    let mut workbook = calamine::open_workbook_auto(file_path)
        .map_err(|e| VodError::MalformedInput(format!("failed to open workbook: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| VodError::MalformedInput("workbook has no worksheets".to_string()))?
        .map_err(|e| VodError::MalformedInput(format!("failed to read worksheet: {e}")))?;
    extract(&Sheet::from_range(&range))
}
