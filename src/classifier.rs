use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use tracing::debug;

use crate::fmt::month_label;
use crate::models::{Classification, ClassifiedTransaction, Label, RawTransaction, Status};

/// Whole-dollar amounts at or below this are hinted as administrative fees.
pub const FEE_HINT_MAX: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MonthKey {
    /// First day of the calendar month.
    Month(NaiveDate),
    Unknown,
}

fn month_key(txn: &RawTransaction) -> MonthKey {
    match txn.date {
        Some(d) => MonthKey::Month(d.with_day(1).unwrap_or(d)),
        None => MonthKey::Unknown,
    }
}

fn group_by_month(txns: &[RawTransaction]) -> BTreeMap<MonthKey, Vec<usize>> {
    let mut groups: BTreeMap<MonthKey, Vec<usize>> = BTreeMap::new();
    for (i, txn) in txns.iter().enumerate() {
        groups.entry(month_key(txn)).or_default().push(i);
    }
    groups
}

/// Most frequent amount across the statement. Ties go to the amount whose
/// first occurrence comes earliest in input order.
pub fn usual_amount(txns: &[RawTransaction]) -> Option<Decimal> {
    let mut counts: HashMap<Decimal, (usize, usize)> = HashMap::new();
    for (i, txn) in txns.iter().enumerate() {
        counts.entry(txn.amount.normalize()).or_insert((0, i)).0 += 1;
    }
    counts
        .into_values()
        .max_by(|(count_a, first_a), (count_b, first_b)| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(_, first)| txns[first].amount)
}

pub fn review_hint(amount: Decimal) -> bool {
    !amount.is_sign_negative() && amount.fract().is_zero() && amount <= Decimal::from(FEE_HINT_MAX)
}

fn needs_input(txn: &mut ClassifiedTransaction) {
    txn.status = Status::NeedsInput;
    txn.label = None;
    txn.review_hint = review_hint(txn.raw.amount);
}

/// Chronologically last member stays unlabeled for its own month; each earlier
/// member steps back one more calendar month.
fn label_catch_up(out: &mut [ClassifiedTransaction], members: &[usize], month: NaiveDate) {
    let n = members.len();
    for (pos, &idx) in members.iter().enumerate() {
        let months_back = (n - 1 - pos) as u32;
        if months_back == 0 {
            continue;
        }
        match month.checked_sub_months(Months::new(months_back)) {
            Some(covered) => {
                out[idx].status = Status::AutoLabeled;
                out[idx].label = Some(Label::Text(month_label(covered)));
            }
            None => needs_input(&mut out[idx]),
        }
    }
}

/// Decide, per calendar month, which deposits can be attributed automatically
/// and which need an operator. Output is index-aligned with the input.
pub fn classify(txns: &[RawTransaction]) -> Classification {
    let usual = usual_amount(txns);
    let mut out: Vec<ClassifiedTransaction> = txns
        .iter()
        .map(|raw| ClassifiedTransaction {
            raw: raw.clone(),
            status: Status::AutoOk,
            label: None,
            review_hint: false,
        })
        .collect();

    for (key, mut members) in group_by_month(txns) {
        let month = match key {
            MonthKey::Unknown => {
                debug!(count = members.len(), "undated deposits need input");
                for &idx in &members {
                    needs_input(&mut out[idx]);
                }
                continue;
            }
            MonthKey::Month(month) => month,
        };
        if members.len() == 1 {
            continue;
        }

        members.sort_by_key(|&idx| txns[idx].date);
        let (matching, other): (Vec<usize>, Vec<usize>) = members
            .iter()
            .copied()
            .partition(|&idx| Some(txns[idx].amount) == usual);
        debug!(
            month = %month.format("%Y-%m"),
            matching = matching.len(),
            other = other.len(),
            "multiple deposits in one month"
        );

        label_catch_up(&mut out, &matching, month);
        for idx in other {
            needs_input(&mut out[idx]);
        }
    }

    let needs_review = out.iter().any(|t| t.status.needs_review());
    Classification {
        needs_review,
        usual_amount: usual,
        transactions: out,
    }
}
