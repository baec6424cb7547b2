use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::HeaderInfo;

/// Format a decimal as a dollar amount with thousands separators: $1,234.56
pub fn money(val: Decimal) -> String {
    let negative = val.is_sign_negative() && !val.is_zero();
    let cents = format!("{:.2}", val.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-${with_commas}.{dec_part}")
    } else {
        format!("${with_commas}.{dec_part}")
    }
}

/// "For: December 2024"
pub fn month_label(date: NaiveDate) -> String {
    date.format("For: %B %Y").to_string()
}

/// Capitalize the first letter of every alphabetic run and lowercase the rest,
/// so "O'BRIEN-SMITH" becomes "O'Brien-Smith".
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// "SMITH,JOHN" -> "Smith, John". Names without a comma are title-cased whole.
pub fn display_name(raw: &str) -> String {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() >= 2 {
        format!(
            "{}, {}",
            title_case(parts[0].trim()),
            title_case(parts[1].trim())
        )
    } else {
        title_case(raw.trim())
    }
}

/// "<Last>, <First> - VOD <MM-DD-YYYY>.<ext>"
pub fn artifact_filename(header: &HeaderInfo, date: NaiveDate, ext: &str) -> String {
    let name = header.get("Name").map(String::as_str).unwrap_or("Unknown");
    format!("{} - VOD {}.{ext}", display_name(name), date.format("%m-%d-%Y"))
}

/// Reduce an uploaded file name to a safe single path component.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or("");
    let cleaned: String = base
        .trim()
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() => c,
            '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(dec("1234.56")), "$1,234.56");
        assert_eq!(money(dec("-500.00")), "-$500.00");
        assert_eq!(money(dec("0")), "$0.00");
        assert_eq!(money(dec("1000000.99")), "$1,000,000.99");
        assert_eq!(money(dec("42.1")), "$42.10");
    }

    #[test]
    fn test_month_label() {
        let d = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
        assert_eq!(month_label(d), "For: December 2024");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("SMITH"), "Smith");
        assert_eq!(title_case("o'brien-JONES"), "O'Brien-Jones");
        assert_eq!(title_case("mary ann"), "Mary Ann");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("DOE,JANE"), "Doe, Jane");
        assert_eq!(display_name(" DOE , JANE Q "), "Doe, Jane Q");
        assert_eq!(display_name("JANE DOE"), "Jane Doe");
    }

    #[test]
    fn test_artifact_filename() {
        let mut header = HeaderInfo::new();
        header.insert("Name".into(), "DOE,JANE".into());
        let d = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(artifact_filename(&header, d, "pdf"), "Doe, Jane - VOD 03-07-2025.pdf");
        assert_eq!(
            artifact_filename(&HeaderInfo::new(), d, "pdf"),
            "Unknown - VOD 03-07-2025.pdf"
        );
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("Jan ledger (1).xlsx"), "Jan_ledger__1_.xlsx");
        assert_eq!(sanitize_filename("..."), "upload");
    }
}
