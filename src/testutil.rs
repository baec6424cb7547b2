//! Builds small ledger workbooks in the export layout for tests.
#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;

use chrono::NaiveDate;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

#[derive(Debug, Clone)]
pub enum Value {
    Empty,
    Text(&'static str),
    Number(f64),
    /// Stored as a serial number with a built-in date format.
    Date(NaiveDate),
}

pub fn date(y: i32, m: u32, d: u32) -> Value {
    Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

/// One ledger line: date cell, description, credits cell.
pub type Line = (Value, &'static str, Value);

pub fn deposit(y: i32, m: u32, d: u32, amount: f64) -> Line {
    (date(y, m, d), "AUTO PMT-CHASE SURPLUS", Value::Number(amount))
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn column(col: usize) -> char {
    (b'A' + col as u8) as char
}

fn cell_xml(row: usize, col: usize, value: &Value) -> String {
    let r = format!("{}{}", column(col), row + 1);
    match value {
        Value::Empty => String::new(),
        Value::Text(s) => format!(r#"<c r="{r}" t="inlineStr"><is><t>{}</t></is></c>"#, escape(s)),
        Value::Number(n) => format!(r#"<c r="{r}"><v>{n}</v></c>"#),
        Value::Date(d) => {
            let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap();
            let serial = (*d - epoch).num_days();
            format!(r#"<c r="{r}" s="1"><v>{serial}</v></c>"#)
        }
    }
}

fn sheet_xml(lines: &[Line]) -> String {
    let mut rows: Vec<(usize, Vec<(usize, Value)>)> = vec![
        (7, vec![(0, Value::Text("Name: DOE,JANE")), (3, Value::Text("Account #: 12345"))]),
        (8, vec![(0, Value::Text("Allowance: 50.00")), (3, Value::Text("Direct Deposit #: 998877"))]),
        (9, vec![(0, Value::Text("Date Opened: 01/02/2019")), (3, Value::Text("Current Balance: $1,200.00"))]),
        (10, vec![(0, Value::Text("Res ID: R-77"))]),
        (11, vec![(0, Value::Text("Status: Active"))]),
        (12, vec![(0, Value::Text("Interest Rate: 0.5%"))]),
        (
            14,
            vec![
                (2, Value::Text("Date")),
                (3, Value::Text("Description")),
                (6, Value::Text("Debits")),
                (7, Value::Text("Credits")),
            ],
        ),
    ];
    for (i, (date, description, credits)) in lines.iter().enumerate() {
        rows.push((
            15 + i,
            vec![(2, date.clone()), (3, Value::Text(*description)), (7, credits.clone())],
        ));
    }

    let last = rows.last().map_or(15, |(r, _)| r + 1);
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="{NS_MAIN}"><dimension ref="A8:H{last}"/><sheetData>"#
    );
    for (row, cells) in &rows {
        xml.push_str(&format!(r#"<row r="{}">"#, row + 1));
        for (col, value) in cells {
            xml.push_str(&cell_xml(*row, *col, value));
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// A one-sheet `.xlsx` with the standard header block (Jane Doe) and the
/// given lines below the transaction table header.
pub fn ledger_xlsx(lines: &[Line]) -> Vec<u8> {
    let parts = [
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#.to_string(),
        ),
        (
            "_rels/.rels",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{NS_PKG_REL}"><Relationship Id="rId1" Type="{NS_REL}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
            ),
        ),
        (
            "xl/workbook.xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="{NS_MAIN}" xmlns:r="{NS_REL}"><sheets><sheet name="Ledger" sheetId="1" r:id="rId1"/></sheets></workbook>"#
            ),
        ),
        (
            "xl/_rels/workbook.xml.rels",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{NS_PKG_REL}"><Relationship Id="rId1" Type="{NS_REL}/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="{NS_REL}/styles" Target="styles.xml"/></Relationships>"#
            ),
        ),
        (
            "xl/styles.xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><styleSheet xmlns="{NS_MAIN}"><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#
            ),
        ),
        ("xl/worksheets/sheet1.xml", sheet_xml(lines)),
    ];

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in parts {
        zip.start_file(name, SimpleFileOptions::default()).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

pub fn write_ledger(path: &Path, lines: &[Line]) {
    std::fs::write(path, ledger_xlsx(lines)).unwrap();
}
