use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};
use serde_json::json;

use crate::error::{Result, VodError};
use crate::fmt::money;
use crate::models::{Label, Status};
use crate::pipeline::{analyze, Analysis};

pub(crate) fn status_text(status: Status) -> String {
    match status {
        Status::AutoOk => status.as_str().green().to_string(),
        Status::AutoLabeled => status.as_str().yellow().to_string(),
        Status::NeedsInput => status.as_str().red().bold().to_string(),
    }
}

fn print_table(file: &str, analysis: &Analysis) {
    println!("{} ({})", file.bold(), analysis.name());
    if let Some(usual) = analysis.classification.usual_amount {
        println!("Usual amount: {}", money(usual));
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Date", "Description", "Amount", "Status", "Label"]);
    for (i, t) in analysis.classification.transactions.iter().enumerate() {
        let label = match &t.label {
            Some(Label::Text(s)) => s.clone(),
            Some(Label::Exclude) => "(excluded)".to_string(),
            None if t.review_hint => "fee? consider excluding".dimmed().to_string(),
            None => String::new(),
        };
        table.add_row(vec![
            Cell::new(i),
            Cell::new(&t.raw.date_text),
            Cell::new(&t.raw.description),
            Cell::new(money(t.raw.amount)).set_alignment(CellAlignment::Right),
            Cell::new(status_text(t.status)),
            Cell::new(label),
        ]);
    }
    println!("{table}");

    for warning in &analysis.warnings {
        println!("{} {warning}", "warning:".yellow());
    }
    if analysis.needs_review() {
        println!("{}", "Needs review before generating.".yellow().bold());
    } else {
        println!("{}", "Ready to generate.".green());
    }
    println!();
}

fn to_json(file: &str, analysis: &Analysis) -> serde_json::Value {
    json!({
        "file": file,
        "name": analysis.name(),
        "header": analysis.header,
        "needs_review": analysis.needs_review(),
        "usual_amount": analysis.classification.usual_amount,
        "transactions": analysis.classification.transactions,
        "warnings": analysis.warnings,
    })
}

pub fn run(files: &[String], as_json: bool) -> Result<()> {
    let mut failed = 0;
    let mut reports = Vec::new();

    for file in files {
        match analyze(Path::new(file)) {
            Ok(analysis) if as_json => reports.push(to_json(file, &analysis)),
            Ok(analysis) => print_table(file, &analysis),
            Err(e) => {
                failed += 1;
                if as_json {
                    reports.push(json!({ "file": file, "error": e.to_string() }));
                } else {
                    eprintln!("{} {file}: {e}", "failed:".red());
                }
            }
        }
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    if failed > 0 {
        return Err(VodError::Other(format!("{failed} of {} file(s) failed", files.len())));
    }
    Ok(())
}
