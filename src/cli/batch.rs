use std::path::{Path, PathBuf};

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::{Result, VodError};
use crate::models::Overlay;
use crate::pdf::Renderer;
use crate::pipeline::{analyze, batch_archive_name, finalize};
use crate::settings::load_settings;
use crate::store::bundle_paths;

enum Outcome {
    Written { name: String, path: PathBuf, count: usize },
    NeedsReview { name: String },
    Failed(String),
}

fn process(file: &str, out_dir: &Path, renderer: &Renderer) -> Outcome {
    let analysis = match analyze(Path::new(file)) {
        Ok(a) => a,
        Err(e) => return Outcome::Failed(e.to_string()),
    };
    if analysis.needs_review() {
        return Outcome::NeedsReview {
            name: analysis.name(),
        };
    }
    let written = finalize(analysis, &Overlay::new(), renderer, renderer.today()).and_then(|a| {
        let path = out_dir.join(&a.filename);
        std::fs::write(&path, &a.bytes)?;
        Ok((a, path))
    });
    match written {
        Ok((a, path)) => Outcome::Written {
            name: a.name,
            path,
            count: a.transaction_count,
        },
        Err(e) => Outcome::Failed(e.to_string()),
    }
}

pub fn run(files: &[String], output_dir: Option<&str>, zip: bool) -> Result<()> {
    let settings = load_settings();
    let renderer = super::renderer(&settings)?;
    let out_dir = output_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| settings.exports_dir());
    std::fs::create_dir_all(&out_dir)?;

    let mut table = Table::new();
    table.set_header(vec!["File", "Name", "Result"]);
    let mut written: Vec<(String, PathBuf)> = Vec::new();
    let mut failed = 0;
    let mut pending = 0;

    for file in files {
        let (name, result) = match process(file, &out_dir, &renderer) {
            Outcome::Written { name, path, count } => {
                let entry = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let result = format!("{} ({count} deposits)", entry).green().to_string();
                written.push((entry, path));
                (name, result)
            }
            Outcome::NeedsReview { name } => {
                pending += 1;
                (name, "needs review".yellow().to_string())
            }
            Outcome::Failed(e) => {
                failed += 1;
                (String::new(), format!("failed: {e}").red().to_string())
            }
        };
        table.add_row(vec![Cell::new(file), Cell::new(name), Cell::new(result)]);
    }
    println!("{table}");
    println!(
        "{} generated, {} need review, {} failed",
        written.len(),
        pending,
        failed
    );
    if pending > 0 {
        println!("Run `vod review <file>` for each file that needs review.");
    }

    if zip && !written.is_empty() {
        let archive = out_dir.join(batch_archive_name(renderer.today()));
        super::write_output(&bundle_paths(&written)?, &archive)?;
    }

    if failed > 0 {
        return Err(VodError::Other(format!("{failed} of {} file(s) failed", files.len())));
    }
    Ok(())
}
