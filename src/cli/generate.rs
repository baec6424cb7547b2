use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::error::{Result, VodError};
use crate::models::Overlay;
use crate::pipeline::{analyze, finalize, require_resolved};
use crate::reviewer::load_overlay;
use crate::settings::load_settings;

pub fn run(file: &str, labels: Option<&str>, output: Option<&str>, force: bool) -> Result<()> {
    let settings = load_settings();
    let renderer = super::renderer(&settings)?;
    let analysis = analyze(Path::new(file))?;

    for warning in &analysis.warnings {
        eprintln!("{} {warning}", "warning:".yellow());
    }

    let overlay = match labels {
        Some(path) => load_overlay(Path::new(path))?,
        None => Overlay::new(),
    };

    if !force {
        if labels.is_some() {
            require_resolved(&analysis, &overlay)?;
        } else if analysis.needs_review() {
            return Err(VodError::Other(format!(
                "{file} needs review. Run `vod review {file}`, pass --labels, or use --force."
            )));
        }
    }

    let artifact = finalize(analysis, &overlay, &renderer, renderer.today())?;
    let path = output
        .map(PathBuf::from)
        .unwrap_or_else(|| settings.exports_dir().join(&artifact.filename));
    super::write_output(&artifact.bytes, &path)?;
    println!(
        "{} deposit(s) listed for {}",
        artifact.transaction_count, artifact.name
    );
    Ok(())
}
