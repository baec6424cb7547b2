use std::path::{Path, PathBuf};

use crate::error::{Result, VodError};
use crate::store::bundle_paths;

pub fn run(files: &[String], output: &str) -> Result<()> {
    let mut entries: Vec<(String, PathBuf)> = Vec::new();
    for file in files {
        let path = PathBuf::from(file);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .filter(|_| path.is_file())
            .ok_or_else(|| VodError::NotFound(file.clone()))?;
        entries.push((name, path));
    }
    let bytes = bundle_paths(&entries)?;
    super::write_output(&bytes, Path::new(output))?;
    println!("{} file(s) bundled", entries.len());
    Ok(())
}
