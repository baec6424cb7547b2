use std::fs::{File, OpenOptions};
use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Result, VodError};
use crate::fmt::sanitize_filename;
use crate::settings::Settings;

/// Transient per-session files: staged uploads awaiting review and rendered
/// artifacts awaiting download.
#[derive(Debug, Clone)]
pub struct Store {
    uploads: PathBuf,
    outputs: PathBuf,
}

impl Store {
    pub fn open(uploads: PathBuf, outputs: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&uploads)?;
        std::fs::create_dir_all(&outputs)?;
        Ok(Self { uploads, outputs })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::open(settings.uploads_dir(), settings.outputs_dir())
    }

    pub fn new_session() -> String {
        uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
    }

    /// Write an upload under `<session>_<sanitised name>` and return that
    /// handle. A name already taken in the session gets `<session>-<n>_…`.
    pub fn stage_upload(&self, session: &str, filename: &str, bytes: &[u8]) -> Result<String> {
        let (handle, mut file) = create_unique(&self.uploads, session, &sanitize_filename(filename))?;
        file.write_all(bytes)?;
        debug!(%handle, size = bytes.len(), "staged upload");
        Ok(handle)
    }

    pub fn upload_path(&self, handle: &str) -> Result<PathBuf> {
        existing(&self.uploads, handle, "pending file")
    }

    pub fn discard_upload(&self, handle: &str) {
        if let Ok(path) = self.upload_path(handle) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(%handle, "discarded upload"),
                Err(e) => tracing::warn!(%handle, error = %e, "failed to remove upload"),
            }
        }
    }

    /// Store a rendered artifact and return its stored name.
    pub fn write_artifact(&self, session: &str, filename: &str, bytes: &[u8]) -> Result<String> {
        let (stored, mut file) = create_unique(&self.outputs, session, filename)?;
        file.write_all(bytes)?;
        info!(artifact = %stored, "wrote artifact");
        Ok(stored)
    }

    pub fn artifact_path(&self, name: &str) -> Result<PathBuf> {
        existing(&self.outputs, name, "artifact")
    }

    pub fn read_artifact(&self, name: &str) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.artifact_path(name)?)?)
    }

    /// Zip the named artifacts under their clean names. Names that do not
    /// resolve to a stored artifact are skipped.
    pub fn bundle(&self, names: &[String]) -> Result<Vec<u8>> {
        let entries: Vec<(String, PathBuf)> = names
            .iter()
            .filter_map(|name| {
                let path = self.artifact_path(name).ok()?;
                Some((clean_name(name).to_string(), path))
            })
            .collect();
        bundle_paths(&entries)
    }
}

fn checked_component(name: &str) -> Result<&str> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(VodError::NotFound(name.to_string()));
    }
    Ok(name)
}

/// Create `<session>_<name>` exclusively, falling back to `<session>-2_<name>`,
/// `<session>-3_<name>`, … while the name is taken.
fn create_unique(dir: &Path, session: &str, name: &str) -> Result<(String, File)> {
    let mut n = 1u32;
    loop {
        let stored = if n == 1 {
            format!("{session}_{name}")
        } else {
            format!("{session}-{n}_{name}")
        };
        let path = dir.join(checked_component(&stored)?);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((stored, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Session prefix of a stored name (`abcd1234-2_x.xlsx` → `abcd1234-2`).
pub fn session_of(stored: &str) -> &str {
    stored.split_once('_').map_or(stored, |(s, _)| s)
}

fn existing(dir: &Path, name: &str, what: &str) -> Result<PathBuf> {
    let path = dir.join(checked_component(name)?);
    if path.is_file() {
        Ok(path)
    } else {
        Err(VodError::NotFound(format!("{what} {name}")))
    }
}

/// Stored name with its session prefix removed.
pub fn clean_name(stored: &str) -> &str {
    match stored.split_once('_') {
        Some((_, rest)) => rest,
        None => stored,
    }
}

/// Build a deflated zip from `(entry name, source file)` pairs.
pub fn bundle_paths(entries: &[(String, PathBuf)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, path) in entries {
        let bytes = std::fs::read(path)?;
        zip.start_file(name.as_str(), options)?;
        zip.write_all(&bytes)?;
    }
    let cursor = zip.finish()?;
    debug!(files = entries.len(), "bundled artifacts");
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("uploads"), dir.path().join("outputs")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_session_ids_are_short_hex() {
        let id = Store::new_session();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, Store::new_session());
    }

    #[test]
    fn test_stage_and_discard_upload() {
        let (_dir, store) = store();
        let handle = store.stage_upload("abcd1234", "../Jane Doe.xlsx", b"data").unwrap();
        assert_eq!(handle, "abcd1234_Jane_Doe.xlsx");
        assert!(store.upload_path(&handle).is_ok());
        store.discard_upload(&handle);
        assert!(matches!(store.upload_path(&handle), Err(VodError::NotFound(_))));
    }

    #[test]
    fn test_same_name_in_one_session_gets_distinct_handles() {
        let (_dir, store) = store();
        let first = store.stage_upload("abcd1234", "ledger.xlsx", b"first").unwrap();
        let second = store.stage_upload("abcd1234", "ledger.xlsx", b"second").unwrap();
        assert_eq!(first, "abcd1234_ledger.xlsx");
        assert_eq!(second, "abcd1234-2_ledger.xlsx");
        assert_eq!(clean_name(&second), "ledger.xlsx");
        assert_eq!(session_of(&second), "abcd1234-2");

        store.discard_upload(&second);
        let kept = std::fs::read(store.upload_path(&first).unwrap()).unwrap();
        assert_eq!(kept, b"first");
    }

    #[test]
    fn test_artifacts_never_overwrite() {
        let (_dir, store) = store();
        let a = store.write_artifact("s1", "Doe - VOD.pdf", b"a").unwrap();
        let b = store.write_artifact("s1", "Doe - VOD.pdf", b"b").unwrap();
        assert_ne!(a, b);
        assert_eq!(store.read_artifact(&a).unwrap(), b"a");
        assert_eq!(store.read_artifact(&b).unwrap(), b"b");
    }

    #[test]
    fn test_traversal_is_not_found() {
        let (_dir, store) = store();
        for name in ["../settings.json", "..", "a/b.pdf", "", ".hidden"] {
            assert!(matches!(store.artifact_path(name), Err(VodError::NotFound(_))), "{name}");
        }
    }

    #[test]
    fn test_clean_name_strips_session() {
        assert_eq!(clean_name("abcd1234_Doe, Jane - VOD 01-02-2025.pdf"), "Doe, Jane - VOD 01-02-2025.pdf");
        assert_eq!(clean_name("abcd1234_a_b.pdf"), "a_b.pdf");
        assert_eq!(clean_name("plain.pdf"), "plain.pdf");
    }

    #[test]
    fn test_bundle_skips_missing_and_uses_clean_names() {
        let (_dir, store) = store();
        let stored = store.write_artifact("abcd1234", "Doe, Jane - VOD 01-02-2025.pdf", b"%PDF-1").unwrap();
        let zip_bytes = store
            .bundle(&[stored.clone(), "abcd1234_missing.pdf".to_string()])
            .unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(zip_bytes)).unwrap();
        assert_eq!(archive.len(), 1);
        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "Doe, Jane - VOD 01-02-2025.pdf");
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"%PDF-1");
    }

    #[test]
    fn test_read_artifact() {
        let (_dir, store) = store();
        let stored = store.write_artifact("s1", "out.pdf", b"bytes").unwrap();
        assert_eq!(store.read_artifact(&stored).unwrap(), b"bytes");
        assert!(matches!(store.read_artifact("s1_nope.pdf"), Err(VodError::NotFound(_))));
    }
}
