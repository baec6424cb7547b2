use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::classifier::classify;
use crate::error::{Result, VodError};
use crate::extractor::extract_file;
use crate::fmt::{artifact_filename, display_name};
use crate::models::{Classification, Extraction, HeaderInfo, Overlay, ParseWarning};
use crate::pdf::Renderer;
use crate::reviewer::{apply_overlay, review_items, visible, ReviewItem};
use crate::store::{clean_name, session_of, Store};

/// Extracted and classified ledger, ready to be reviewed or rendered.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub header: HeaderInfo,
    pub warnings: Vec<ParseWarning>,
    pub classification: Classification,
}

impl Analysis {
    pub fn from_extraction(extraction: Extraction) -> Self {
        let classification = classify(&extraction.transactions);
        Self {
            header: extraction.header,
            warnings: extraction.warnings,
            classification,
        }
    }

    pub fn needs_review(&self) -> bool {
        self.classification.needs_review
    }

    pub fn name(&self) -> String {
        self.header
            .get("Name")
            .map(|n| display_name(n))
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

pub fn analyze(path: &Path) -> Result<Analysis> {
    let analysis = Analysis::from_extraction(extract_file(path)?);
    info!(
        file = %path.display(),
        deposits = analysis.classification.transactions.len(),
        needs_review = analysis.needs_review(),
        "analyzed ledger"
    );
    Ok(analysis)
}

/// A rendered document and its download name.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub filename: String,
    pub name: String,
    pub transaction_count: usize,
    pub bytes: Vec<u8>,
}

pub fn finalize(
    analysis: Analysis,
    overlay: &Overlay,
    renderer: &Renderer,
    date: NaiveDate,
) -> Result<Artifact> {
    let name = analysis.name();
    let transactions = apply_overlay(analysis.classification.transactions, overlay);
    let bytes = renderer.render(&analysis.header, &transactions)?;
    Ok(Artifact {
        filename: artifact_filename(&analysis.header, date, "pdf"),
        name,
        transaction_count: visible(&transactions).len(),
        bytes,
    })
}

// ---------------------------------------------------------------------------
// Upload flow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedItem {
    pub output: String,
    pub path: String,
    pub name: String,
    pub transaction_count: usize,
    pub needs_review: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingItem {
    pub file_id: String,
    pub name: String,
    pub needs_review: bool,
    pub usual_amount: Option<rust_decimal::Decimal>,
    pub transaction_count: usize,
    pub review: Vec<ReviewItem>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UploadOutcome {
    Generated(GeneratedItem),
    Pending(PendingItem),
    Failed { error: String },
}

/// Per-file result of an upload or resolve.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub original: String,
    pub success: bool,
    #[serde(flatten)]
    pub outcome: UploadOutcome,
}

impl UploadResult {
    fn failed(original: &str, error: String) -> Self {
        Self {
            original: original.to_string(),
            success: false,
            outcome: UploadOutcome::Failed { error },
        }
    }

    pub fn needs_review(&self) -> bool {
        matches!(self.outcome, UploadOutcome::Pending(_))
    }
}

fn store_artifact(store: &Store, session: &str, artifact: Artifact) -> Result<GeneratedItem> {
    let path = store.write_artifact(session, &artifact.filename, &artifact.bytes)?;
    Ok(GeneratedItem {
        output: artifact.filename,
        path,
        name: artifact.name,
        transaction_count: artifact.transaction_count,
        needs_review: false,
    })
}

fn pending(handle: String, analysis: &Analysis) -> PendingItem {
    PendingItem {
        file_id: handle,
        name: analysis.name(),
        needs_review: true,
        usual_amount: analysis.classification.usual_amount,
        transaction_count: analysis.classification.transactions.len(),
        review: review_items(&analysis.classification),
        warnings: analysis.warnings.iter().map(ToString::to_string).collect(),
    }
}

fn upload_flow(store: &Store, handle: &str, renderer: &Renderer) -> Result<UploadOutcome> {
    let analysis = analyze(&store.upload_path(handle)?)?;
    if analysis.needs_review() {
        return Ok(UploadOutcome::Pending(pending(handle.to_string(), &analysis)));
    }
    let artifact = finalize(analysis, &Overlay::new(), renderer, renderer.today())?;
    store.discard_upload(handle);
    Ok(UploadOutcome::Generated(store_artifact(store, session_of(handle), artifact)?))
}

/// Stage one uploaded workbook and either render it straight away or hold it
/// for review. Failures are reported in the result, never raised.
pub fn process_upload(
    store: &Store,
    session: &str,
    filename: &str,
    bytes: &[u8],
    renderer: &Renderer,
) -> UploadResult {
    if !filename.to_ascii_lowercase().ends_with(".xlsx") {
        return UploadResult::failed(filename, "only .xlsx files are accepted".to_string());
    }
    let handle = match store.stage_upload(session, filename, bytes) {
        Ok(h) => h,
        Err(e) => return UploadResult::failed(filename, e.to_string()),
    };
    match upload_flow(store, &handle, renderer) {
        Ok(outcome) => UploadResult {
            original: filename.to_string(),
            success: true,
            outcome,
        },
        Err(e) => {
            warn!(file = filename, error = %e, "upload failed");
            store.discard_upload(&handle);
            UploadResult::failed(filename, e.to_string())
        }
    }
}

/// Re-run extraction and classification on a held upload, apply the
/// operator's overlay and render. An overlay that leaves any entry without a
/// label is rejected and the upload stays held for another attempt.
pub fn resolve(
    store: &Store,
    handle: &str,
    overlay: &Overlay,
    renderer: &Renderer,
) -> Result<UploadResult> {
    let path = store.upload_path(handle)?;
    let analysis = match analyze(&path) {
        Ok(a) => a,
        Err(e) => {
            store.discard_upload(handle);
            return Err(e);
        }
    };
    require_resolved(&analysis, overlay)?;

    let result = finalize(analysis, overlay, renderer, renderer.today())
        .and_then(|artifact| store_artifact(store, session_of(handle), artifact));
    store.discard_upload(handle);

    let item = result?;
    info!(%handle, output = %item.output, "resolved pending upload");
    Ok(UploadResult {
        original: clean_name(handle).to_string(),
        success: true,
        outcome: UploadOutcome::Generated(item),
    })
}

/// Default batch archive name.
pub fn batch_archive_name(date: NaiveDate) -> String {
    format!("VOD_Batch_{}.zip", date.format("%m-%d-%Y"))
}

pub fn require_resolved(analysis: &Analysis, overlay: &Overlay) -> Result<()> {
    let applied = apply_overlay(analysis.classification.transactions.clone(), overlay);
    let open = crate::reviewer::unresolved(&applied);
    if open.is_empty() {
        Ok(())
    } else {
        Err(VodError::Unresolved(format!(
            "{} transaction(s) still need a label: {:?}",
            open.len(),
            open
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Label, RawTransaction, Status};
    use crate::pdf::RenderAssets;
    use crate::testutil::{deposit, ledger_xlsx};
    use rust_decimal::Decimal;

    fn extraction(amounts: &[(u32, u32, i64)]) -> Extraction {
        let mut header = HeaderInfo::new();
        header.insert("Name".into(), "DOE,JANE".into());
        let transactions = amounts
            .iter()
            .enumerate()
            .map(|(i, &(m, d, a))| {
                let date = NaiveDate::from_ymd_opt(2025, m, d).unwrap();
                RawTransaction {
                    row: 15 + i,
                    date: Some(date),
                    date_text: date.format("%m/%d/%Y").to_string(),
                    description: "AUTO PMT-CHASE SURPLUS".into(),
                    amount: Decimal::from(a),
                }
            })
            .collect();
        Extraction {
            header,
            transactions,
            warnings: vec![],
        }
    }

    fn renderer() -> Renderer {
        Renderer::new(RenderAssets::default()).unwrap()
    }

    #[test]
    fn test_finalize_names_and_counts_visible_rows() {
        let analysis = Analysis::from_extraction(extraction(&[(1, 5, 500), (1, 9, 25), (2, 5, 500)]));
        assert!(analysis.needs_review());
        let mut overlay = Overlay::new();
        overlay.insert(1, Label::Exclude);
        let date = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let artifact = finalize(analysis, &overlay, &renderer(), date).unwrap();
        assert_eq!(artifact.filename, "Doe, Jane - VOD 03-04-2025.pdf");
        assert_eq!(artifact.name, "Doe, Jane");
        assert_eq!(artifact.transaction_count, 2);
        assert!(artifact.bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_require_resolved() {
        let analysis = Analysis::from_extraction(extraction(&[(1, 5, 500), (1, 9, 25), (2, 5, 500)]));
        assert_eq!(analysis.classification.transactions[1].status, Status::NeedsInput);
        assert!(require_resolved(&analysis, &Overlay::new()).is_err());
        let mut overlay = Overlay::new();
        overlay.insert(1, Label::Text("For: December 2024".into()));
        assert!(require_resolved(&analysis, &overlay).is_ok());
    }

    #[test]
    fn test_non_xlsx_upload_fails_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("u"), dir.path().join("o")).unwrap();
        let result = process_upload(&store, "s1", "notes.txt", b"hello", &renderer());
        assert!(!result.success);
        assert!(matches!(result.outcome, UploadOutcome::Failed { .. }));
    }

    #[test]
    fn test_unreadable_workbook_is_reported_and_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("u"), dir.path().join("o")).unwrap();
        let result = process_upload(&store, "s1", "ledger.xlsx", b"not a workbook", &renderer());
        assert!(!result.success);
        assert!(store.upload_path("s1_ledger.xlsx").is_err());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["original"], "ledger.xlsx");
        assert_eq!(json["success"], false);
        assert!(json["error"].is_string());
    }

    #[test]
    fn test_resolve_unknown_handle_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("u"), dir.path().join("o")).unwrap();
        let err = resolve(&store, "s1_gone.xlsx", &Overlay::new(), &renderer()).unwrap_err();
        assert!(matches!(err, VodError::NotFound(_)));
    }

    #[test]
    fn test_pending_payload_shape() {
        let analysis = Analysis::from_extraction(extraction(&[(1, 5, 500), (1, 20, 500)]));
        let item = pending("s1_ledger.xlsx".into(), &analysis);
        let result = UploadResult {
            original: "ledger.xlsx".into(),
            success: true,
            outcome: UploadOutcome::Pending(item),
        };
        assert!(result.needs_review());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["file_id"], "s1_ledger.xlsx");
        assert_eq!(json["needs_review"], true);
        assert_eq!(json["review"][0]["suggested_label"], "For: December 2024");
    }

    fn pending_ledger() -> Vec<u8> {
        ledger_xlsx(&[deposit(2025, 1, 5, 500.0), deposit(2025, 1, 9, 25.5), deposit(2025, 2, 5, 500.0)])
    }

    #[test]
    fn test_clean_upload_is_rendered_and_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("u"), dir.path().join("o")).unwrap();
        let bytes = ledger_xlsx(&[deposit(2025, 1, 5, 500.0), deposit(2025, 2, 5, 500.0)]);

        let result = process_upload(&store, "s1", "Jane.xlsx", &bytes, &renderer());
        assert!(result.success);
        let UploadOutcome::Generated(item) = result.outcome else {
            panic!("expected a generated item");
        };
        assert_eq!(item.name, "Doe, Jane");
        assert_eq!(item.transaction_count, 2);
        assert!(item.path.starts_with("s1_Doe, Jane - VOD "));
        assert!(store.read_artifact(&item.path).unwrap().starts_with(b"%PDF"));
        assert!(store.upload_path("s1_Jane.xlsx").is_err());
    }

    #[test]
    fn test_pending_upload_resolves_to_stored_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("u"), dir.path().join("o")).unwrap();

        let result = process_upload(&store, "s1", "Jane.xlsx", &pending_ledger(), &renderer());
        assert!(result.needs_review());
        let UploadOutcome::Pending(item) = result.outcome else {
            panic!("expected a pending item");
        };
        assert_eq!(item.file_id, "s1_Jane.xlsx");
        assert_eq!(item.review.len(), 1);
        assert_eq!(item.review[0].index, 1);
        assert!(store.upload_path(&item.file_id).is_ok());

        let err = resolve(&store, &item.file_id, &Overlay::new(), &renderer()).unwrap_err();
        assert!(matches!(err, VodError::Unresolved(_)));
        assert!(store.upload_path(&item.file_id).is_ok());

        let mut overlay = Overlay::new();
        overlay.insert(1, Label::Exclude);
        let resolved = resolve(&store, &item.file_id, &overlay, &renderer()).unwrap();
        assert_eq!(resolved.original, "Jane.xlsx");
        let UploadOutcome::Generated(generated) = resolved.outcome else {
            panic!("expected a generated item");
        };
        assert_eq!(generated.transaction_count, 2);
        assert!(store.read_artifact(&generated.path).unwrap().starts_with(b"%PDF"));
        assert!(store.upload_path(&item.file_id).is_err());
    }

    #[test]
    fn test_same_name_upload_keeps_pending_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("u"), dir.path().join("o")).unwrap();

        let first = process_upload(&store, "s1", "ledger.xlsx", &pending_ledger(), &renderer());
        let UploadOutcome::Pending(held) = first.outcome else {
            panic!("expected a pending item");
        };
        let clean = ledger_xlsx(&[deposit(2025, 1, 5, 500.0)]);
        let second = process_upload(&store, "s1", "ledger.xlsx", &clean, &renderer());
        assert!(matches!(second.outcome, UploadOutcome::Generated(_)));

        let mut overlay = Overlay::new();
        overlay.insert(1, Label::Text("For: December 2024".into()));
        let resolved = resolve(&store, &held.file_id, &overlay, &renderer()).unwrap();
        assert!(resolved.success);
        assert_eq!(resolved.original, "ledger.xlsx");
    }

    #[test]
    fn test_batch_archive_name() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 4).unwrap();
        assert_eq!(batch_archive_name(date), "VOD_Batch_07-04-2025.zip");
    }
}
