use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::IngestArgs;
use crate::config::AppConfig;
use crate::extract;
use crate::llm::{LanguageModel, OllamaClient};
use crate::model::{CandidateProduct, ReceiptRecord};
use crate::ocr::{self, OcrLine, TesseractOcr, TextRecognizer};
use crate::util::{move_into_dir, now_utc_string, sha256_file, utc_stamp, write_json_pretty};

const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

pub fn run(mut config: AppConfig, args: IngestArgs) -> Result<()> {
    if let Some(lang) = args.ocr_lang {
        config.ocr.lang = lang;
    }
    if let Some(inbox) = args.inbox {
        config.paths.inbox = inbox;
    }

    // Extraction cannot produce candidates without the model, so refusing
    // up front beats erroring every receipt into the error folder.
    if !config.llm.enabled {
        bail!("receipt ingestion requires the language model; set llm.enabled in the configuration");
    }
    if !TesseractOcr::available() {
        bail!("tesseract is not available on PATH; install it to process receipts");
    }

    let recognizer = TesseractOcr::new(&config.ocr);
    let llm = OllamaClient::new(&config.llm)?;

    let (succeeded, failed) = process_all(&config, &recognizer, &llm)?;
    info!(succeeded, failed, "receipt processing finished");

    Ok(())
}

/// Drives every supported file in the inbox through the per-receipt state
/// machine. One receipt failing never aborts the batch; failed sources end
/// up in the error folder.
pub fn process_all(
    config: &AppConfig,
    recognizer: &dyn TextRecognizer,
    llm: &dyn LanguageModel,
) -> Result<(usize, usize)> {
    let files = discover_receipts(&config.paths.inbox)?;
    if files.is_empty() {
        info!(inbox = %config.paths.inbox.display(), "no receipts to process");
        return Ok((0, 0));
    }

    let mut succeeded = 0_usize;
    let mut failed = 0_usize;

    for path in files {
        let outcome = if has_extension(&path, "pdf") {
            process_pdf(config, recognizer, llm, &path)
        } else {
            process_image(config, recognizer, llm, &path)
        };

        match outcome {
            Ok(()) => succeeded += 1,
            Err(error) => {
                failed += 1;
                warn!(file = %path.display(), error = %error, "receipt failed; routing to error folder");
                if let Err(move_error) = move_into_dir(&path, &config.paths.errors) {
                    warn!(file = %path.display(), error = %move_error, "could not move failed receipt");
                }
            }
        }
    }

    Ok((succeeded, failed))
}

/// One image receipt: recognize, extract, persist, archive. The archive
/// move is the only non-fatal step; everything persisted before it stays
/// valid.
fn process_image(
    config: &AppConfig,
    recognizer: &dyn TextRecognizer,
    llm: &dyn LanguageModel,
    path: &Path,
) -> Result<()> {
    let source_name = file_name_string(path)?;
    let (raw_text, candidates) = recognize_and_extract(config, recognizer, llm, path, &source_name)?;

    let record = ReceiptRecord {
        source_filename: source_name,
        processing_timestamp: now_utc_string(),
        source_sha256: sha256_file(path)?,
        raw_ocr_text: raw_text,
        candidate_products: candidates,
    };
    let record_path = persist_record(config, &record, None)?;
    info!(
        record = %record_path.display(),
        candidates = record.candidate_products.len(),
        "receipt extracted"
    );

    archive_source(config, path);
    Ok(())
}

/// One PDF receipt: every page becomes its own sub-run with its own
/// record. The PDF archives when at least one page succeeded, otherwise it
/// is treated as failed.
fn process_pdf(
    config: &AppConfig,
    recognizer: &dyn TextRecognizer,
    llm: &dyn LanguageModel,
    path: &Path,
) -> Result<()> {
    let source_name = file_name_string(path)?;
    let source_sha256 = sha256_file(path)?;
    let (work_dir, pages) = ocr::render_pdf_pages(path)?;

    let mut succeeded_pages = 0_usize;
    for (index, page_image) in pages.iter().enumerate() {
        let page_label = format!("{}#page-{}", source_name, index + 1);

        match recognize_and_extract(config, recognizer, llm, page_image, &page_label) {
            Ok((raw_text, candidates)) => {
                let record = ReceiptRecord {
                    source_filename: page_label.clone(),
                    processing_timestamp: now_utc_string(),
                    source_sha256: source_sha256.clone(),
                    raw_ocr_text: raw_text,
                    candidate_products: candidates,
                };
                match persist_record(config, &record, Some(index + 1)) {
                    Ok(record_path) => {
                        succeeded_pages += 1;
                        info!(
                            record = %record_path.display(),
                            candidates = record.candidate_products.len(),
                            "receipt page extracted"
                        );
                    }
                    Err(error) => {
                        warn!(page = %page_label, error = %error, "failed to persist page record");
                    }
                }
            }
            Err(error) => {
                warn!(page = %page_label, error = %error, "page yielded no products");
            }
        }
    }

    let _ = fs::remove_dir_all(&work_dir);

    if succeeded_pages == 0 {
        bail!("no page of {} produced candidate products", path.display());
    }

    archive_source(config, path);
    Ok(())
}

/// The fallible middle of the state machine: OCR text that passes the
/// confidence gate, then model extraction. Fails when either stage comes
/// back empty.
fn recognize_and_extract(
    config: &AppConfig,
    recognizer: &dyn TextRecognizer,
    llm: &dyn LanguageModel,
    image_path: &Path,
    source_label: &str,
) -> Result<(String, Vec<CandidateProduct>)> {
    let lines = recognizer
        .recognize(image_path)
        .with_context(|| format!("text recognition failed for {source_label}"))?;

    let raw_text = confident_text(&lines, config.ocr.min_confidence);
    if raw_text.trim().is_empty() {
        bail!("no text passed the confidence threshold in {source_label}");
    }

    let candidates = extract::extract_candidates(llm, &raw_text, &config.llm)
        .with_context(|| format!("candidate extraction failed for {source_label}"))?;
    if candidates.is_empty() {
        bail!("no products extracted from {source_label}");
    }

    Ok((raw_text, candidates))
}

fn confident_text(lines: &[OcrLine], min_confidence: f32) -> String {
    lines
        .iter()
        .filter(|line| line.confidence >= min_confidence)
        .map(|line| line.text.as_str())
        .collect::<Vec<&str>>()
        .join("\n")
}

/// Record names carry a nanosecond timestamp (plus a page suffix for PDF
/// sub-runs), so concurrent runs on one machine cannot collide.
fn persist_record(
    config: &AppConfig,
    record: &ReceiptRecord,
    page: Option<usize>,
) -> Result<PathBuf> {
    let stamp = utc_stamp(Utc::now());
    let name = match page {
        Some(number) => format!("receipt_{stamp}_p{number}.json"),
        None => format!("receipt_{stamp}.json"),
    };
    let path = config.paths.data.join(name);
    write_json_pretty(&path, record)?;
    Ok(path)
}

fn archive_source(config: &AppConfig, path: &Path) {
    if let Err(error) = move_into_dir(path, &config.paths.processed) {
        // The record is already persisted; a stuck source file is only
        // worth a warning.
        warn!(file = %path.display(), error = %error, "could not archive processed receipt");
    }
}

fn discover_receipts(inbox: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(inbox).with_context(|| format!("failed to read {}", inbox.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", inbox.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if is_supported_receipt(&path) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn is_supported_receipt(path: &Path) -> bool {
    IMAGE_EXTENSIONS
        .iter()
        .any(|extension| has_extension(path, extension))
        || has_extension(path, "pdf")
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

fn file_name_string(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .with_context(|| format!("invalid UTF-8 file name: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::llm::testing::MockLlm;
    use crate::util::read_json;

    struct FakeRecognizer {
        lines: Vec<OcrLine>,
        fail: bool,
    }

    impl FakeRecognizer {
        fn with_lines(lines: Vec<(&str, f32)>) -> Self {
            Self {
                lines: lines
                    .into_iter()
                    .map(|(text, confidence)| OcrLine {
                        text: text.to_string(),
                        confidence,
                    })
                    .collect(),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                lines: Vec::new(),
                fail: true,
            }
        }
    }

    impl TextRecognizer for FakeRecognizer {
        fn recognize(&self, _image_path: &Path) -> Result<Vec<OcrLine>> {
            if self.fail {
                bail!("simulated recognizer failure");
            }
            Ok(self.lines.clone())
        }
    }

    fn test_config(root: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.paths.inbox = root.join("inbox");
        config.paths.processed = root.join("processed");
        config.paths.errors = root.join("errors");
        config.paths.data = root.join("data");
        config.paths.archive = root.join("archive");
        config.paths.inventory_file = root.join("data/pantry.json");
        crate::config::ensure_layout(&config).unwrap();
        config
    }

    fn drop_receipt(config: &AppConfig, name: &str) -> PathBuf {
        let path = config.paths.inbox.join(name);
        fs::write(&path, b"fake image bytes").unwrap();
        path
    }

    fn data_records(config: &AppConfig) -> Vec<PathBuf> {
        let mut records: Vec<PathBuf> = fs::read_dir(&config.paths.data)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.starts_with("receipt_") && name.ends_with(".json"))
                    .unwrap_or(false)
            })
            .collect();
        records.sort();
        records
    }

    #[test]
    fn successful_receipt_is_persisted_and_archived() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        drop_receipt(&config, "paragon.jpg");

        let recognizer = FakeRecognizer::with_lines(vec![
            ("MLEKO 3,2% 4,99", 95.0),
            ("SUMA PLN 4,99", 92.0),
        ]);
        let llm = MockLlm::with_answers(vec!["Mleko 3,2%|4.99"]);

        let (succeeded, failed) = process_all(&config, &recognizer, &llm).unwrap();
        assert_eq!((succeeded, failed), (1, 0));

        let records = data_records(&config);
        assert_eq!(records.len(), 1);
        let record: ReceiptRecord = read_json(&records[0]).unwrap();
        assert_eq!(record.source_filename, "paragon.jpg");
        assert_eq!(record.candidate_products.len(), 1);
        assert_eq!(record.candidate_products[0].name, "Mleko 3,2%");
        assert!(record.raw_ocr_text.contains("MLEKO"));

        assert!(config.paths.processed.join("paragon.jpg").exists());
        assert!(!config.paths.inbox.join("paragon.jpg").exists());
    }

    #[test]
    fn recognizer_failure_routes_to_error_folder() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        drop_receipt(&config, "blurry.png");

        let recognizer = FakeRecognizer::failing();
        let llm = MockLlm::with_answers(vec![]);

        let (succeeded, failed) = process_all(&config, &recognizer, &llm).unwrap();
        assert_eq!((succeeded, failed), (0, 1));
        assert!(config.paths.errors.join("blurry.png").exists());
        assert!(data_records(&config).is_empty());
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn low_confidence_text_counts_as_empty() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        drop_receipt(&config, "faint.jpg");

        let recognizer = FakeRecognizer::with_lines(vec![("noise", 12.0)]);
        let llm = MockLlm::with_answers(vec!["should not be called"]);

        let (succeeded, failed) = process_all(&config, &recognizer, &llm).unwrap();
        assert_eq!((succeeded, failed), (0, 1));
        assert!(config.paths.errors.join("faint.jpg").exists());
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn empty_extraction_is_a_failure() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        drop_receipt(&config, "totals_only.jpg");

        let recognizer = FakeRecognizer::with_lines(vec![("SUMA PLN 11,49", 96.0)]);
        let llm = MockLlm::with_answers(vec!["no products found"]);

        let (succeeded, failed) = process_all(&config, &recognizer, &llm).unwrap();
        assert_eq!((succeeded, failed), (0, 1));
        assert!(config.paths.errors.join("totals_only.jpg").exists());
    }

    #[test]
    fn one_failure_does_not_abort_the_batch() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        drop_receipt(&config, "a_good.jpg");
        drop_receipt(&config, "b_bad.jpg");

        let recognizer = FakeRecognizer::with_lines(vec![("CHLEB 6,50", 90.0)]);
        // First answer serves the good receipt; the second extraction gets
        // an unparseable answer and fails.
        let llm = MockLlm::with_answers(vec!["Chleb żytni|6.50", "nothing recognizable"]);

        let (succeeded, failed) = process_all(&config, &recognizer, &llm).unwrap();
        assert_eq!((succeeded, failed), (1, 1));
        assert!(config.paths.processed.join("a_good.jpg").exists());
        assert!(config.paths.errors.join("b_bad.jpg").exists());
    }

    #[test]
    fn unsupported_files_are_ignored() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        fs::write(config.paths.inbox.join("notes.txt"), b"not a receipt").unwrap();

        let recognizer = FakeRecognizer::failing();
        let llm = MockLlm::with_answers(vec![]);

        let (succeeded, failed) = process_all(&config, &recognizer, &llm).unwrap();
        assert_eq!((succeeded, failed), (0, 0));
        assert!(config.paths.inbox.join("notes.txt").exists());
    }

    #[test]
    fn gateway_failure_fails_the_receipt_but_not_the_batch() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        drop_receipt(&config, "receipt.jpg");

        let recognizer = FakeRecognizer::with_lines(vec![("MLEKO 4,99", 95.0)]);
        let llm = MockLlm::failing();

        let (succeeded, failed) = process_all(&config, &recognizer, &llm).unwrap();
        assert_eq!((succeeded, failed), (0, 1));
        assert!(config.paths.errors.join("receipt.jpg").exists());
    }

    #[test]
    fn record_names_are_unique_per_receipt() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        drop_receipt(&config, "one.jpg");
        drop_receipt(&config, "two.jpg");

        let recognizer = FakeRecognizer::with_lines(vec![("MLEKO 4,99", 95.0)]);
        let llm = MockLlm::with_answers(vec!["Mleko|4.99", "Mleko|4.99"]);

        let (succeeded, _) = process_all(&config, &recognizer, &llm).unwrap();
        assert_eq!(succeeded, 2);
        assert_eq!(data_records(&config).len(), 2);
    }
}
