use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::debug;

use crate::config::OcrConfig;

/// One recognized text line with the engine's confidence (0–100).
#[derive(Debug, Clone, PartialEq)]
pub struct OcrLine {
    pub text: String,
    pub confidence: f32,
}

/// Boundary to the character-recognition engine. The engine is a black box
/// that turns an image into text lines with confidence scores.
pub trait TextRecognizer {
    fn recognize(&self, image_path: &Path) -> Result<Vec<OcrLine>>;
}

pub struct TesseractOcr {
    lang: String,
}

impl TesseractOcr {
    pub fn new(config: &OcrConfig) -> Self {
        if config.gpu {
            debug!("gpu flag is set; the tesseract backend runs on CPU and ignores it");
        }
        Self {
            lang: config.lang.clone(),
        }
    }

    pub fn available() -> bool {
        command_available("tesseract")
    }
}

impl TextRecognizer for TesseractOcr {
    fn recognize(&self, image_path: &Path) -> Result<Vec<OcrLine>> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .arg("tsv")
            .output()
            .with_context(|| format!("failed to execute tesseract for {}", image_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "tesseract returned non-zero exit status for {}: {}",
                image_path.display(),
                stderr.trim()
            );
        }

        let tsv = String::from_utf8_lossy(&output.stdout).replace('\u{0000}', "");
        Ok(parse_tsv_lines(&tsv))
    }
}

/// Groups tesseract TSV word rows (level 5) into lines, averaging the word
/// confidences. Rows with negative confidence are layout markers, not
/// words, and are skipped.
pub fn parse_tsv_lines(tsv: &str) -> Vec<OcrLine> {
    fn flush(words: &mut Vec<String>, confidences: &mut Vec<f32>, lines: &mut Vec<OcrLine>) {
        if words.is_empty() {
            return;
        }
        let confidence = confidences.iter().sum::<f32>() / confidences.len() as f32;
        lines.push(OcrLine {
            text: words.join(" "),
            confidence,
        });
        words.clear();
        confidences.clear();
    }

    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current_key: Option<(u32, u32, u32, u32)> = None;
    let mut words: Vec<String> = Vec::new();
    let mut confidences: Vec<f32> = Vec::new();

    for row in tsv.lines().skip(1) {
        let columns: Vec<&str> = row.split('\t').collect();
        if columns.len() < 12 {
            continue;
        }
        if columns[0] != "5" {
            continue;
        }

        let key = (
            columns[1].parse().unwrap_or(0),
            columns[2].parse().unwrap_or(0),
            columns[3].parse().unwrap_or(0),
            columns[4].parse().unwrap_or(0),
        );
        let confidence: f32 = columns[10].parse().unwrap_or(-1.0);
        let text = columns[11].trim();

        if confidence < 0.0 || text.is_empty() {
            continue;
        }

        if current_key != Some(key) {
            flush(&mut words, &mut confidences, &mut lines);
            current_key = Some(key);
        }
        words.push(text.to_string());
        confidences.push(confidence);
    }
    flush(&mut words, &mut confidences, &mut lines);

    lines
}

/// Renders every page of a PDF to PNG images in a fresh temp directory.
/// Returns the page images in page order; the caller removes the directory
/// when done.
pub fn render_pdf_pages(pdf_path: &Path) -> Result<(PathBuf, Vec<PathBuf>)> {
    if !command_available("pdftoppm") {
        bail!("pdftoppm is not available; PDF receipts cannot be processed");
    }

    let stem = pdf_path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("pdf");
    let safe_stem = stem
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() {
                character
            } else {
                '_'
            }
        })
        .collect::<String>();

    let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let work_dir = std::env::temp_dir().join(format!(
        "pantry_pdf_{}_{}_{}",
        safe_stem,
        std::process::id(),
        stamp
    ));
    fs::create_dir_all(&work_dir)
        .with_context(|| format!("failed to create temp directory {}", work_dir.display()))?;

    let prefix = work_dir.join("page");
    let output = Command::new("pdftoppm")
        .arg("-png")
        .arg("-r")
        .arg("300")
        .arg(pdf_path)
        .arg(&prefix)
        .output()
        .with_context(|| format!("failed to execute pdftoppm for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let _ = fs::remove_dir_all(&work_dir);
        bail!(
            "pdftoppm returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    let mut pages = Vec::new();
    for entry in fs::read_dir(&work_dir)
        .with_context(|| format!("failed to read temp directory {}", work_dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        let is_png = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("png"))
            .unwrap_or(false);
        if is_png {
            pages.push(path);
        }
    }

    if pages.is_empty() {
        let _ = fs::remove_dir_all(&work_dir);
        bail!("pdftoppm produced no page images for {}", pdf_path.display());
    }

    // pdftoppm zero-pads page numbers within one invocation, so a name sort
    // is a page-order sort.
    pages.sort();

    Ok((work_dir, pages))
}

pub fn command_available(program: &str) -> bool {
    Command::new(program).arg("--version").output().is_ok()
}
