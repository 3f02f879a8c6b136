use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::cli::ImportArgs;
use crate::commands::review;
use crate::config::AppConfig;
use crate::confirm::{AcceptAllConfirmer, Confirmer, StdinConfirmer};
use crate::llm::{LanguageModel, OllamaClient};
use crate::model::{CandidateProduct, Product, ReceiptRecord};
use crate::store::InventoryStore;
use crate::util::{move_into_dir, read_json};

#[derive(Debug, Default, PartialEq)]
pub struct ImportSummary {
    pub records: usize,
    pub committed: usize,
    pub skipped: usize,
}

pub fn run(config: AppConfig, args: ImportArgs) -> Result<()> {
    let store = InventoryStore::open(config.paths.inventory_file.clone())?;

    let llm: Option<Box<dyn LanguageModel>> = if config.llm.enabled {
        Some(Box::new(OllamaClient::new(&config.llm)?))
    } else {
        None
    };

    let mut confirmer: Box<dyn Confirmer> = if args.yes {
        Box::new(AcceptAllConfirmer)
    } else {
        Box::new(StdinConfirmer)
    };

    let summary = import_pending(
        &config,
        &store,
        llm.as_deref(),
        confirmer.as_mut(),
        args.receipt.as_deref(),
    )?;

    if summary.records == 0 {
        info!("no extracted receipts waiting for import");
    } else {
        info!(
            records = summary.records,
            committed = summary.committed,
            skipped = summary.skipped,
            "import finished"
        );
    }

    Ok(())
}

/// Reconciles every pending receipt record: per candidate, confirm
/// category and expiry, then append to the store one product at a time so
/// a failure mid-record keeps what was already committed. The record file
/// is archived afterwards no matter how many candidates made it — a
/// zero-commit record must not be reprocessed forever.
pub fn import_pending(
    config: &AppConfig,
    store: &InventoryStore,
    llm: Option<&dyn LanguageModel>,
    confirmer: &mut dyn Confirmer,
    only: Option<&str>,
) -> Result<ImportSummary> {
    let mut pending = discover_records(&config.paths.data)?;
    if let Some(wanted) = only {
        pending.retain(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name == wanted)
                .unwrap_or(false)
        });
    }

    let mut summary = ImportSummary::default();

    for record_path in pending {
        let record: ReceiptRecord = match read_json(&record_path) {
            Ok(record) => record,
            Err(parse_error) => {
                warn!(file = %record_path.display(), error = %parse_error, "skipping unreadable record");
                continue;
            }
        };

        let record_id = record_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("receipt.json")
            .to_string();

        summary.records += 1;
        info!(
            record = %record_id,
            source = %record.source_filename,
            candidates = record.candidate_products.len(),
            "importing receipt"
        );

        for candidate in &record.candidate_products {
            match reconcile_candidate(config, llm, confirmer, candidate, &record_id)? {
                Some(product) => {
                    let name = product.name.clone();
                    match store.add(product) {
                        Ok(()) => summary.committed += 1,
                        Err(store_error) => {
                            // Abort this item only; the loop carries on.
                            error!(product = %name, error = %store_error, "failed to persist product");
                            summary.skipped += 1;
                        }
                    }
                }
                None => summary.skipped += 1,
            }
        }

        if let Err(move_error) = move_into_dir(&record_path, &config.paths.archive) {
            warn!(file = %record_path.display(), error = %move_error, "could not archive record");
        }
    }

    Ok(summary)
}

/// One candidate through the confirmation gauntlet. `None` means the user
/// skipped it or the candidate failed validation.
fn reconcile_candidate(
    config: &AppConfig,
    llm: Option<&dyn LanguageModel>,
    confirmer: &mut dyn Confirmer,
    candidate: &CandidateProduct,
    record_id: &str,
) -> Result<Option<Product>> {
    println!("\n{} ({:.2})", candidate.name, candidate.price);

    let category_llm = llm.filter(|_| config.llm.auto_categorize);
    let Some(category) =
        review::confirm_category(category_llm, &config.llm, confirmer, &candidate.name)?
    else {
        return Ok(None);
    };

    let expiry_llm = llm.filter(|_| config.llm.auto_expiry);
    let expiry =
        review::confirm_expiry(expiry_llm, &config.llm, confirmer, &candidate.name, &category)?;

    match Product::new(
        candidate.name.clone(),
        category,
        expiry,
        Some(candidate.price),
    ) {
        Ok(product) => Ok(Some(product.with_source_receipt(record_id))),
        Err(validation_error) => {
            warn!(
                record = record_id,
                name = %candidate.name,
                error = %validation_error,
                "candidate failed validation"
            );
            Ok(None)
        }
    }
}

fn discover_records(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(data_dir).with_context(|| format!("failed to read {}", data_dir.display()))?;

    let mut records = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", data_dir.display()))?;
        let path = entry.path();
        let is_record = path.is_file()
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with("receipt_") && name.ends_with(".json"))
                .unwrap_or(false);
        if is_record {
            records.push(path);
        }
    }

    records.sort();
    Ok(records)
}
