use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};

use crate::advisor::{self, DEFAULT_EXPIRY_DAYS};
use crate::config::LlmConfig;
use crate::confirm::Confirmer;
use crate::llm::LanguageModel;
use crate::model::{CATEGORIES, FALLBACK_CATEGORY, is_canonical_category};

// Shared confirmation steps for the quick-add flow and the receipt
// reconciler. `llm` is `None` when suggestions are disabled; defaults are
// applied instead of asking the model.

/// Returns the confirmed category, or `None` when the user skips the
/// product entirely.
pub fn confirm_category(
    llm: Option<&dyn LanguageModel>,
    config: &LlmConfig,
    confirmer: &mut dyn Confirmer,
    product_name: &str,
) -> Result<Option<String>> {
    let suggested = match llm {
        Some(model) => advisor::suggest_category(model, config, product_name),
        None => FALLBACK_CATEGORY.to_string(),
    };

    // The model's answer is advisory text; flag anything outside the
    // canonical set so the user knows they are accepting free text.
    let note = if is_canonical_category(&suggested) {
        ""
    } else {
        " [not a standard category]"
    };

    let decision = confirmer.ask_choice(
        &format!("Category for '{product_name}' (suggested: {suggested}{note})"),
        &["Accept suggestion", "Pick another category", "Skip this product"],
    )?;

    match decision {
        0 => Ok(Some(suggested)),
        1 => {
            let index = confirmer.ask_choice("Choose a category:", &CATEGORIES)?;
            Ok(Some(CATEGORIES[index].to_string()))
        }
        _ => Ok(None),
    }
}

/// Returns the confirmed expiry date. An empty answer accepts the
/// suggestion; malformed dates prompt re-entry.
pub fn confirm_expiry(
    llm: Option<&dyn LanguageModel>,
    config: &LlmConfig,
    confirmer: &mut dyn Confirmer,
    product_name: &str,
    category: &str,
) -> Result<NaiveDate> {
    let suggested = match llm {
        Some(model) => advisor::suggest_expiry(model, config, product_name, category),
        None => Utc::now().date_naive() + Duration::days(DEFAULT_EXPIRY_DAYS),
    };

    loop {
        let entered = confirmer.ask_line(&format!(
            "Expiry date [{suggested}] (YYYY-MM-DD, empty accepts):"
        ))?;
        let entered = entered.trim();
        if entered.is_empty() {
            return Ok(suggested);
        }
        match NaiveDate::parse_from_str(entered, "%Y-%m-%d") {
            Ok(date) => return Ok(date),
            Err(_) => println!("Invalid date '{entered}', expected YYYY-MM-DD."),
        }
    }
}

/// Optional price entry. Accepts a comma decimal separator; negative
/// values prompt re-entry, an empty answer means no price.
pub fn read_price(confirmer: &mut dyn Confirmer) -> Result<Option<f64>> {
    loop {
        let entered = confirmer.ask_line("Price (empty to skip):")?;
        let entered = entered.trim();
        if entered.is_empty() {
            return Ok(None);
        }
        match entered.replace(',', ".").parse::<f64>() {
            Ok(value) if value >= 0.0 => return Ok(Some(value)),
            Ok(_) => println!("Price cannot be negative."),
            Err(_) => println!("Invalid price '{entered}'."),
        }
    }
}
