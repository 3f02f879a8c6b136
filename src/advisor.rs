use chrono::{Duration, NaiveDate, Utc};
use regex::Regex;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::llm::LanguageModel;
use crate::model::{CATEGORIES, FALLBACK_CATEGORY};

const SUGGESTION_MAX_TOKENS: u32 = 50;
const SUGGESTION_TEMPERATURE: f32 = 0.1;

pub const DEFAULT_EXPIRY_DAYS: i64 = 7;

const CATEGORY_SYSTEM_PROMPT: &str = "You are an expert at categorizing groceries and \
household goods. Assign each product to one of the predefined categories.";

const EXPIRY_SYSTEM_PROMPT: &str = "You are an expert on food and household product \
storage. Estimate realistic shelf lives.";

/// Asks the model for a category. Falls back to the catch-all label on any
/// gateway failure or on an answer that looks like an error message. The
/// answer is advisory text, not forced into the canonical set; the caller
/// confirms it.
pub fn suggest_category(llm: &dyn LanguageModel, config: &LlmConfig, product_name: &str) -> String {
    let prompt = format!(
        "Assign this product to exactly one of the categories below:\n\
Product: {product_name}\n\n\
Categories:\n{}\n\n\
Answer with the category name only, no explanation.",
        CATEGORIES.join("\n")
    );

    match llm.ask(
        &prompt,
        CATEGORY_SYSTEM_PROMPT,
        SUGGESTION_MAX_TOKENS.min(config.max_tokens),
        SUGGESTION_TEMPERATURE,
    ) {
        Ok(response) => {
            let first_line = response.lines().next().unwrap_or("").trim();
            // A rambling answer is a sign the model ignored the format;
            // coerce it to the fallback instead of storing a sentence.
            if first_line.is_empty()
                || first_line.chars().count() > 60
                || looks_like_error(first_line)
            {
                FALLBACK_CATEGORY.to_string()
            } else {
                first_line.to_string()
            }
        }
        Err(error) => {
            warn!(product = product_name, error = %error, "category suggestion unavailable");
            FALLBACK_CATEGORY.to_string()
        }
    }
}

/// Asks the model for a shelf life in days and returns `today + days`.
/// Falls back to a week from today on any failure.
pub fn suggest_expiry(
    llm: &dyn LanguageModel,
    config: &LlmConfig,
    product_name: &str,
    category: &str,
) -> NaiveDate {
    suggest_expiry_from(llm, config, product_name, category, Utc::now().date_naive())
}

pub fn suggest_expiry_from(
    llm: &dyn LanguageModel,
    config: &LlmConfig,
    product_name: &str,
    category: &str,
    today: NaiveDate,
) -> NaiveDate {
    let fallback = today + Duration::days(DEFAULT_EXPIRY_DAYS);

    let prompt = format!(
        "Estimate the typical shelf life of this product:\n\
Name: {product_name}\n\
Category: {category}\n\n\
Answer with the number of days only, no explanation."
    );

    match llm.ask(
        &prompt,
        EXPIRY_SYSTEM_PROMPT,
        SUGGESTION_MAX_TOKENS.min(config.max_tokens),
        SUGGESTION_TEMPERATURE,
    ) {
        Ok(response) => match first_integer_token(&response) {
            Some(days) => today + Duration::days(days),
            None => {
                debug!(product = product_name, response, "no day count in expiry answer");
                fallback
            }
        },
        Err(error) => {
            warn!(product = product_name, error = %error, "expiry suggestion unavailable");
            fallback
        }
    }
}

/// Finds the first integer-looking token anywhere in the text, so answers
/// like "about 7 days, refrigerated" still parse. Capped at four digits.
pub fn first_integer_token(text: &str) -> Option<i64> {
    let pattern = Regex::new(r"\d{1,4}").ok()?;
    pattern
        .find(text)
        .and_then(|token| token.as_str().parse::<i64>().ok())
}

fn looks_like_error(line: &str) -> bool {
    let lowered = line.to_lowercase();
    lowered.starts_with("error") || lowered.starts_with("błąd")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::MockLlm;

    fn config() -> LlmConfig {
        LlmConfig::default()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    #[test]
    fn first_integer_token_ignores_prose() {
        assert_eq!(first_integer_token("7"), Some(7));
        assert_eq!(first_integer_token("about 14 days"), Some(14));
        assert_eq!(first_integer_token("Days: 3."), Some(3));
        assert_eq!(first_integer_token("no digits here"), None);
    }

    #[test]
    fn suggest_category_returns_first_line() {
        let llm = MockLlm::with_answers(vec!["Dairy\nbecause milk is dairy"]);
        assert_eq!(suggest_category(&llm, &config(), "mleko 3,2%"), "Dairy");
    }

    #[test]
    fn suggest_category_falls_back_on_gateway_failure() {
        let llm = MockLlm::failing();
        assert_eq!(suggest_category(&llm, &config(), "mleko"), "Other");
    }

    #[test]
    fn suggest_category_falls_back_on_error_marker() {
        let llm = MockLlm::with_answers(vec!["Error: model not loaded"]);
        assert_eq!(suggest_category(&llm, &config(), "mleko"), "Other");

        let llm = MockLlm::with_answers(vec![""]);
        assert_eq!(suggest_category(&llm, &config(), "mleko"), "Other");
    }

    #[test]
    fn suggest_category_coerces_rambling_answers() {
        let rambling = "Well, milk is generally considered a dairy product, so I would say \
it belongs to the dairy aisle of the store";
        let llm = MockLlm::with_answers(vec![rambling]);
        assert_eq!(suggest_category(&llm, &config(), "mleko"), "Other");
    }

    #[test]
    fn suggest_expiry_parses_day_count() {
        let llm = MockLlm::with_answers(vec!["3"]);
        let date = suggest_expiry_from(&llm, &config(), "kurczak filet", "Meat/Cold-cuts", today());
        assert_eq!(date, today() + Duration::days(3));
    }

    #[test]
    fn suggest_expiry_parses_day_count_inside_prose() {
        let llm = MockLlm::with_answers(vec!["Roughly 10 days in the fridge."]);
        let date = suggest_expiry_from(&llm, &config(), "ser", "Dairy", today());
        assert_eq!(date, today() + Duration::days(10));
    }

    #[test]
    fn suggest_expiry_falls_back_on_non_numeric_answer() {
        let llm = MockLlm::with_answers(vec!["it depends on storage"]);
        let date = suggest_expiry_from(&llm, &config(), "chleb", "Bread", today());
        assert_eq!(date, today() + Duration::days(DEFAULT_EXPIRY_DAYS));
    }

    #[test]
    fn suggest_expiry_falls_back_on_gateway_failure() {
        let llm = MockLlm::failing();
        let date = suggest_expiry_from(&llm, &config(), "chleb", "Bread", today());
        assert_eq!(date, today() + Duration::days(DEFAULT_EXPIRY_DAYS));
    }
}
