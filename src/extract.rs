use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::llm::{LanguageModel, LlmError};
use crate::model::CandidateProduct;

const EXTRACTION_SYSTEM_PROMPT: &str = "You are an assistant that reads store receipts. \
Your job is to extract the purchased products from raw OCR text.";

const EXTRACTION_MAX_TOKENS: u32 = 1024;
const EXTRACTION_TEMPERATURE: f32 = 0.1;

/// Why a response line was discarded instead of becoming a candidate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LineSkip {
    #[error("line has no separator")]
    MissingSeparator,
    #[error("line has more than one separator")]
    TooManySeparators,
    #[error("product name is empty or too short")]
    NameTooShort,
    #[error("price is not numeric: {0}")]
    BadPrice(String),
    #[error("price is negative: {0}")]
    NegativePrice(f64),
}

/// Turns raw OCR text into candidate products via the language model.
/// Empty or whitespace-only input short-circuits to an empty list without
/// touching the network. A gateway failure is returned to the caller, who
/// decides how the batch continues.
pub fn extract_candidates(
    llm: &dyn LanguageModel,
    ocr_text: &str,
    config: &LlmConfig,
) -> Result<Vec<CandidateProduct>, LlmError> {
    if ocr_text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let prompt = build_extraction_prompt(ocr_text);
    let response = llm.ask(
        &prompt,
        EXTRACTION_SYSTEM_PROMPT,
        EXTRACTION_MAX_TOKENS.min(config.max_tokens),
        EXTRACTION_TEMPERATURE,
    )?;

    Ok(parse_candidates(&response))
}

fn build_extraction_prompt(ocr_text: &str) -> String {
    format!(
        "Extract the purchased products from the receipt text below. The text \
comes from OCR and may be noisy or in Polish.\n\n\
Rules:\n\
- Output exactly one line per product, in the form NAME|PRICE\n\
- PRICE is the final price actually paid for that item; subtract any \
per-item discount printed next to it\n\
- Skip everything that is not a product: totals, sums, tax lines, \
loyalty-program text, payment details, store name and address\n\
- Do not add any commentary before or after the lines\n\n\
Receipt text:\n{ocr_text}"
    )
}

/// Parses the model's pipe-delimited response. Bad lines are dropped, never
/// fatal: lines without exactly one separator are dropped silently, the
/// rest of the rejects are logged.
pub fn parse_candidates(response: &str) -> Vec<CandidateProduct> {
    let mut candidates = Vec::new();

    for line in response.lines() {
        match parse_candidate_line(line) {
            Ok(candidate) => candidates.push(candidate),
            Err(skip @ (LineSkip::MissingSeparator | LineSkip::TooManySeparators)) => {
                debug!(line, reason = %skip, "skipping response line");
            }
            Err(skip) => {
                warn!(line, reason = %skip, "discarding malformed candidate line");
            }
        }
    }

    candidates
}

/// Parses one `NAME|PRICE` line. Pure; every rejection reason is typed.
pub fn parse_candidate_line(line: &str) -> Result<CandidateProduct, LineSkip> {
    let separator_count = line.matches('|').count();
    if separator_count == 0 {
        return Err(LineSkip::MissingSeparator);
    }
    if separator_count > 1 {
        return Err(LineSkip::TooManySeparators);
    }

    let Some((raw_name, raw_price)) = line.split_once('|') else {
        return Err(LineSkip::MissingSeparator);
    };

    let name = raw_name.trim();
    if name.chars().count() <= 1 {
        return Err(LineSkip::NameTooShort);
    }

    let price = parse_price_token(raw_price)?;
    if price < 0.0 {
        return Err(LineSkip::NegativePrice(price));
    }

    Ok(CandidateProduct {
        name: name.to_string(),
        price,
    })
}

/// Normalizes a price token: comma decimal separator becomes a dot, and a
/// trailing currency suffix ("zł", "PLN", "A") is stripped.
fn parse_price_token(token: &str) -> Result<f64, LineSkip> {
    let normalized = token.trim().replace(',', ".");
    let trimmed = normalized
        .trim_end_matches(|character: char| !character.is_ascii_digit() && character != '.')
        .trim();

    trimmed
        .parse::<f64>()
        .map_err(|_| LineSkip::BadPrice(token.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::MockLlm;

    #[test]
    fn parses_plain_line() {
        let candidate = parse_candidate_line("Mleko 3,2%|4.99").unwrap();
        assert_eq!(candidate.name, "Mleko 3,2%");
        assert_eq!(candidate.price, 4.99);
    }

    #[test]
    fn normalizes_comma_decimal_and_currency_suffix() {
        assert_eq!(parse_candidate_line("Chleb żytni|6,50").unwrap().price, 6.50);
        assert_eq!(parse_candidate_line("Masło|7,49 zł").unwrap().price, 7.49);
        assert_eq!(parse_candidate_line("Woda|2.50 PLN").unwrap().price, 2.50);
    }

    #[test]
    fn rejects_missing_separator() {
        assert_eq!(
            parse_candidate_line("SUMA PLN 11,49"),
            Err(LineSkip::MissingSeparator)
        );
    }

    #[test]
    fn rejects_multiple_separators() {
        assert_eq!(
            parse_candidate_line("a|b|c"),
            Err(LineSkip::TooManySeparators)
        );
    }

    #[test]
    fn rejects_short_names() {
        assert_eq!(parse_candidate_line("|4.99"), Err(LineSkip::NameTooShort));
        assert_eq!(parse_candidate_line("x|4.99"), Err(LineSkip::NameTooShort));
        // Multi-byte single character is still one character.
        assert_eq!(parse_candidate_line("ż|4.99"), Err(LineSkip::NameTooShort));
    }

    #[test]
    fn rejects_non_numeric_price() {
        assert!(matches!(
            parse_candidate_line("Mleko|free"),
            Err(LineSkip::BadPrice(_))
        ));
        assert!(matches!(
            parse_candidate_line("Mleko|"),
            Err(LineSkip::BadPrice(_))
        ));
    }

    #[test]
    fn rejects_negative_price() {
        assert!(matches!(
            parse_candidate_line("Rabat|-2.00"),
            Err(LineSkip::NegativePrice(_))
        ));
    }

    #[test]
    fn parse_candidates_keeps_good_lines_only() {
        let response = "Mleko 3,2%|4.99\nnoise without separator\nx|1.00\nChleb żytni|6.50";
        let candidates = parse_candidates(response);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name, "Mleko 3,2%");
        assert_eq!(candidates[1].name, "Chleb żytni");
    }

    #[test]
    fn empty_input_makes_no_gateway_call() {
        let llm = MockLlm::with_answers(vec!["should never be used"]);
        let config = LlmConfig::default();

        assert!(extract_candidates(&llm, "", &config).unwrap().is_empty());
        assert!(extract_candidates(&llm, "   \n\t", &config).unwrap().is_empty());
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn receipt_text_round_trip() {
        // OCR text with a totals line; the mocked model already excludes it
        // and the parser must not resurrect it.
        let llm = MockLlm::with_answers(vec!["Mleko 3,2%|4.99\nChleb żytni|6.50"]);
        let config = LlmConfig::default();
        let ocr_text = "MLEKO 3,2%   4,99\nCHLEB ŻYTNI   6,50\nSUMA PLN   11,49";

        let candidates = extract_candidates(&llm, ocr_text, &config).unwrap();

        assert_eq!(
            candidates,
            vec![
                CandidateProduct {
                    name: "Mleko 3,2%".to_string(),
                    price: 4.99
                },
                CandidateProduct {
                    name: "Chleb żytni".to_string(),
                    price: 6.50
                },
            ]
        );
        assert_eq!(llm.call_count(), 1);
    }

    #[test]
    fn gateway_failure_is_surfaced() {
        let llm = MockLlm::failing();
        let config = LlmConfig::default();

        let result = extract_candidates(&llm, "some receipt text", &config);
        assert!(matches!(result, Err(LlmError::Upstream { status: 500, .. })));
    }
}
