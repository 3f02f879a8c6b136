use std::fs;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::info;

use crate::cli::RecipesArgs;
use crate::config::AppConfig;
use crate::llm::{LanguageModel, OllamaClient};
use crate::model::Product;
use crate::store::InventoryStore;
use crate::util::now_utc_string;

const RECIPES_SYSTEM_PROMPT: &str = "You are an experienced cook who builds simple, tasty \
recipes from whatever ingredients are at hand, preferring the ones that are about to spoil.";

const RECIPES_MAX_TOKENS: u32 = 800;
const RECIPES_TEMPERATURE: f32 = 0.7;

/// How many pantry items are offered to the model; more just dilutes the
/// answer.
const MAX_INGREDIENTS: usize = 8;
const MAX_PRIORITY: usize = 4;

pub fn run(config: AppConfig, args: RecipesArgs) -> Result<()> {
    if !config.llm.enabled {
        bail!("recipe suggestions require the language model; set llm.enabled in the configuration");
    }

    let store = InventoryStore::open(config.paths.inventory_file.clone())?;
    let mut active: Vec<Product> = store
        .load()?
        .into_iter()
        .filter(|product| !product.consumed)
        .collect();

    if active.is_empty() {
        info!("the pantry is empty; nothing to cook with");
        return Ok(());
    }

    active.sort_by(|a, b| a.expiry_date.cmp(&b.expiry_date));

    let today = Utc::now().date_naive();
    let ingredients: Vec<&str> = active
        .iter()
        .take(MAX_INGREDIENTS)
        .map(|product| product.name.as_str())
        .collect();
    let priority: Vec<&str> = active
        .iter()
        .filter(|product| {
            product.days_until_expiry(today) <= config.notifications.expiry_critical_days
        })
        .take(MAX_PRIORITY)
        .map(|product| product.name.as_str())
        .collect();

    let prompt = build_recipes_prompt(&ingredients, &priority, &config.interface.language);

    let llm = OllamaClient::new(&config.llm)?;
    let answer = llm.ask(
        &prompt,
        RECIPES_SYSTEM_PROMPT,
        RECIPES_MAX_TOKENS.min(config.llm.max_tokens),
        RECIPES_TEMPERATURE,
    )?;

    println!("{answer}");

    if let Some(path) = args.output {
        let header = format!(
            "Recipe suggestions — {}\nIngredients: {}\n\n",
            now_utc_string(),
            ingredients.join(", ")
        );
        fs::write(&path, header + &answer)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "saved recipe suggestions");
    }

    Ok(())
}

fn build_recipes_prompt(ingredients: &[&str], priority: &[&str], language: &str) -> String {
    let priority_text = if priority.is_empty() {
        "none".to_string()
    } else {
        priority.join(", ")
    };

    format!(
        "Suggest 3 simple recipes from these available ingredients.\n\n\
AVAILABLE INGREDIENTS:\n{}\n\n\
USE FIRST (expiring soon):\n{priority_text}\n\n\
Requirements:\n\
- at most 30 minutes of preparation\n\
- use as many of the available ingredients as possible\n\
- prioritize the expiring ones\n\
- answer in the language with ISO code '{language}'\n\n\
For each recipe give its name, the ingredient list, and short preparation steps.",
        ingredients.join(", ")
    )
}
