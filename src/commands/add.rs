use anyhow::{Result, bail};
use tracing::info;

use crate::cli::AddArgs;
use crate::commands::review;
use crate::config::AppConfig;
use crate::confirm::{AcceptAllConfirmer, Confirmer, StdinConfirmer};
use crate::llm::{LanguageModel, OllamaClient};
use crate::model::Product;
use crate::store::InventoryStore;

pub fn run(config: AppConfig, args: AddArgs) -> Result<()> {
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

    let added = quick_add(
        &config,
        &store,
        llm.as_deref(),
        confirmer.as_mut(),
        args.name.as_deref(),
    )?;

    match added {
        Some(name) => info!(product = %name, "product added"),
        None => info!("nothing added"),
    }

    Ok(())
}

/// The quick-add flow: name, confirmed category, confirmed expiry,
/// optional price. Returns the added product's name, or `None` when the
/// user backed out.
pub fn quick_add(
    config: &AppConfig,
    store: &InventoryStore,
    llm: Option<&dyn LanguageModel>,
    confirmer: &mut dyn Confirmer,
    preset_name: Option<&str>,
) -> Result<Option<String>> {
    let name = match preset_name {
        Some(name) => name.to_string(),
        None => confirmer.ask_line("Product name:")?,
    };
    let name = name.trim().to_string();
    if name.is_empty() {
        bail!("product name cannot be empty");
    }

    let category_llm = llm.filter(|_| config.llm.auto_categorize);
    let Some(category) = review::confirm_category(category_llm, &config.llm, confirmer, &name)?
    else {
        return Ok(None);
    };

    let expiry_llm = llm.filter(|_| config.llm.auto_expiry);
    let expiry = review::confirm_expiry(expiry_llm, &config.llm, confirmer, &name, &category)?;

    let price = review::read_price(confirmer)?;

    let product = Product::new(name.clone(), category, expiry, price)?;
    store.add(product)?;

    Ok(Some(name))
}
