use anyhow::{Result, bail};
use tracing::info;

use crate::cli::ManageArgs;
use crate::config::AppConfig;
use crate::confirm::{Confirmer, StdinConfirmer};
use crate::model::Product;
use crate::store::InventoryStore;

/// At most this many matches are offered for selection.
const MAX_MATCHES: usize = 9;

pub fn run(config: AppConfig, args: ManageArgs) -> Result<()> {
    let store = InventoryStore::open(config.paths.inventory_file.clone())?;
    let mut confirmer = StdinConfirmer;
    manage_product(&store, &mut confirmer, &args.query)
}

/// Finds active products matching `query`, lets the user pick one, then
/// marks it consumed or removes it. Index bookkeeping happens against the
/// full list so the store mutates the right row.
pub fn manage_product(
    store: &InventoryStore,
    confirmer: &mut dyn Confirmer,
    query: &str,
) -> Result<()> {
    let query = query.trim();
    if query.is_empty() {
        bail!("search query cannot be empty");
    }

    let products = store.load()?;
    let matches = find_matches(&products, query);
    if matches.is_empty() {
        bail!("no active product matches '{query}'");
    }

    let labels: Vec<String> = matches
        .iter()
        .map(|(_, product)| {
            format!(
                "{} ({}, expires {})",
                product.name, product.category, product.expiry_date
            )
        })
        .collect();
    let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();

    let picked = if matches.len() == 1 {
        0
    } else {
        confirmer.ask_choice("Which product?", &label_refs)?
    };
    let (store_index, product) = &matches[picked];

    let action = confirmer.ask_choice(
        &format!("Action for '{}':", product.name),
        &["Mark as consumed", "Remove from pantry", "Cancel"],
    )?;

    match action {
        0 => {
            if store.mark_consumed(*store_index)? {
                info!(product = %product.name, "marked as consumed");
            }
        }
        1 => {
            if store.remove(*store_index)? {
                info!(product = %product.name, "removed from pantry");
            }
        }
        _ => info!("cancelled"),
    }

    Ok(())
}

/// Case-insensitive substring match over active products, keeping the index
/// into the full stored list.
fn find_matches<'a>(products: &'a [Product], query: &str) -> Vec<(usize, &'a Product)> {
    let needle = query.to_lowercase();
    products
        .iter()
        .enumerate()
        .filter(|(_, product)| {
            !product.consumed && product.name.to_lowercase().contains(&needle)
        })
        .take(MAX_MATCHES)
        .collect()
}
