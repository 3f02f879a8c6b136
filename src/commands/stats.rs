use std::collections::HashMap;
use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::cli::StatsArgs;
use crate::config::{AppConfig, NotificationConfig};
use crate::model::Product;
use crate::store::InventoryStore;

#[derive(Debug, Serialize, PartialEq)]
pub struct StatsReport {
    pub active_products: usize,
    pub consumed_products: usize,
    pub expiring_within_critical_days: usize,
    pub estimated_value: f64,
    pub top_categories: Vec<CategoryCount>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

pub fn run(config: AppConfig, args: StatsArgs) -> Result<()> {
    let store = InventoryStore::open(config.paths.inventory_file.clone())?;
    let products = store.load()?;
    let today = Utc::now().date_naive();
    let report = build_report(&products, today, &config.notifications);

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &report)
            .context("failed to serialize statistics")?;
        writeln!(output)?;
    } else {
        writeln!(output, "Active products:    {}", report.active_products)?;
        writeln!(output, "Consumed products:  {}", report.consumed_products)?;
        writeln!(
            output,
            "Expiring within {} days: {}",
            config.notifications.expiry_critical_days, report.expiring_within_critical_days
        )?;
        writeln!(output, "Estimated value:    {:.2}", report.estimated_value)?;
        writeln!(output, "Top categories:")?;
        for entry in &report.top_categories {
            writeln!(output, "  {:<20} {}", entry.category, entry.count)?;
        }

        let expiring = expiring_products(&products, today, &config.notifications);
        if !expiring.is_empty() {
            writeln!(output, "\nNeeds attention:")?;
            for product in expiring {
                writeln!(
                    output,
                    "  {} ({}) expires {}",
                    product.name, product.category, product.expiry_date
                )?;
            }
        }
    }
    output.flush()?;

    Ok(())
}

pub fn build_report(
    products: &[Product],
    today: NaiveDate,
    notifications: &NotificationConfig,
) -> StatsReport {
    let active: Vec<&Product> = products.iter().filter(|product| !product.consumed).collect();

    let expiring = active
        .iter()
        .filter(|product| product.days_until_expiry(today) <= notifications.expiry_critical_days)
        .count();

    let estimated_value = active.iter().filter_map(|product| product.price).sum();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for product in &active {
        *counts.entry(product.category.as_str()).or_insert(0) += 1;
    }
    let mut top_categories: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(category, count)| CategoryCount {
            category: category.to_string(),
            count,
        })
        .collect();
    top_categories.sort_by(|a, b| b.count.cmp(&a.count).then(a.category.cmp(&b.category)));
    top_categories.truncate(5);

    StatsReport {
        active_products: active.len(),
        consumed_products: products.len() - active.len(),
        expiring_within_critical_days: expiring,
        estimated_value,
        top_categories,
    }
}

fn expiring_products<'a>(
    products: &'a [Product],
    today: NaiveDate,
    notifications: &NotificationConfig,
) -> Vec<&'a Product> {
    let mut expiring: Vec<&Product> = products
        .iter()
        .filter(|product| {
            !product.consumed
                && product.days_until_expiry(today) <= notifications.expiry_critical_days
        })
        .collect();
    expiring.sort_by(|a, b| a.expiry_date.cmp(&b.expiry_date));
    expiring
}
