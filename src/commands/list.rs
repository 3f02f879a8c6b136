use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};

use crate::cli::ListArgs;
use crate::config::{AppConfig, InterfaceConfig, NotificationConfig};
use crate::model::Product;
use crate::store::InventoryStore;

pub fn run(config: AppConfig, args: ListArgs) -> Result<()> {
    let store = InventoryStore::open(config.paths.inventory_file.clone())?;
    let mut products = store.load()?;

    if !args.all {
        products.retain(|product| !product.consumed);
    }
    if let Some(category) = &args.category {
        products.retain(|product| product.category.eq_ignore_ascii_case(category.trim()));
    }
    products.sort_by(|a, b| a.expiry_date.cmp(&b.expiry_date));

    let today = Utc::now().date_naive();
    if args.json {
        write_json(&products)
    } else {
        write_table(&products, today, &config.notifications, &config.interface)
    }
}

fn write_json(products: &[Product]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, &products)
        .context("failed to serialize product list")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_table(
    products: &[Product],
    today: NaiveDate,
    notifications: &NotificationConfig,
    interface: &InterfaceConfig,
) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    if products.is_empty() {
        writeln!(output, "The pantry is empty.")?;
        output.flush()?;
        return Ok(());
    }

    writeln!(
        output,
        "{:<4} {:<30} {:<20} {:<12} {:>5}  {:<8} {:>8}",
        "#", "Name", "Category", "Expires", "Days", "Status", "Price"
    )?;
    if interface.table_style == "grid" {
        writeln!(output, "{}", "-".repeat(94))?;
    }

    for (number, product) in products.iter().enumerate() {
        let days = product.days_until_expiry(today);
        let price = product
            .price
            .map(|value| format!("{value:.2}"))
            .unwrap_or_else(|| "-".to_string());
        let status = expiry_status(days, notifications, product.consumed);

        writeln!(
            output,
            "{:<4} {:<30} {:<20} {:<12} {:>5}  {:<8} {:>8}",
            number + 1,
            clip(&product.name, 30),
            clip(&product.category, 20),
            product.expiry_date,
            days,
            colored_status(status, interface.colors_enabled),
            price
        )?;
    }

    output.flush()?;
    Ok(())
}

fn colored_status(status: &'static str, colors_enabled: bool) -> String {
    if !colors_enabled {
        return status.to_string();
    }
    let code = match status {
        "EXPIRED" | "critical" => "\x1b[31m",
        "soon" => "\x1b[33m",
        "ok" => "\x1b[32m",
        _ => "",
    };
    if code.is_empty() {
        status.to_string()
    } else {
        format!("{code}{status}\x1b[0m")
    }
}

fn expiry_status(days: i64, notifications: &NotificationConfig, consumed: bool) -> &'static str {
    if consumed {
        "used"
    } else if days < 0 {
        "EXPIRED"
    } else if days <= notifications.expiry_critical_days {
        "critical"
    } else if days <= notifications.expiry_warning_days {
        "soon"
    } else {
        "ok"
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut clipped: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        clipped.push('…');
        clipped
    }
}
