use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "pantry",
    version,
    about = "Receipt-driven pantry inventory and shopping assistant"
)]
pub struct Cli {
    /// Path to the JSON configuration file (created on first run)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a single product with suggested category and expiry
    Add(AddArgs),
    /// OCR receipts from the inbox folder and extract candidate products
    Ingest(IngestArgs),
    /// Review extracted receipts and commit products into the pantry
    Import(ImportArgs),
    /// Show pantry contents
    List(ListArgs),
    /// Find a product and mark it consumed or remove it
    Manage(ManageArgs),
    /// Pantry statistics
    Stats(StatsArgs),
    /// Suggest recipes from what is currently in the pantry
    Recipes(RecipesArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Product name; prompted for when omitted
    #[arg(long)]
    pub name: Option<String>,

    /// Accept every suggestion without prompting
    #[arg(long, default_value_t = false)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Override the inbox folder from the configuration
    #[arg(long)]
    pub inbox: Option<PathBuf>,

    /// Override the OCR language(s), e.g. "pol+eng"
    #[arg(long)]
    pub ocr_lang: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// Import only this intermediate record (file name, not path)
    #[arg(long)]
    pub receipt: Option<String>,

    /// Accept every suggestion without prompting
    #[arg(long, default_value_t = false)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Include consumed products
    #[arg(long, default_value_t = false)]
    pub all: bool,

    /// Only show one category
    #[arg(long)]
    pub category: Option<String>,

    /// Emit JSON instead of a table
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ManageArgs {
    /// Name fragment to search for among active products
    pub query: String,
}

#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    /// Emit JSON instead of text
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RecipesArgs {
    /// Also save the suggestions to this file
    #[arg(long)]
    pub output: Option<PathBuf>,
}
