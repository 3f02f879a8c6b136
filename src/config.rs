use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::util::{ensure_directory, write_json_pretty};

pub const DEFAULT_CONFIG_PATH: &str = "data/config.json";

/// Process-wide configuration, loaded once at startup and passed by
/// reference into each component. Components never read ambient state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub ocr: OcrConfig,
    pub paths: PathsConfig,
    pub interface: InterfaceConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub model: String,
    pub base_url: String,
    pub timeout_seconds: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    pub auto_categorize: bool,
    pub auto_expiry: bool,
    pub prompt_format: PromptFormat,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "SpeakLeash/bielik-1.5b-v3.0-instruct".to_string(),
            base_url: "http://localhost:11434".to_string(),
            timeout_seconds: 60,
            max_tokens: 1024,
            temperature: 0.1,
            auto_categorize: true,
            auto_expiry: true,
            prompt_format: PromptFormat::default(),
        }
    }
}

/// Chat-turn delimiters expected by the backend's prompt template. The
/// gateway is the only place these are applied; callers never embed them.
/// Defaults match the ChatML template used by the default model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptFormat {
    pub system_prefix: String,
    pub system_suffix: String,
    pub user_prefix: String,
    pub user_suffix: String,
    pub assistant_prefix: String,
}

impl Default for PromptFormat {
    fn default() -> Self {
        Self {
            system_prefix: "<|im_start|>system\n".to_string(),
            system_suffix: "<|im_end|>\n".to_string(),
            user_prefix: "<|im_start|>user\n".to_string(),
            user_suffix: "<|im_end|>\n".to_string(),
            assistant_prefix: "<|im_start|>assistant\n".to_string(),
        }
    }
}

impl PromptFormat {
    pub fn is_plain(&self) -> bool {
        self.system_prefix.is_empty()
            && self.system_suffix.is_empty()
            && self.user_prefix.is_empty()
            && self.user_suffix.is_empty()
            && self.assistant_prefix.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub lang: String,
    /// Recognized for configuration parity; the tesseract backend runs on
    /// CPU and ignores it.
    pub gpu: bool,
    pub min_confidence: f32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            lang: "pol+eng".to_string(),
            gpu: false,
            min_confidence: 40.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub inbox: PathBuf,
    pub processed: PathBuf,
    pub errors: PathBuf,
    pub data: PathBuf,
    pub archive: PathBuf,
    pub inventory_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            inbox: PathBuf::from("receipts/new"),
            processed: PathBuf::from("receipts/processed"),
            errors: PathBuf::from("receipts/errors"),
            data: PathBuf::from("data"),
            archive: PathBuf::from("data/archive"),
            inventory_file: PathBuf::from("data/pantry.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    pub language: String,
    pub colors_enabled: bool,
    pub table_style: String,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            language: "pl".to_string(),
            colors_enabled: true,
            table_style: "grid".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub expiry_critical_days: i64,
    pub expiry_warning_days: i64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            expiry_critical_days: 3,
            expiry_warning_days: 7,
        }
    }
}

/// Loads the configuration, writing a default file on first run. A config
/// file that exists but does not parse is a fatal startup error so user
/// edits are never silently discarded.
pub fn load(path: Option<&Path>) -> Result<AppConfig> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    if path.exists() {
        let config: AppConfig = crate::util::read_json(&path)?;
        return Ok(config);
    }

    let config = AppConfig::default();
    write_json_pretty(&path, &config)
        .with_context(|| format!("failed to write default config: {}", path.display()))?;
    info!(path = %path.display(), "wrote default configuration");

    Ok(config)
}

/// Creates every folder the pipeline relies on. Failure here is the one
/// unrecoverable startup error class.
pub fn ensure_layout(config: &AppConfig) -> Result<()> {
    for dir in [
        &config.paths.inbox,
        &config.paths.processed,
        &config.paths.errors,
        &config.paths.data,
        &config.paths.archive,
    ] {
        ensure_directory(dir)?;
    }

    if let Some(parent) = config.paths.inventory_file.parent() {
        ensure_directory(parent)?;
    }

    Ok(())
}
