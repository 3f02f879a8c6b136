use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Compact timestamp with nanoseconds, used for collision-free artifact
/// names on a single machine.
pub fn utc_stamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%S%fZ").to_string()
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("failed to open file for hashing: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 16384];
    loop {
        let count = file
            .read(&mut buf)
            .with_context(|| format!("failed to read file for hashing: {}", path.display()))?;
        if count == 0 {
            break;
        }
        hasher.update(&buf[..count]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;

    let mut file = File::create(path)
        .with_context(|| format!("failed to create json file: {}", path.display()))?;
    file.write_all(&data)
        .with_context(|| format!("failed to write json file: {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("failed to finalize json file: {}", path.display()))?;

    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Moves a file into `target_dir`, keeping its name. Falls back to
/// copy-then-remove when a plain rename crosses filesystems.
pub fn move_into_dir(path: &Path, target_dir: &Path) -> Result<PathBuf> {
    ensure_directory(target_dir)?;

    let name = path
        .file_name()
        .with_context(|| format!("path has no file name: {}", path.display()))?;
    let target = target_dir.join(name);

    if fs::rename(path, &target).is_err() {
        fs::copy(path, &target).with_context(|| {
            format!(
                "failed to copy {} into {}",
                path.display(),
                target_dir.display()
            )
        })?;
        fs::remove_file(path)
            .with_context(|| format!("failed to remove {} after copy", path.display()))?;
    }

    Ok(target)
}
