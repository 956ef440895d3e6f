use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

pub const DOMAIN: &str = "https://core.telegram.org";
pub const API_PATH: &str = "/bots/api";
pub const CACHE_PATH: &str = "cache/response.html";

pub fn api_url() -> String {
    format!("{DOMAIN}{API_PATH}")
}

/// Return the reference page body, preferring the cache file. A fresh
/// fetch fails on non-success status or an empty body, and writes the
/// cache before returning.
pub async fn get_page(url: &str, cache_path: &Path, force: bool) -> Result<String> {
    if !force {
        if let Some(cached) = read_cached(cache_path)? {
            info!("Using cached response for {}", url);
            return Ok(cached);
        }
    }

    info!("Fetching {}", url);
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("Failed to fetch {url}"))?
        .error_for_status()?;
    let text = response.text().await?;
    if text.is_empty() {
        bail!("Empty response body from {url}");
    }

    if let Some(parent) = cache_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(cache_path, &text)
        .with_context(|| format!("Failed to write cache file {}", cache_path.display()))?;

    Ok(text)
}

/// Cache-only access for offline extraction.
pub fn read_cached(cache_path: &Path) -> Result<Option<String>> {
    if !cache_path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(cache_path)
        .with_context(|| format!("Failed to read cache file {}", cache_path.display()))?;
    Ok(Some(text))
}

// ── Tests ──
