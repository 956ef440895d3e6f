pub mod argument;
pub mod extract;
pub mod types;

use anyhow::Result;

pub use argument::{Argument, ExtractOptions, Meta};
pub use extract::{ApiEntity, ExtractStats, Extraction};

/// Single-pass pipeline: raw HTML → (heading, paragraph, table) triples →
/// one entity per triple, with per-run diagnostics.
pub fn parse_page(html: &str, opts: &ExtractOptions) -> Result<Extraction> {
    extract::extract_entities(html, opts)
}
