use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use anyhow::{bail, Result};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::argument::{Argument, ExtractOptions, Meta};

static HEADING_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h4").unwrap());
static HEADER_CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("thead th").unwrap());
static BODY_ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tbody tr").unwrap());
static CELL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

/// One documented API method or type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEntity {
    pub title: String,
    pub description: String,
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Default)]
pub struct ExtractStats {
    pub headings: usize,
    pub extracted: usize,
    pub columns_seen: BTreeSet<String>,
}

impl ExtractStats {
    pub fn ratio(&self) -> f64 {
        if self.headings == 0 {
            0.0
        } else {
            self.extracted as f64 / self.headings as f64
        }
    }
}

#[derive(Debug)]
pub struct Extraction {
    pub entities: Vec<ApiEntity>,
    pub stats: ExtractStats,
}

/// Walk every level-4 heading of the document and collect one entity per
/// heading → paragraph → table triple. Headings without the full triple
/// are plain section markers and are skipped. A row whose cell count
/// disagrees with the header aborts the whole extraction.
pub fn extract_entities(html: &str, opts: &ExtractOptions) -> Result<Extraction> {
    let document = Html::parse_document(html);
    let mut entities = Vec::new();
    let mut stats = ExtractStats::default();

    for heading in document.select(&HEADING_SELECTOR) {
        stats.headings += 1;
        let title = element_text(heading);

        let Some(paragraph) =
            next_element(heading).filter(|el| el.value().name() == "p")
        else {
            continue;
        };
        let Some(table) = next_element(paragraph).filter(|el| el.value().name() == "table")
        else {
            continue;
        };

        let arguments = extract_arguments(table, &title, opts, &mut stats)?;
        stats.extracted += 1;
        entities.push(ApiEntity {
            title,
            description: element_text(paragraph),
            arguments,
        });
    }

    info!(
        "Found {} tables out of {} headings ({:.1}%)",
        stats.extracted,
        stats.headings,
        stats.ratio() * 100.0
    );

    Ok(Extraction { entities, stats })
}

fn extract_arguments(
    table: ElementRef,
    title: &str,
    opts: &ExtractOptions,
    stats: &mut ExtractStats,
) -> Result<Vec<Argument>> {
    let headers: Vec<String> = table
        .select(&HEADER_CELL_SELECTOR)
        .map(|th| element_text(th).to_lowercase())
        .collect();
    stats.columns_seen.extend(headers.iter().cloned());

    let mut arguments = Vec::new();
    for row in table.select(&BODY_ROW_SELECTOR) {
        let cells: Vec<String> = row.select(&CELL_SELECTOR).map(element_text).collect();
        if cells.len() != headers.len() {
            bail!(
                "Table under {:?}: row has {} cells but header has {} columns",
                title,
                cells.len(),
                headers.len()
            );
        }
        let (meta, fields) = rename_columns(&headers, &cells);
        arguments.push(Argument::from_cells(meta, &fields, opts));
    }

    Ok(arguments)
}

/// Map raw column headers onto argument fields. The "parameter"/"field"
/// columns both carry the name and decide the meta discriminant. The
/// BTreeMap keeps the renamed key set in sorted order, so row handling
/// is reproducible regardless of column order on the page.
fn rename_columns(
    headers: &[String],
    cells: &[String],
) -> (Option<Meta>, BTreeMap<String, String>) {
    let mut meta = None;
    let mut fields = BTreeMap::new();

    for (header, cell) in headers.iter().zip(cells) {
        let key = match header.as_str() {
            "parameter" => {
                meta = Some(Meta::Parameter);
                "name"
            }
            "field" => {
                meta = Some(Meta::Field);
                "name"
            }
            "type" => "type",
            other => other,
        };
        fields.insert(key.to_string(), cell.clone());
    }

    (meta, fields)
}

/// First following sibling that is an element (skips text and comments).
fn next_element(el: ElementRef) -> Option<ElementRef> {
    el.next_siblings().find_map(ElementRef::wrap)
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> Extraction {
        extract_entities(html, &ExtractOptions::default()).unwrap()
    }

    fn fixture() -> Extraction {
        let html = std::fs::read_to_string("tests/fixtures/botapi.html").unwrap();
        extract(&html)
    }

    #[test]
    fn heading_without_paragraph_is_skipped() {
        let out = extract("<h4>Recent changes</h4><h4>getMe</h4><p>Test method.</p>");
        assert!(out.entities.is_empty());
        assert_eq!(out.stats.headings, 2);
        assert_eq!(out.stats.extracted, 0);
    }

    #[test]
    fn heading_without_table_is_skipped() {
        let out = extract("<h4>getMe</h4><p>Requires no parameters.</p><h4>Next</h4>");
        assert!(out.entities.is_empty());
    }

    #[test]
    fn cell_count_mismatch_is_fatal() {
        let html = "<h4>sendMessage</h4><p>Send a message.</p>\
            <table><thead><tr><th>Parameter</th><th>Type</th><th>Required</th><th>Description</th></tr></thead>\
            <tbody><tr><td>chat_id</td><td>Integer</td><td>Yes</td></tr></tbody></table>";
        let err = extract_entities(html, &ExtractOptions::default()).unwrap_err();
        assert!(err.to_string().contains("3 cells"), "{err}");
    }

    #[test]
    fn minimal_method_table() {
        let html = "<h4>sendMessage</h4><p>Send a text message.</p>\
            <table><thead><tr><th>Parameter</th><th>Type</th><th>Required</th><th>Description</th></tr></thead>\
            <tbody><tr><td>chat_id</td><td>Integer or String</td><td>Yes</td><td>Unique identifier</td></tr></tbody></table>";
        let out = extract(html);
        assert_eq!(out.entities.len(), 1);

        let entity = &out.entities[0];
        assert_eq!(entity.title, "sendMessage");
        assert_eq!(entity.description, "Send a text message.");
        assert_eq!(entity.arguments.len(), 1);

        let arg = &entity.arguments[0];
        assert_eq!(arg.name.as_deref(), Some("chat_id"));
        assert_eq!(arg.argument_type.as_deref(), Some("Union[int, str]"));
        assert!(arg.required);
        assert!(!arg.builtin);
        assert_eq!(arg.meta, Some(Meta::Parameter));
    }

    #[test]
    fn duplicate_titles_both_kept() {
        let block = "<h4>Update</h4><p>An update.</p>\
            <table><thead><tr><th>Field</th><th>Type</th><th>Description</th></tr></thead>\
            <tbody><tr><td>update_id</td><td>Integer</td><td>Identifier</td></tr></tbody></table>";
        let out = extract(&format!("{block}{block}"));
        assert_eq!(out.entities.len(), 2);
        assert_eq!(out.entities[0].title, out.entities[1].title);
    }

    #[test]
    fn fixture_counts() {
        let out = fixture();
        assert_eq!(out.stats.headings, 5);
        assert_eq!(out.stats.extracted, 3);
        let titles: Vec<&str> = out.entities.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["sendMessage", "Message", "getUpdates"]);
    }

    #[test]
    fn fixture_columns_seen() {
        let out = fixture();
        let columns: Vec<&str> = out.stats.columns_seen.iter().map(String::as_str).collect();
        assert_eq!(columns, ["description", "field", "parameter", "required", "type"]);
    }

    #[test]
    fn fixture_send_message() {
        let out = fixture();
        let entity = &out.entities[0];
        assert_eq!(entity.title, "sendMessage");
        assert!(entity.description.starts_with("Use this method to send text messages"));

        let names: Vec<Option<&str>> = entity
            .arguments
            .iter()
            .map(|a| a.name.as_deref())
            .collect();
        assert_eq!(
            names,
            [Some("chat_id"), Some("text"), Some("disable_notification"), Some("reply_markup")]
        );

        let chat_id = &entity.arguments[0];
        assert_eq!(chat_id.argument_type.as_deref(), Some("Union[int, str]"));
        assert!(chat_id.required);

        let silent = &entity.arguments[2];
        assert_eq!(silent.argument_type.as_deref(), Some("bool"));
        assert!(silent.builtin);
        assert!(!silent.required);

        let markup = &entity.arguments[3];
        assert_eq!(
            markup.argument_type.as_deref(),
            Some("Union[InlineKeyboardMarkup, ReplyKeyboardMarkup]")
        );
        assert!(!markup.required);
    }

    #[test]
    fn fixture_message_fields() {
        let out = fixture();
        let entity = &out.entities[1];
        assert_eq!(entity.title, "Message");

        let from = entity
            .arguments
            .iter()
            .find(|a| a.name.as_deref() == Some("from_user"))
            .expect("from field renamed");
        assert_eq!(from.meta, Some(Meta::Field));
        assert_eq!(from.argument_type.as_deref(), Some("User"));
        assert!(!from.required);

        let photo = entity
            .arguments
            .iter()
            .find(|a| a.name.as_deref() == Some("photo"))
            .unwrap();
        assert_eq!(photo.argument_type.as_deref(), Some("list[PhotoSize]"));
        assert!(!photo.builtin);
        assert!(!photo.required);

        let id = &entity.arguments[0];
        assert_eq!(id.name.as_deref(), Some("message_id"));
        assert_eq!(id.argument_type.as_deref(), Some("int"));
        assert!(id.builtin);
        assert!(id.required);
    }

    #[test]
    fn fixture_get_updates() {
        let out = fixture();
        let entity = &out.entities[2];
        assert_eq!(entity.title, "getUpdates");

        let allowed = entity
            .arguments
            .iter()
            .find(|a| a.name.as_deref() == Some("allowed_updates"))
            .unwrap();
        assert_eq!(allowed.argument_type.as_deref(), Some("list[str]"));
        assert!(!allowed.required);
    }
}
