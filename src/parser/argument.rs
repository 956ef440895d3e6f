use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::types;

/// Types that need no generated import.
const BUILTIN_TYPES: &[&str] = &["list", "int", "str", "float", "bool", "true", "false"];

/// Which table column style a row came from: "Parameter" tables describe
/// methods, "Field" tables describe types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Meta {
    Parameter,
    Field,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub meta: Option<Meta>,
    pub argument_type: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub required: bool,
    pub builtin: bool,
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// What `required` defaults to when neither the description nor the
    /// required cell carries a recognized marker.
    pub default_required: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self { default_required: true }
    }
}

impl Argument {
    /// Build one argument from a row's renamed header→cell map.
    ///
    /// Derived fields read earlier ones, so the order is fixed:
    /// normalize the type, derive `required` (description marker first,
    /// then the cell, then the default policy), detect builtins against
    /// the normalized type, and sanitize the name against it.
    pub fn from_cells(
        meta: Option<Meta>,
        cells: &BTreeMap<String, String>,
        opts: &ExtractOptions,
    ) -> Self {
        let raw_name = non_empty(cells.get("name"));
        let raw_type = non_empty(cells.get("type"));
        let raw_required = non_empty(cells.get("required"));
        let description = non_empty(cells.get("description"));

        let argument_type = raw_type.map(|t| types::normalize(&t));
        let required = derive_required(raw_required.as_deref(), description.as_deref(), opts);
        let builtin = argument_type
            .as_deref()
            .is_some_and(|t| BUILTIN_TYPES.contains(&t.to_lowercase().as_str()));
        let name = raw_name.and_then(|n| sanitize_name(&n, argument_type.as_deref()));

        Self {
            meta,
            argument_type,
            name,
            description,
            required,
            builtin,
        }
    }
}

/// A description opening with "Optional" wins over any explicit required
/// cell. Otherwise the cell decides ("optional"/"yes"); an unrecognized
/// literal falls back to the default policy, as does a missing cell.
fn derive_required(
    raw_required: Option<&str>,
    description: Option<&str>,
    opts: &ExtractOptions,
) -> bool {
    let optional_description =
        description.is_some_and(|d| d.to_lowercase().starts_with("optional"));
    if optional_description {
        return false;
    }

    match raw_required {
        Some(value) if value.eq_ignore_ascii_case("optional") => false,
        Some(value) if value.eq_ignore_ascii_case("yes") => true,
        Some(value) => {
            warn!("Unrecognized required marker {:?}, using default", value);
            opts.default_required
        }
        None => opts.default_required,
    }
}

/// "from" is a reserved word in the generated Python, so it becomes
/// "from_", or "from_user" when the type is known to reference a
/// user-like entity.
fn sanitize_name(name: &str, argument_type: Option<&str>) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    if name.eq_ignore_ascii_case("from") {
        let mut renamed = String::from("from_");
        if argument_type.is_some_and(|t| t.to_lowercase().contains("user")) {
            renamed.push_str("user");
        }
        return Some(renamed);
    }
    Some(name.to_string())
}

fn non_empty(cell: Option<&String>) -> Option<String> {
    cell.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

// ── Tests ──
