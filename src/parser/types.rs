use std::sync::LazyLock;

use regex::Regex;

/// Source keyword → Python type, in replacement order. Later keys re-scan
/// text produced by earlier replacements, so the order is load-bearing.
const TYPE_MAP: &[(&str, &str)] = &[
    ("integer", "int"),
    ("string", "str"),
    ("float", "float"),
    ("boolean", "bool"),
    ("true", "bool"),
    ("false", "bool"),
];

/// TYPE_MAP expanded to lower/Title/UPPER casings, precomputed once.
static SUBSTITUTIONS: LazyLock<Vec<(String, &'static str)>> = LazyLock::new(|| {
    TYPE_MAP
        .iter()
        .flat_map(|&(key, target)| {
            [key.to_string(), title_case(key), key.to_uppercase()]
                .into_iter()
                .map(move |pattern| (pattern, target))
        })
        .collect()
});

static UNION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\w+) or (\w+)").unwrap());

const ARRAY_PHRASE: &str = "Array of ";

/// Rewrite a raw type phrase from the reference page into Python type
/// syntax: keyword substitution, then array conversion, then union
/// conversion.
pub fn normalize(raw: &str) -> String {
    let substituted = substitute_keywords(raw);
    let listed = convert_arrays(&substituted);
    convert_union(&listed)
}

fn substitute_keywords(text: &str) -> String {
    let mut out = text.to_string();
    for (pattern, target) in SUBSTITUTIONS.iter() {
        out = out.replace(pattern.as_str(), target);
    }
    out
}

/// "Array of X" → "list[X]". Closing brackets are appended at the end,
/// one per replacement, so nesting works: "Array of Array of X" →
/// "list[list[X]]".
fn convert_arrays(text: &str) -> String {
    let depth = text.matches(ARRAY_PHRASE).count();
    if depth == 0 {
        return text.to_string();
    }
    let mut out = text.replace(ARRAY_PHRASE, "list[");
    for _ in 0..depth {
        out.push(']');
    }
    out
}

/// "X or Y" → "Union[X, Y]". Only the first adjacent pair is rewritten.
fn convert_union(text: &str) -> String {
    UNION_RE.replace(text, "Union[$1, $2]").to_string()
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ── Tests ──
