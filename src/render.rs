use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use minijinja::{context, Environment, UndefinedBehavior};
use tracing::{debug, info};

use crate::parser::ApiEntity;

pub const TEMPLATES_DIR: &str = "templates";
pub const TEMPLATE_EXTENSION: &str = "jinja";
pub const OUTPUT_DIR: &str = "out";
/// Module that generated files import non-builtin types from.
pub const IMPORT_FROM: &str = ".types";

/// Render every template against every entity, one output file per
/// (template, entity) pair. The output tree mirrors the template tree,
/// with each file renamed after its entity. Returns the file count.
pub fn render_all(entities: &[ApiEntity], templates_dir: &Path, out_dir: &Path) -> Result<usize> {
    let templates = load_templates(templates_dir)?;
    if templates.is_empty() {
        bail!(
            "No .{TEMPLATE_EXTENSION} templates under {}",
            templates_dir.display()
        );
    }
    info!("Found {} templates", templates.len());

    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Lenient);
    for (name, source) in &templates {
        env.add_template_owned(name.clone(), source.clone())?;
    }

    let pb = ProgressBar::new((templates.len() * entities.len()) as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut written = 0usize;
    for (name, _) in &templates {
        let template = env.get_template(name)?;
        for entity in entities {
            let rendered = template
                .render(entity_context(entity))
                .with_context(|| format!("Failed to render {} for {:?}", name, entity.title))?;

            let output_path = output_path(out_dir, Path::new(name), &entity.title);
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&output_path, rendered)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;

            debug!("{} has been generated", output_path.display());
            written += 1;
            pb.inc(1);
        }
    }

    pb.finish_and_clear();
    info!("Generated {} files under {}", written, out_dir.display());
    Ok(written)
}

/// Collect `*.jinja` files under `dir` recursively as (relative path,
/// source) pairs, sorted by path.
fn load_templates(dir: &Path) -> Result<Vec<(String, String)>> {
    let mut templates = Vec::new();
    collect_templates(dir, dir, &mut templates)?;
    templates.sort();
    Ok(templates)
}

fn collect_templates(
    root: &Path,
    dir: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read templates dir {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_templates(root, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == TEMPLATE_EXTENSION) {
            let name = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            let source = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template {}", path.display()))?;
            templates.push((name, source));
        }
    }
    Ok(())
}

fn entity_context(entity: &ApiEntity) -> minijinja::Value {
    context! {
        title => &entity.title,
        description => &entity.description,
        arguments => &entity.arguments,
        import_types => import_types(entity),
        import_from => IMPORT_FROM,
    }
}

/// Non-builtin argument types the generated file must import. Compound
/// type expressions (anything that is not a plain identifier) are the
/// template's problem, not an import.
fn import_types(entity: &ApiEntity) -> Vec<String> {
    let types: BTreeSet<String> = entity
        .arguments
        .iter()
        .filter(|arg| !arg.builtin)
        .filter_map(|arg| arg.argument_type.clone())
        .filter(|ty| is_identifier(ty))
        .collect();
    types.into_iter().collect()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn output_path(out_dir: &Path, template_rel: &Path, title: &str) -> PathBuf {
    let mut path = out_dir.join(template_rel);
    path.set_file_name(format!("{}.py", file_stem(title)));
    path
}

/// Filesystem-safe name from an entity title: a separator before every
/// interior uppercase-to-lowercase transition, then everything
/// lower-cased. "sendMessage" → "send_message".
pub fn file_stem(title: &str) -> String {
    let chars: Vec<char> = title.chars().collect();
    let mut stem = String::with_capacity(title.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() && chars.get(i + 1).is_some_and(|n| n.is_lowercase()) {
            stem.push('_');
        }
        stem.extend(c.to_lowercase());
    }
    stem
}

// ── Tests ──
