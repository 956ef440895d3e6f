mod fetch;
mod parser;
mod render;

use std::fs;
use std::path::Path;
use std::time::Instant;

use clap::{Parser, Subcommand};

use parser::{ApiEntity, ExtractOptions, ExtractStats};

const ENTITIES_PATH: &str = "data/entities.json";

#[derive(Parser)]
#[command(name = "botapi_gen", about = "Telegram Bot API reference scraper + code generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the API reference page into the local cache
    Fetch {
        /// Re-fetch even if a cached copy exists
        #[arg(long)]
        force: bool,
    },
    /// Extract entities from the cached page and write entities.json
    Extract {
        /// Treat arguments without an explicit marker as optional
        #[arg(long)]
        default_optional: bool,
    },
    /// Render one source file per entity from the templates
    Render,
    /// Fetch + extract + render in one pipeline
    Run {
        /// Re-fetch even if a cached copy exists
        #[arg(long)]
        force: bool,
        /// Treat arguments without an explicit marker as optional
        #[arg(long)]
        default_optional: bool,
    },
    /// Extracted entities overview table
    Overview {
        /// Filter by title substring (case-insensitive)
        #[arg(short, long)]
        filter: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fetch { force } => {
            let url = fetch::api_url();
            let html = fetch::get_page(&url, Path::new(fetch::CACHE_PATH), force).await?;
            println!("Cached {} bytes at {}", html.len(), fetch::CACHE_PATH);
            Ok(())
        }
        Commands::Extract { default_optional } => {
            let Some(html) = fetch::read_cached(Path::new(fetch::CACHE_PATH))? else {
                println!("No cached page. Run 'fetch' first.");
                return Ok(());
            };
            let opts = ExtractOptions { default_required: !default_optional };
            let extraction = parser::parse_page(&html, &opts)?;
            print_stats(&extraction.stats);
            write_entities(&extraction.entities)?;
            println!("Wrote {} entities to {}", extraction.entities.len(), ENTITIES_PATH);
            Ok(())
        }
        Commands::Render => {
            let Some(entities) = read_entities()? else {
                println!("No extracted entities. Run 'extract' first.");
                return Ok(());
            };
            let written = render::render_all(
                &entities,
                Path::new(render::TEMPLATES_DIR),
                Path::new(render::OUTPUT_DIR),
            )?;
            println!("Generated {} files under {}/", written, render::OUTPUT_DIR);
            Ok(())
        }
        Commands::Run { force, default_optional } => {
            let url = fetch::api_url();
            let html = fetch::get_page(&url, Path::new(fetch::CACHE_PATH), force).await?;

            let opts = ExtractOptions { default_required: !default_optional };
            let extraction = parser::parse_page(&html, &opts)?;
            print_stats(&extraction.stats);
            write_entities(&extraction.entities)?;

            let written = render::render_all(
                &extraction.entities,
                Path::new(render::TEMPLATES_DIR),
                Path::new(render::OUTPUT_DIR),
            )?;
            println!(
                "Pipeline done: {} entities, {} files under {}/",
                extraction.entities.len(),
                written,
                render::OUTPUT_DIR
            );
            Ok(())
        }
        Commands::Overview { filter, limit } => {
            let Some(entities) = read_entities()? else {
                println!("No extracted entities. Run 'extract' first.");
                return Ok(());
            };

            let needle = filter.map(|f| f.to_lowercase());
            let rows: Vec<&ApiEntity> = entities
                .iter()
                .filter(|e| {
                    needle
                        .as_deref()
                        .is_none_or(|n| e.title.to_lowercase().contains(n))
                })
                .take(limit)
                .collect();
            if rows.is_empty() {
                println!("No entities found.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<28} | {:<6} | {:>4} | {:>4} | {:<32}",
                "#", "Entity", "Kind", "Args", "Req", "File"
            );
            println!("{}", "-".repeat(92));

            for (i, e) in rows.iter().enumerate() {
                let required = e.arguments.iter().filter(|a| a.required).count();
                println!(
                    "{:>3} | {:<28} | {:<6} | {:>4} | {:>4} | {:<32}",
                    i + 1,
                    truncate(&e.title, 28),
                    entity_kind(e),
                    e.arguments.len(),
                    required,
                    format!("{}.py", render::file_stem(&e.title)),
                );
            }

            println!("\n{} entities", rows.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_stats(stats: &ExtractStats) {
    println!("Headings: {}", stats.headings);
    println!("Tables:   {} ({:.1}%)", stats.extracted, stats.ratio() * 100.0);
    let columns: Vec<&str> = stats.columns_seen.iter().map(String::as_str).collect();
    println!("Columns:  {}", columns.join(", "));
}

/// "Parameter" tables document methods, "Field" tables document types.
fn entity_kind(entity: &ApiEntity) -> &'static str {
    use parser::Meta;
    match entity.arguments.first().and_then(|a| a.meta) {
        Some(Meta::Parameter) => "method",
        Some(Meta::Field) => "type",
        None => "-",
    }
}

fn write_entities(entities: &[ApiEntity]) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(ENTITIES_PATH).parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(entities)?;
    fs::write(ENTITIES_PATH, json)?;
    Ok(())
}

fn read_entities() -> anyhow::Result<Option<Vec<ApiEntity>>> {
    let path = Path::new(ENTITIES_PATH);
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&json)?))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
