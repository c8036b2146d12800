use anyhow::Result;
use notis_core::{
    open_db, EntryKind, EntryListQuery, EntryRepository, ImportConfig, SqliteEntryRepository,
};

use crate::OutputFormat;

const TITLE_WIDTH: usize = 40;

pub fn run(
    config: &ImportConfig,
    kind: Option<EntryKind>,
    limit: u32,
    format: &OutputFormat,
) -> Result<()> {
    let conn = open_db(&config.database.path)?;
    let repo = SqliteEntryRepository::try_new(&conn)?;
    let entries = repo.list_entries(&EntryListQuery {
        kind,
        limit: Some(limit),
        offset: 0,
    })?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Plain => {
            if entries.is_empty() {
                println!("No entries.");
                return Ok(());
            }

            println!(
                "{:<4} {:<TITLE_WIDTH$} {:<12} {:<12} {}",
                "Kind", "Title", "Where", "When", "Tags"
            );
            println!(
                "{} {} {} {} {}",
                "\u{2500}".repeat(4),
                "\u{2500}".repeat(TITLE_WIDTH),
                "\u{2500}".repeat(12),
                "\u{2500}".repeat(12),
                "\u{2500}".repeat(20)
            );
            for entry in &entries {
                let title = if entry.title.chars().count() > TITLE_WIDTH {
                    let cut: String = entry.title.chars().take(TITLE_WIDTH - 3).collect();
                    format!("{cut}...")
                } else {
                    entry.title.clone()
                };
                let references = entry
                    .tags
                    .reference_tags
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ");
                println!(
                    "{:<4} {:<TITLE_WIDTH$} {:<12} {:<12} {}",
                    entry.kind.as_str(),
                    title,
                    entry.tags.where_tag.as_deref().unwrap_or("-"),
                    entry.tags.when_tag.as_deref().unwrap_or("-"),
                    references
                );
            }
            println!("\n{} entries", entries.len());
        }
    }

    Ok(())
}
