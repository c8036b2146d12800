use anyhow::{Context, Result};
use notis_core::{open_db, ImportConfig, ImportService, ReadOptions};
use std::path::Path;

use crate::OutputFormat;

pub fn run(
    config: &ImportConfig,
    enex: &Path,
    max_notes: Option<usize>,
    format: &OutputFormat,
) -> Result<()> {
    let conn = open_db(&config.database.path).with_context(|| {
        format!("opening database {}", config.database.path.display())
    })?;
    let service = ImportService::for_connection(&conn, config)?;
    let report = service
        .import_file(enex, ReadOptions { max_notes })
        .with_context(|| format!("importing {}", enex.display()))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Plain => {
            println!("Imported {}", enex.display());
            println!("  notes read       {}", report.notes_read);
            println!("  notes skipped    {}", report.notes_skipped);
            println!(
                "  tasks            {} new, {} existing",
                report.tasks_inserted, report.tasks_existing
            );
            println!(
                "  notes            {} new, {} existing",
                report.notes_inserted, report.notes_existing
            );
            println!(
                "  resources        {} new, {} existing, {} skipped",
                report.resources_inserted, report.resources_existing, report.resources_skipped
            );
            if config.images.write_files {
                println!(
                    "  image files      {} written, {} failed",
                    report.images_written, report.image_write_failures
                );
            }
        }
    }

    Ok(())
}
