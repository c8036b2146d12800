use anyhow::Result;
use notis_core::db::schema_version;
use notis_core::{
    open_db, EntryKind, EntryRepository, ImportConfig, ResourceRepository, SqliteEntryRepository,
    SqliteResourceRepository, SqliteTagRepository, TagCategory, TagRepository,
};

use crate::OutputFormat;

pub fn run(config: &ImportConfig, format: &OutputFormat) -> Result<()> {
    let conn = open_db(&config.database.path)?;
    let schema = schema_version(&conn)?;
    let entries = SqliteEntryRepository::try_new(&conn)?;
    let resources = SqliteResourceRepository::try_new(&conn)?;
    let tags = SqliteTagRepository::try_new(&conn)?;

    let tasks = entries.count_entries(Some(EntryKind::Task))?;
    let notes = entries.count_entries(Some(EntryKind::Note))?;
    let resource_count = resources.count_resources()?;
    let tag_counts = [TagCategory::Where, TagCategory::When, TagCategory::Reference]
        .into_iter()
        .map(|category| -> Result<(TagCategory, usize)> {
            Ok((category, tags.list_tags(Some(category))?.len()))
        })
        .collect::<Result<Vec<_>>>()?;

    match format {
        OutputFormat::Json => {
            let tag_json: serde_json::Map<String, serde_json::Value> = tag_counts
                .iter()
                .map(|(category, count)| (category.as_str().to_string(), (*count).into()))
                .collect();
            let output = serde_json::json!({
                "database": config.database.path.display().to_string(),
                "schema_version": schema,
                "tasks": tasks,
                "notes": notes,
                "resources": resource_count,
                "tags": tag_json,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Database   {} (schema {schema})", config.database.path.display());
            println!("Tasks      {tasks}");
            println!("Notes      {notes}");
            println!("Resources  {resource_count}");
            for (category, count) in &tag_counts {
                println!("Tags/{:<6} {count}", category.as_str());
            }
        }
    }

    Ok(())
}
