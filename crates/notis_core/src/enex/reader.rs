//! Streaming ENEX reader.
//!
//! # Responsibility
//! - Turn an export document into one `RawNote` per `<note>` element.
//! - Keep field values verbatim; normalization happens in `content`.
//!
//! # Invariants
//! - Tag order is preserved exactly as exported.
//! - Unknown elements are skipped with their whole subtree, never fatal.

use super::{EnexError, EnexResult};
use log::{debug, info};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::path::Path;

/// Reader options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Stop after this many `<note>` elements.
    pub max_notes: Option<usize>,
}

/// Raw `<resource>` sub-fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResource {
    /// Base64 payload, whitespace included.
    pub data: Option<String>,
    pub mime: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub file_name: Option<String>,
    pub source_url: Option<String>,
}

/// Raw `<note>` fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawNote {
    pub title: String,
    /// ENML body as exported (usually the CDATA payload).
    pub content: String,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub tags: Vec<String>,
    /// `<note-attributes>` children, e.g. `reminder-time`.
    pub attributes: BTreeMap<String, String>,
    pub resources: Vec<RawResource>,
}

impl RawNote {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Parsed export document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnexExport {
    pub export_date: Option<String>,
    pub application: Option<String>,
    pub notes: Vec<RawNote>,
}

/// Reads and parses an export file.
///
/// # Errors
/// - `EnexError::SourceNotFound` when `path` does not exist.
/// - `EnexError::Io` / `EnexError::Xml` on read or parse failure.
pub fn read_enex_file(path: impl AsRef<Path>, options: ReadOptions) -> EnexResult<EnexExport> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(EnexError::SourceNotFound(path.to_path_buf()));
    }

    let xml = std::fs::read_to_string(path)?;
    let export = parse_enex(&xml, options)?;
    info!(
        "event=enex_read module=enex status=ok notes={} bytes={}",
        export.notes.len(),
        xml.len()
    );
    Ok(export)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Export,
    Note,
    NoteAttributes,
    Resource,
    ResourceAttributes,
    /// Leaf field or unrecognized element. Its text is assigned only when
    /// the enclosing scope is a record (note, resource or their attributes).
    Element,
}

/// Parses an export document held in memory.
///
/// Only direct children of `<note>`, `<note-attributes>`, `<resource>` and
/// `<resource-attributes>` become fields; anything nested deeper (e.g. the
/// `<task>` and `<reminder>` blocks of newer exports) is skipped whole.
pub fn parse_enex(xml: &str, options: ReadOptions) -> EnexResult<EnexExport> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut export = EnexExport::default();
    let mut scopes: Vec<Scope> = Vec::new();
    let mut note: Option<RawNote> = None;
    let mut resource: Option<RawResource> = None;
    let mut text = String::new();

    loop {
        let event = reader.read_event().map_err(|err| EnexError::Xml {
            position: reader.buffer_position() as u64,
            message: err.to_string(),
        })?;

        match event {
            Event::Start(ref start) => {
                text.clear();
                let scope = match (scopes.last().copied(), start.name().as_ref()) {
                    (None, b"en-export") => {
                        read_export_attributes(start, &mut export);
                        Scope::Export
                    }
                    (Some(Scope::Export), b"note") => {
                        note = Some(RawNote::default());
                        Scope::Note
                    }
                    (Some(Scope::Note), b"note-attributes") => Scope::NoteAttributes,
                    (Some(Scope::Note), b"resource") => {
                        resource = Some(RawResource::default());
                        Scope::Resource
                    }
                    (Some(Scope::Resource), b"resource-attributes") => Scope::ResourceAttributes,
                    _ => Scope::Element,
                };
                scopes.push(scope);
            }
            Event::Text(ref raw) => {
                let value = raw
                    .unescape()
                    .map(|cow| cow.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(raw).into_owned());
                text.push_str(&value);
            }
            Event::CData(ref raw) => {
                text.push_str(&String::from_utf8_lossy(raw));
            }
            Event::End(ref end) => {
                let value = std::mem::take(&mut text);
                let Some(scope) = scopes.pop() else {
                    continue;
                };
                match scope {
                    Scope::Note => {
                        if let Some(finished) = note.take() {
                            export.notes.push(finished);
                        }
                        if options
                            .max_notes
                            .is_some_and(|limit| export.notes.len() >= limit)
                        {
                            debug!(
                                "event=enex_read module=enex status=truncated max_notes={}",
                                export.notes.len()
                            );
                            break;
                        }
                    }
                    Scope::Resource => {
                        if let (Some(current), Some(finished)) = (note.as_mut(), resource.take()) {
                            current.resources.push(finished);
                        }
                    }
                    Scope::Export | Scope::NoteAttributes | Scope::ResourceAttributes => {}
                    Scope::Element => {
                        let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                        match scopes.last().copied() {
                            Some(Scope::Note) => {
                                if let Some(current) = note.as_mut() {
                                    assign_note_field(current, &name, value);
                                }
                            }
                            Some(Scope::NoteAttributes) => {
                                if let Some(current) = note.as_mut() {
                                    current.attributes.insert(name, value);
                                }
                            }
                            Some(Scope::Resource) => {
                                if let Some(current) = resource.as_mut() {
                                    assign_resource_field(current, &name, value);
                                }
                            }
                            Some(Scope::ResourceAttributes) => {
                                if let Some(current) = resource.as_mut() {
                                    assign_resource_attribute(current, &name, value);
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(export)
}

fn read_export_attributes(start: &BytesStart<'_>, export: &mut EnexExport) {
    for attr in start.attributes().flatten() {
        let Ok(value) = attr.unescape_value() else {
            continue;
        };
        match attr.key.as_ref() {
            b"export-date" => export.export_date = Some(value.into_owned()),
            b"application" => export.application = Some(value.into_owned()),
            _ => {}
        }
    }
}

fn assign_note_field(note: &mut RawNote, field: &str, value: String) {
    match field {
        "title" => note.title = value,
        "content" => note.content = value,
        "created" => note.created = Some(value),
        "updated" => note.updated = Some(value),
        "tag" => note.tags.push(value),
        other => debug!("event=enex_field module=enex status=ignored field={other}"),
    }
}

fn assign_resource_field(resource: &mut RawResource, field: &str, value: String) {
    match field {
        "data" => resource.data = Some(value),
        "mime" => resource.mime = Some(value),
        "width" => resource.width = Some(value),
        "height" => resource.height = Some(value),
        other => debug!("event=enex_field module=enex status=ignored resource_field={other}"),
    }
}

fn assign_resource_attribute(resource: &mut RawResource, field: &str, value: String) {
    match field {
        "file-name" => resource.file_name = Some(value),
        "source-url" => resource.source_url = Some(value),
        other => debug!("event=enex_field module=enex status=ignored resource_attribute={other}"),
    }
}
