//! OPF sidecar generation.

use std::io::{self, Cursor};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::catalog::MediaItem;

const OPF_NS: &str = "http://www.idpf.org/2007/opf";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";

/// "Herbert, Frank" reads as "Frank Herbert". Names without a comma are kept.
pub fn display_author(name: &str) -> String {
    match name.split_once(',') {
        Some((last, first)) if !first.trim().is_empty() && !last.trim().is_empty() => {
            format!("{} {}", first.trim(), last.trim())
        }
        _ => name.trim().to_string(),
    }
}

fn element<W: io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    attributes: &[(&str, &str)],
    text: &str,
) -> io::Result<()> {
    let mut start = BytesStart::new(name);
    for attribute in attributes {
        start.push_attribute(*attribute);
    }
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))
}

fn empty<W: io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    attributes: &[(&str, &str)],
) -> io::Result<()> {
    let mut start = BytesStart::new(name);
    for attribute in attributes {
        start.push_attribute(*attribute);
    }
    writer.write_event(Event::Empty(start))
}

/// Render an OPF 2.0 package document for a media item.
///
/// `cover_file` is the cover's file name relative to the OPF, if one exists.
pub fn render_opf(media: &MediaItem, cover_file: Option<&str>) -> io::Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut package = BytesStart::new("package");
    package.push_attribute(("xmlns", OPF_NS));
    package.push_attribute(("unique-identifier", "BookId"));
    package.push_attribute(("version", "2.0"));
    writer.write_event(Event::Start(package))?;

    let mut metadata = BytesStart::new("metadata");
    metadata.push_attribute(("xmlns:dc", DC_NS));
    metadata.push_attribute(("xmlns:opf", OPF_NS));
    writer.write_event(Event::Start(metadata))?;

    element(&mut writer, "dc:title", &[], &media.title)?;
    element(
        &mut writer,
        "dc:language",
        &[],
        media.language.as_deref().unwrap_or("en"),
    )?;

    match media.isbn.as_deref().or(media.isbn13.as_deref()) {
        Some(isbn) if !isbn.trim().is_empty() => element(
            &mut writer,
            "dc:identifier",
            &[("id", "BookId"), ("opf:scheme", "ISBN")],
            isbn.trim(),
        )?,
        _ => element(
            &mut writer,
            "dc:identifier",
            &[("id", "BookId"), ("opf:scheme", "UUID")],
            &media.id,
        )?,
    }

    for author in media.authors.iter().filter(|a| !a.trim().is_empty()) {
        element(
            &mut writer,
            "dc:creator",
            &[("opf:role", "aut"), ("opf:file-as", author.trim())],
            &display_author(author),
        )?;
    }

    if let Some(description) = &media.description {
        element(&mut writer, "dc:description", &[], description)?;
    }
    if let Some(date) = &media.publication_date {
        element(&mut writer, "dc:date", &[], date)?;
    }
    if let Some(publisher) = &media.publisher {
        element(&mut writer, "dc:publisher", &[], publisher)?;
    }
    for genre in &media.genres {
        element(&mut writer, "dc:subject", &[], genre)?;
    }
    if let Some(series) = &media.series {
        empty(
            &mut writer,
            "meta",
            &[("name", "calibre:series"), ("content", series)],
        )?;
        if let Some(index) = media.series_index {
            let index = index.to_string();
            empty(
                &mut writer,
                "meta",
                &[("name", "calibre:series_index"), ("content", &index)],
            )?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new("metadata")))?;

    if let Some(cover) = cover_file {
        writer.write_event(Event::Start(BytesStart::new("guide")))?;
        empty(
            &mut writer,
            "reference",
            &[("type", "cover"), ("title", "Cover"), ("href", cover)],
        )?;
        writer.write_event(Event::End(BytesEnd::new("guide")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("package")))?;

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Write the OPF sidecar to `path`.
pub async fn write_opf(path: &Path, media: &MediaItem, cover_file: Option<&str>) -> io::Result<()> {
    let xml = render_opf(media, cover_file)?;
    tokio::fs::write(path, xml).await
}
