use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

use super::{Feed, FeedEntry};

/// RFC 822 date with a two-digit day, as feed readers expect.
const RFC822_FORMAT: &str = "%a, %d %b %Y %H:%M:%S +0000";

/// Failure to produce the feed file. Fatal for the run.
#[derive(Debug, Error)]
pub enum FeedWriteError {
    #[error("Failed to render feed XML: {0}")]
    Render(String),
    #[error("Failed to create output directory '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write feed to '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn rfc822(date: DateTime<Utc>) -> String {
    date.format(RFC822_FORMAT).to_string()
}

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn emit(writer: &mut XmlWriter, event: Event<'_>) -> Result<(), FeedWriteError> {
    writer
        .write_event(event)
        .map_err(|e| FeedWriteError::Render(e.to_string()))
}

fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<(), FeedWriteError> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn write_entry(writer: &mut XmlWriter, entry: &FeedEntry) -> Result<(), FeedWriteError> {
    emit(writer, Event::Start(BytesStart::new("item")))?;
    text_element(writer, "title", &entry.title)?;
    text_element(writer, "link", &entry.link)?;
    text_element(writer, "description", &entry.description)?;

    let mut guid = BytesStart::new("guid");
    guid.push_attribute(("isPermaLink", "false"));
    emit(writer, Event::Start(guid))?;
    emit(writer, Event::Text(BytesText::new(&entry.guid)))?;
    emit(writer, Event::End(BytesEnd::new("guid")))?;

    text_element(writer, "pubDate", &rfc822(entry.pub_date))?;
    emit(writer, Event::End(BytesEnd::new("item")))
}

/// Serialize `feed` as an RSS 2.0 document.
///
/// Channel and item children are written in a fixed order, so two feeds
/// that compare equal render to identical bytes.
pub fn render_rss(feed: &Feed) -> Result<String, FeedWriteError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    emit(&mut writer, Event::Start(rss))?;
    emit(&mut writer, Event::Start(BytesStart::new("channel")))?;

    text_element(&mut writer, "title", &feed.title)?;
    text_element(&mut writer, "link", &feed.link)?;
    text_element(&mut writer, "description", &feed.description)?;
    text_element(&mut writer, "docs", &feed.docs)?;
    text_element(&mut writer, "generator", &feed.generator)?;
    text_element(&mut writer, "language", &feed.language)?;
    text_element(&mut writer, "lastBuildDate", &rfc822(feed.last_build_date))?;

    for entry in &feed.entries {
        write_entry(&mut writer, entry)?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("channel")))?;
    emit(&mut writer, Event::End(BytesEnd::new("rss")))?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| FeedWriteError::Render(e.to_string()))
}

/// Render `feed` and write it to `path`, replacing any existing file.
///
/// The parent directory is created when missing. The write is a plain
/// overwrite, not an atomic replace.
pub fn write_feed(feed: &Feed, path: &Path) -> Result<(), FeedWriteError> {
    let xml = render_rss(feed)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| FeedWriteError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(path, xml).map_err(|source| FeedWriteError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(path = %path.display(), entries = feed.entries.len(), "Feed written");
    Ok(())
}
