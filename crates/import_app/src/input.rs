use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use import_core::FeedItem;
use import_logging::import_warn;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read items file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse items file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
struct ItemRecord {
    guid: String,
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    publish_date: Option<String>,
    content: String,
    #[serde(default)]
    categories: Vec<String>,
}

/// Load a JSON file mapping feed URLs to their item lists. This is the
/// host-side stand-in for a live feed transport; XML parsing stays the
/// transport's concern, outside the engine.
pub fn load_items(path: &Path) -> Result<BTreeMap<String, Vec<FeedItem>>, InputError> {
    let content = fs::read_to_string(path)?;
    let raw: BTreeMap<String, Vec<ItemRecord>> = serde_json::from_str(&content)?;

    Ok(raw
        .into_iter()
        .map(|(feed_url, records)| {
            let items = records
                .into_iter()
                .map(|record| FeedItem {
                    guid: record.guid,
                    title: record.title,
                    link: record.link,
                    publish_date: record.publish_date.as_deref().and_then(parse_date),
                    raw_content: record.content,
                    categories: record.categories,
                })
                .collect();
            (feed_url, items)
        })
        .collect())
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_rfc2822(value))
    {
        Ok(date) => Some(date.with_timezone(&Utc)),
        Err(err) => {
            import_warn!("unparsable publish date {value:?}: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    #[test]
    fn items_file_parses_dates_and_categories() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"{{
                "https://example.substack.com/feed": [
                    {{
                        "guid": "g1",
                        "title": "Hello",
                        "link": "https://example.substack.com/p/hello",
                        "publish_date": "2024-03-01T12:00:00Z",
                        "content": "<p>World</p>",
                        "categories": ["Tech"]
                    }}
                ]
            }}"#
        )
        .expect("write");

        let feeds = super::load_items(file.path()).expect("load");
        let items = &feeds["https://example.substack.com/feed"];
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].guid, "g1");
        assert!(items[0].publish_date.is_some());
        assert_eq!(items[0].categories, vec!["Tech".to_string()]);
    }
}
