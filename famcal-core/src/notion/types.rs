//! Typed Notion API payloads.
//!
//! Property values arrive as a tagged union keyed by the `type` field. Only
//! the shapes the synchronizer actually reads are decoded; everything else
//! lands on the `Unsupported` variant so the set of recognized shapes stays
//! enumerable.

use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RichTextFragment {
    #[serde(default)]
    pub plain_text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectOption {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateValue {
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
}

/// One database property value, discriminated by its `type` tag.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    Title { title: Vec<RichTextFragment> },
    RichText { rich_text: Vec<RichTextFragment> },
    Select { select: Option<SelectOption> },
    MultiSelect { multi_select: Vec<SelectOption> },
    Status { status: Option<SelectOption> },
    Date { date: Option<DateValue> },
    #[serde(other)]
    Unsupported,
}

impl PropertyValue {
    /// Flatten a property to display text. The fallback chain is fixed:
    /// title/rich-text fragments joined, select/status option name,
    /// multi-select names comma-joined, date start string.
    pub fn plain_text(&self) -> Option<String> {
        let text = match self {
            PropertyValue::Title { title } => join_fragments(title),
            PropertyValue::RichText { rich_text } => join_fragments(rich_text),
            PropertyValue::Select { select } => {
                select.as_ref().map(|s| s.name.clone()).unwrap_or_default()
            }
            PropertyValue::Status { status } => {
                status.as_ref().map(|s| s.name.clone()).unwrap_or_default()
            }
            PropertyValue::MultiSelect { multi_select } => multi_select
                .iter()
                .map(|o| o.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            PropertyValue::Date { date } => {
                date.as_ref().map(|d| d.start.clone()).unwrap_or_default()
            }
            PropertyValue::Unsupported => String::new(),
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// The raw date value, if this is a date property with one set.
    pub fn date_value(&self) -> Option<&DateValue> {
        match self {
            PropertyValue::Date { date } => date.as_ref(),
            _ => None,
        }
    }
}

fn join_fragments(fragments: &[RichTextFragment]) -> String {
    fragments
        .iter()
        .map(|f| f.plain_text.as_str())
        .collect::<String>()
}

/// A database record (page) from a query response.
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,
}

impl Page {
    /// Case-insensitive property lookup.
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        let lower = name.to_lowercase();
        self.properties
            .iter()
            .find(|(key, _)| key.to_lowercase() == lower)
            .map(|(_, value)| value)
    }

    /// First property matching a predicate over its lowercased name.
    pub fn property_where(&self, pred: impl Fn(&str) -> bool) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|(key, _)| pred(&key.to_lowercase()))
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryDatabaseResponse {
    pub results: Vec<Page>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub id: String,
    #[serde(default)]
    pub title: Vec<RichTextFragment>,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

/// Response of `GET /users/me` for an integration token.
#[derive(Debug, Clone, Deserialize)]
pub struct IntegrationInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_union_decodes_known_shapes() {
        let json = r#"{
            "Name": {"id": "t", "type": "title", "title": [{"plain_text": "Tacos"}, {"plain_text": " night"}]},
            "Notes": {"id": "n", "type": "rich_text", "rich_text": [{"plain_text": "bring salsa"}]},
            "Kind": {"id": "k", "type": "select", "select": {"name": "Dinner"}},
            "Tags": {"id": "g", "type": "multi_select", "multi_select": [{"name": "a"}, {"name": "b"}]},
            "Date": {"id": "d", "type": "date", "date": {"start": "2024-05-01"}},
            "Files": {"id": "f", "type": "files", "files": []}
        }"#;

        let props: HashMap<String, PropertyValue> = serde_json::from_str(json).unwrap();

        assert_eq!(props["Name"].plain_text().as_deref(), Some("Tacos night"));
        assert_eq!(props["Notes"].plain_text().as_deref(), Some("bring salsa"));
        assert_eq!(props["Kind"].plain_text().as_deref(), Some("Dinner"));
        assert_eq!(props["Tags"].plain_text().as_deref(), Some("a, b"));
        assert_eq!(props["Date"].date_value().unwrap().start, "2024-05-01");
        // Unrecognized types fall through to Unsupported instead of failing
        assert!(matches!(props["Files"], PropertyValue::Unsupported));
    }

    #[test]
    fn test_empty_select_flattens_to_none() {
        let value: PropertyValue =
            serde_json::from_str(r#"{"type": "select", "select": null}"#).unwrap();
        assert_eq!(value.plain_text(), None);
    }

    #[test]
    fn test_page_property_lookup_is_case_insensitive() {
        let page: Page = serde_json::from_str(
            r#"{
                "id": "p1",
                "properties": {
                    "Calendar Name": {"type": "select", "select": {"name": "Meals"}}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(
            page.property("calendar name").unwrap().plain_text().as_deref(),
            Some("Meals")
        );
    }
}
