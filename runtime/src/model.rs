//! Queries, extracted items and the per-cycle result set.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One value projected from a matched element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Field {
    /// The value of an attribute (e.g. `href`, `title`, `src`).
    Attr(String),
    /// The element's inner markup.
    InnerHtml,
}

impl Field {
    pub fn attr(name: &str) -> Self {
        Self::Attr(name.to_string())
    }

    /// Key under which the value is stored on an [`ExtractedItem`].
    pub fn key(&self) -> &str {
        match self {
            Self::Attr(name) => name,
            Self::InnerHtml => "inner_html",
        }
    }
}

/// Predicate an element must satisfy on top of the base selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    /// The attribute exists and is not empty.
    HasAttr(String),
    /// The attribute is strictly longer than `len` characters.
    AttrLongerThan { attr: String, len: usize },
}

impl Filter {
    /// Evaluate the filter given an attribute lookup.
    pub fn accepts<'a>(&self, attr: impl Fn(&str) -> Option<&'a str>) -> bool {
        match self {
            Self::HasAttr(name) => attr(name).is_some_and(|v| !v.is_empty()),
            Self::AttrLongerThan { attr: name, len } => {
                attr(name).is_some_and(|v| v.chars().count() > *len)
            }
        }
    }
}

/// A named selection rule over a rendered document. Built once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionQuery {
    pub name: String,
    /// CSS selector for candidate elements.
    pub selector: String,
    pub filters: Vec<Filter>,
    /// Maximum number of items kept, in document order.
    pub cap: usize,
    /// Projection, in output order.
    pub fields: Vec<Field>,
}

impl ExtractionQuery {
    pub fn new(name: &str, selector: &str, cap: usize) -> Self {
        Self {
            name: name.to_string(),
            selector: selector.to_string(),
            filters: Vec::new(),
            cap,
            fields: Vec::new(),
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Anchors under `prefix` that point somewhere deeper than the prefix
    /// itself and carry a title.
    pub fn model_listing(prefix: &str, cap: usize) -> Self {
        Self::new("models", &format!("a[href^=\"{prefix}\"]"), cap)
            .filter(Filter::AttrLongerThan {
                attr: "href".into(),
                len: prefix.chars().count(),
            })
            .filter(Filter::HasAttr("title".into()))
            .field(Field::attr("href"))
            .field(Field::attr("title"))
            .field(Field::InnerHtml)
    }

    /// Images carrying `class_marker` in their class list.
    pub fn preview_images(class_marker: &str, cap: usize) -> Self {
        Self::new("previews", &format!("img[class*=\"{class_marker}\"]"), cap)
            .filter(Filter::HasAttr("src".into()))
            .field(Field::attr("src"))
    }

    /// Apply filters to an element described by `attr`.
    pub fn accepts<'a>(&self, attr: impl Fn(&str) -> Option<&'a str> + Copy) -> bool {
        self.filters.iter().all(|f| f.accepts(attr))
    }
}

/// Field values of one matched element. Field order follows the query's
/// projection and is preserved end to end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedItem {
    fields: Vec<(String, String)>,
}

impl ExtractedItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field, keeping its first position.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Items produced by one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemList {
    pub name: String,
    pub items: Vec<ExtractedItem>,
}

/// Everything one cycle extracted, stamped with the capture time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    lists: Vec<ItemList>,
    captured_at: DateTime<Utc>,
}

impl ExtractionResult {
    pub fn new(lists: Vec<ItemList>, captured_at: DateTime<Utc>) -> Self {
        Self { lists, captured_at }
    }

    pub fn lists(&self) -> &[ItemList] {
        &self.lists
    }

    /// The first list; per-item notifications are built from it.
    pub fn primary(&self) -> Option<&ItemList> {
        self.lists.first()
    }

    pub fn list(&self, name: &str) -> Option<&ItemList> {
        self.lists.iter().find(|l| l.name == name)
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Capture time as `2024-01-01T12:00:00.000Z`.
    pub fn timestamp(&self) -> String {
        self.captured_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn total_items(&self) -> usize {
        self.lists.iter().map(|l| l.items.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_model_listing_filters() {
        let q = ExtractionQuery::model_listing("/en/models/", 5);
        assert_eq!(q.selector, "a[href^=\"/en/models/\"]");

        let attrs = |href: &'static str, title: Option<&'static str>| {
            move |name: &str| match name {
                "href" => Some(href),
                "title" => title,
                _ => None,
            }
        };
        assert!(q.accepts(attrs("/en/models/123-boat", Some("Boat"))));
        assert!(!q.accepts(attrs("/en/models/", Some("Index"))));
        assert!(!q.accepts(attrs("/en/models/123-boat", None)));
        assert!(!q.accepts(attrs("/en/models/123-boat", Some(""))));
    }

    #[test]
    fn test_item_preserves_insertion_order() {
        let mut item = ExtractedItem::new()
            .with("title", "Boat")
            .with("href", "/en/models/1");
        item.insert("title", "Ship");

        let keys: Vec<_> = item.fields().map(|(k, _)| k).collect();
        assert_eq!(keys, ["title", "href"]);
        assert_eq!(item.get("title"), Some("Ship"));
        assert_eq!(item.get("src"), None);
    }

    #[test]
    fn test_timestamp_is_iso_millis_utc() {
        let at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        let result = ExtractionResult::new(Vec::new(), at);
        assert_eq!(result.timestamp(), "2025-03-04T05:06:07.000Z");
        assert!(result.primary().is_none());
    }
}
