//! In-page JavaScript: the anti-automation init script and the compiled
//! form of an [`ExtractionQuery`].

use crate::model::{ExtractedItem, ExtractionQuery, Field, Filter};
use serde_json::Value;

/// Runs before any page script. Hides the `navigator.webdriver` flag that
/// DevTools-driven browsers expose.
pub const STEALTH_INIT_SCRIPT: &str = r#"Object.defineProperty(navigator, 'webdriver', {
  get: () => false
});"#;

fn js_str(s: &str) -> String {
    // JSON string literals are valid JS string literals.
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

fn filter_expr(filter: &Filter) -> String {
    match filter {
        Filter::HasAttr(name) => format!("!!el.getAttribute({})", js_str(name)),
        Filter::AttrLongerThan { attr, len } => {
            format!("(el.getAttribute({}) || '').length > {len}", js_str(attr))
        }
    }
}

fn field_expr(field: &Field) -> String {
    match field {
        Field::Attr(name) => format!("el.getAttribute({})", js_str(name)),
        Field::InnerHtml => "el.innerHTML".to_string(),
    }
}

/// Compile `query` into an expression evaluating to an array of plain
/// objects, one per kept element, in document order.
pub fn query_script(query: &ExtractionQuery) -> String {
    let predicate = if query.filters.is_empty() {
        "true".to_string()
    } else {
        query
            .filters
            .iter()
            .map(filter_expr)
            .collect::<Vec<_>>()
            .join(" && ")
    };

    let projection = query
        .fields
        .iter()
        .map(|f| format!("{}: {}", js_str(f.key()), field_expr(f)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "(() => Array.from(document.querySelectorAll({selector}))\
         .filter(el => {predicate})\
         .slice(0, {cap})\
         .map(el => ({{ {projection} }})))()",
        selector = js_str(&query.selector),
        cap = query.cap,
    )
}

/// Turn the evaluated array back into items.
///
/// Field order comes from the query, not from the JSON object. `null` and
/// non-string values are treated as absent.
pub fn decode_records(query: &ExtractionQuery, value: Value) -> Result<Vec<ExtractedItem>, String> {
    let records = match value {
        Value::Array(records) => records,
        Value::Null => return Ok(Vec::new()),
        other => return Err(format!("expected an array, got {other}")),
    };

    records
        .into_iter()
        .map(|record| {
            let Value::Object(map) = record else {
                return Err(format!("expected an object, got {record}"));
            };
            let mut item = ExtractedItem::new();
            for field in &query.fields {
                if let Some(Value::String(v)) = map.get(field.key()) {
                    item.insert(field.key(), v.as_str());
                }
            }
            Ok(item)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_script_shape() {
        let q = ExtractionQuery::model_listing("/en/models/", 5);
        let js = query_script(&q);
        assert!(js.contains(r#"document.querySelectorAll("a[href^=\"/en/models/\"]")"#));
        assert!(js.contains("(el.getAttribute(\"href\") || '').length > 11"));
        assert!(js.contains("!!el.getAttribute(\"title\")"));
        assert!(js.contains(".slice(0, 5)"));
        assert!(js.contains("\"inner_html\": el.innerHTML"));
    }

    #[test]
    fn test_decode_records_follows_projection_order() {
        let q = ExtractionQuery::model_listing("/en/models/", 5);
        let value = json!([
            { "title": "Boat", "inner_html": "<img>", "href": "/en/models/1" },
            { "href": "/en/models/2", "title": null, "inner_html": "" }
        ]);
        let items = decode_records(&q, value).unwrap();
        assert_eq!(items.len(), 2);
        let keys: Vec<_> = items[0].fields().map(|(k, _)| k).collect();
        assert_eq!(keys, ["href", "title", "inner_html"]);
        assert_eq!(items[1].get("title"), None);
    }

    #[test]
    fn test_decode_records_rejects_non_array() {
        let q = ExtractionQuery::preview_images("cover", 5);
        assert!(decode_records(&q, json!({"src": "x"})).is_err());
        assert!(decode_records(&q, Value::Null).unwrap().is_empty());
    }
}
