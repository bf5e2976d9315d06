//! Query-string parsing for loaders and search validators.

use serde_json::{Map, Value};

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
}

/// Parses `?a=1&b=2&a=3` into `{"a": ["1", "3"], "b": "2"}`.
///
/// A leading `?` is optional. Keys without `=` get an empty value; repeated
/// keys collect into an array in order of appearance.
///
/// ```
/// use onyx_router::search::parse_search_string;
/// use serde_json::json;
///
/// let parsed = parse_search_string("?tag=a&q=hello+world&tag=b%20c");
/// assert_eq!(serde_json::Value::Object(parsed), json!({
///     "tag": ["a", "b c"],
///     "q": "hello world",
/// }));
/// ```
pub fn parse_search_string(search: &str) -> Map<String, Value> {
    let mut params = Map::new();

    for pair in search.trim_start_matches('?').split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key);
        let value = Value::String(decode_component(value));

        match params.get_mut(&key) {
            None => {
                params.insert(key, value);
            }
            Some(Value::Array(existing)) => existing.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }

    params
}
