//! Query-string construction for endpoint paths.

use serde_json::Value;
use url::form_urlencoded;

/// Append `params` to `path` as a query string.
///
/// `Null` values are skipped, strings are used verbatim and any other value
/// is rendered as its JSON text. Pairs keep the iteration order of `params`
/// and are form-URL-encoded. When nothing remains, `path` is returned as-is.
///
/// ```rust
/// # use screeps_gateway::build_endpoint_with_query;
/// # use serde_json::{json, Value};
/// let endpoint = build_endpoint_with_query(
///     "/game/room-objects",
///     [("room", json!("W1N1")), ("shard", Value::Null), ("limit", json!(5))],
/// );
/// assert_eq!(endpoint, "/game/room-objects?room=W1N1&limit=5");
/// ```
pub fn build_endpoint_with_query<I, K>(path: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, Value)>,
    K: AsRef<str>,
{
    let mut query = form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (key, value) in params {
        let value = match value {
            Value::Null => continue,
            Value::String(s) => s,
            other => other.to_string(),
        };
        query.append_pair(key.as_ref(), &value);
        any = true;
    }

    if !any {
        return path.to_string();
    }
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}{}", query.finish())
}
