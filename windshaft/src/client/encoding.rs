//! Query string encoding of map definitions and request parameters.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::Value;

/// Characters escaped by JavaScript `encodeURIComponent`. The service decodes parameters the
/// same way browsers encode them, so url lengths match what a browser client would produce.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Ordered set of request parameters.
///
/// Parameters keep their insertion order in the query string. Inserting a parameter that is
/// already present replaces its value without moving it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryParams(Vec<(String, Value)>);

impl QueryParams {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the parameter `name` to `value`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing_value)) => *existing_value = value,
            None => self.0.push((name, value)),
        }
    }

    /// Same as [`QueryParams::insert`], but consumes and returns `self`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns the value of the parameter.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Returns a new set with `self` parameters first, overridden and followed by `other`.
    pub fn extended_with(&self, other: &QueryParams) -> Self {
        let mut result = self.clone();
        for (name, value) in other.iter() {
            result.insert(name, value.clone());
        }

        result
    }

    /// Iterates over parameters in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encodes the parameters into a query string, including the leading `?`. Empty set
    /// produces an empty string.
    ///
    /// * arrays are encoded as repeated `name[]=value` pairs,
    /// * objects are encoded as their JSON representation,
    /// * strings are encoded as is, other scalars as their JSON representation.
    pub fn to_query_string(&self) -> String {
        let mut pairs = vec![];
        for (name, value) in self.iter() {
            match value {
                Value::Array(values) => {
                    for value in values {
                        pairs.push(format!("{name}[]={}", encode_component(&scalar(value))));
                    }
                }
                Value::Object(_) => {
                    pairs.push(format!("{name}={}", encode_component(&value.to_string())));
                }
                _ => pairs.push(format!("{name}={}", encode_component(&scalar(value)))),
            }
        }

        if pairs.is_empty() {
            String::new()
        } else {
            format!("?{}", pairs.join("&"))
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = QueryParams::new();
        for (name, value) in iter {
            params.insert(name, value);
        }

        params
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Percent-encodes `value` the way `encodeURIComponent` does.
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn encode_component_matches_browsers() {
        assert_eq!(
            encode_component(r#"{"a":"b c"}"#),
            "%7B%22a%22%3A%22b%20c%22%7D"
        );
        assert_eq!(encode_component("-_.!~*'()"), "-_.!~*'()");
        assert_eq!(encode_component("é/#"), "%C3%A9%2F%23");
    }

    #[test]
    fn query_string_encoding() {
        let params: QueryParams = [
            ("config", json!(r#"{"a":1}"#)),
            ("api_key", json!("abc")),
            ("auth_token", json!(["t1", "t2"])),
            ("filters", json!({"layers": []})),
            ("zoom", json!(3)),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            params.to_query_string(),
            "?config=%7B%22a%22%3A1%7D&api_key=abc&auth_token[]=t1&auth_token[]=t2&filters=%7B%22layers%22%3A%5B%5D%7D&zoom=3"
        );
    }

    #[test]
    fn empty_params_produce_empty_query() {
        assert_eq!(QueryParams::new().to_query_string(), "");
    }

    #[test]
    fn insert_replaces_in_place() {
        let base = QueryParams::new().with("config", "{}");
        let extended = base.extended_with(&QueryParams::new().with("a", 1).with("config", "x"));

        assert_eq!(
            extended.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            vec!["config", "a"]
        );
        assert_eq!(extended.get("config"), Some(&json!("x")));
        assert_eq!(extended.len(), 2);
    }
}
