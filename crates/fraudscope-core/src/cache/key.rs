//! Hierarchical cache keys.
//!
//! A key is an ordered list of segments: a resource domain, a sub-resource,
//! then any parameters. Parameter objects are rendered canonically (object
//! fields sorted, null fields and empty objects dropped) so two parameter
//! values with the same content always produce the same key.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    segments: Vec<String>,
}

impl QueryKey {
    /// Start a key at a resource domain such as `transactions`.
    pub fn root(domain: &str) -> Self {
        Self {
            segments: vec![canonical(&Value::String(domain.to_string()))],
        }
    }

    /// Append a named sub-resource.
    pub fn child(mut self, name: &str) -> Self {
        self.segments.push(canonical(&Value::String(name.to_string())));
        self
    }

    /// Append a parameter segment. Absent parameters add nothing.
    pub fn param<P: Serialize>(mut self, param: &P) -> Self {
        let value = serde_json::to_value(param).unwrap_or(Value::Null);
        let value = normalize(value);
        if !is_absent(&value) {
            self.segments.push(canonical(&value));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether `prefix` names this key or one of its ancestors.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<&str> = self
            .segments
            .iter()
            .map(|s| {
                s.strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .unwrap_or(s)
            })
            .collect();
        write!(f, "{}", rendered.join("/"))
    }
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Drop null object fields and empty nested objects, recursively.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !is_absent(v))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}

/// Render JSON with object fields in sorted order, independent of how the
/// map type orders its entries.
fn canonical(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_field_order_does_not_matter() {
        let a = QueryKey::root("transactions")
            .child("search")
            .param(&json!({"min_amount": 10, "max_amount": 50, "page": 1}));
        let b = QueryKey::root("transactions")
            .child("search")
            .param(&json!({"page": 1, "max_amount": 50, "min_amount": 10}));
        assert_eq!(a, b);
    }

    #[test]
    fn test_absent_params_are_dropped() {
        let bare = QueryKey::root("transactions").child("list");
        assert_eq!(bare.clone().param(&None::<u32>), bare);
        assert_eq!(bare.clone().param(&json!({})), bare);
        assert_eq!(bare.clone().param(&json!({"page": null})), bare);
        assert_ne!(bare.clone().param(&json!({"page": 2})), bare);
    }

    #[test]
    fn test_prefix_matching() {
        let list = QueryKey::root("transactions").child("list");
        let page = list.clone().param(&json!({"page": 3}));
        let stats = QueryKey::root("transactions").child("stats");

        assert!(page.starts_with(&list));
        assert!(page.starts_with(&QueryKey::root("transactions")));
        assert!(!stats.starts_with(&list));
        assert!(!list.starts_with(&page));
    }

    #[test]
    fn test_segments_do_not_collide_with_strings() {
        let numeric = QueryKey::root("transactions").child("detail").param(&5);
        let text = QueryKey::root("transactions").child("detail").param(&"5");
        assert_ne!(numeric, text);
    }

    #[test]
    fn test_display_is_readable() {
        let key = QueryKey::root("transactions")
            .child("account")
            .param(&42)
            .param(&json!({"page": 1}));
        assert_eq!(key.to_string(), r#"transactions/account/42/{"page":1}"#);
    }

    fn shuffled_object(pairs: &[(String, i64)], order: &[usize]) -> Value {
        let mut map = serde_json::Map::new();
        for &i in order {
            let (k, v) = &pairs[i % pairs.len()];
            map.insert(k.clone(), json!(v));
        }
        for (k, v) in pairs {
            map.entry(k.clone()).or_insert(json!(v));
        }
        Value::Object(map)
    }

    proptest! {
        #[test]
        fn prop_key_ignores_insertion_order(
            pairs in prop::collection::btree_map("[a-z_]{1,12}", any::<i64>(), 1..8),
            order in prop::collection::vec(any::<usize>(), 0..16),
        ) {
            let pairs: Vec<(String, i64)> = pairs.into_iter().collect();
            let forward = shuffled_object(&pairs, &[]);
            let reordered = shuffled_object(&pairs, &order);
            let mut reversed_pairs = pairs.clone();
            reversed_pairs.reverse();
            let reversed = shuffled_object(&reversed_pairs, &[]);

            let base = QueryKey::root("transactions").child("search");
            let k1 = base.clone().param(&forward);
            prop_assert_eq!(&k1, &base.clone().param(&reordered));
            prop_assert_eq!(&k1, &base.param(&reversed));
        }
    }
}
