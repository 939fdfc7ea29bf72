use pricewatch_core::Product;
use serde_json::{json, Map, Value};

use super::{non_blank, parse_available, Field, FieldMapping, RawFields};
use crate::error::IngestError;

/// Keys scanned for the product array when no path is configured or the
/// configured path does not resolve.
const CONTAINER_KEYS: [&str; 5] = ["products", "items", "data", "results", "records"];

/// Parser for JSON catalogs: a bare array, or an object holding the array
/// under a dotted `product_path` or one of the common container keys.
#[derive(Debug, Clone)]
pub struct JsonFeedParser {
    store_name: String,
    product_path: Option<String>,
    mapping: FieldMapping,
}

impl JsonFeedParser {
    #[must_use]
    pub fn new(store_name: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
            product_path: None,
            mapping: FieldMapping::default(),
        }
    }

    /// Dotted path to the array, e.g. `"data.items"`.
    #[must_use]
    pub fn with_product_path(mut self, path: Option<String>) -> Self {
        self.product_path = path.filter(|p| !p.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_mapping(mut self, mapping: FieldMapping) -> Self {
        self.mapping = mapping;
        self
    }

    /// # Errors
    ///
    /// Returns [`IngestError::Deserialize`] when `content` is not JSON.
    pub fn parse_str(&self, content: &str) -> Result<Vec<Product>, IngestError> {
        let value: Value =
            serde_json::from_str(content).map_err(|e| IngestError::Deserialize {
                context: format!("{} JSON feed", self.store_name),
                source: e,
            })?;
        Ok(self.parse_value(&value))
    }

    /// Parses an already-decoded document. Yields an empty list when no
    /// product array can be found.
    #[must_use]
    pub fn parse_value(&self, value: &Value) -> Vec<Product> {
        let Some(items) = self.locate_items(value) else {
            tracing::debug!(store = %self.store_name, "no product array found in JSON feed");
            return Vec::new();
        };

        items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                let Some(obj) = item.as_object() else {
                    tracing::debug!(store = %self.store_name, index, "skipping non-object JSON item");
                    return None;
                };
                match self.extract(obj).into_product(&self.store_name) {
                    Ok(product) => Some(product),
                    Err(reason) => {
                        tracing::debug!(store = %self.store_name, index, reason = %reason, "skipping JSON item");
                        None
                    }
                }
            })
            .collect()
    }

    fn locate_items<'v>(&self, value: &'v Value) -> Option<&'v Vec<Value>> {
        if let Some(items) = value.as_array() {
            return Some(items);
        }
        let obj = value.as_object()?;

        if let Some(path) = &self.product_path {
            let found = path
                .split('.')
                .try_fold(value, |current, key| current.get(key))
                .and_then(Value::as_array);
            if found.is_some() {
                return found;
            }
            tracing::debug!(
                store = %self.store_name,
                path = %path,
                "product_path did not resolve to an array, scanning common keys"
            );
        }

        CONTAINER_KEYS.iter().find_map(|key| match obj.get(*key)? {
            Value::Array(items) => Some(items),
            Value::Object(inner) => inner.get("items").and_then(Value::as_array),
            _ => None,
        })
    }

    fn extract(&self, obj: &Map<String, Value>) -> RawFields {
        let text = |field: Field| self.mapping.resolve(field, |key| obj.get(key).and_then(scalar_text));

        let price = self.mapping.resolve(Field::Price, |key| {
            obj.get(key).filter(|v| scalar_text(v).is_some())
        });

        RawFields {
            name: text(Field::Name),
            price: price.and_then(scalar_text),
            price_value: price.and_then(price_number),
            url: text(Field::Url),
            image: text(Field::Image),
            category: text(Field::Category),
            sku: text(Field::Sku),
            currency: text(Field::Currency),
            available: self.mapping.resolve(Field::Available, |key| {
                match obj.get(key)? {
                    Value::Bool(b) => Some(*b),
                    other => scalar_text(other).and_then(|s| parse_available(&s)),
                }
            }),
        }
    }
}

/// String form of a scalar, unwrapping `{"value"|"text"|"amount": ...}`.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(obj) => ["value", "text", "amount"]
            .iter()
            .find_map(|k| obj.get(*k))
            .and_then(scalar_text),
        Value::Null | Value::Array(_) => None,
    }
}

/// Numeric price carried directly as a JSON number (possibly nested).
fn price_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Object(obj) => ["value", "amount"]
            .iter()
            .find_map(|k| obj.get(*k))
            .and_then(price_number),
        _ => None,
    }
}

/// Serializes records with the canonical feed keys so [`JsonFeedParser`]
/// reads them back unchanged.
#[must_use]
pub fn to_feed_json(products: &[Product]) -> Value {
    Value::Array(
        products
            .iter()
            .map(|p| {
                let mut obj = json!({
                    "name": p.name,
                    "price": p.price,
                    "url": p.store_url,
                    "currency": p.currency,
                    "available": p.available,
                });
                if let Some(map) = obj.as_object_mut() {
                    if !p.image_url.is_empty() {
                        map.insert("image_url".to_string(), json!(p.image_url));
                    }
                    if let Some(category) = &p.category {
                        map.insert("category".to_string(), json!(category));
                    }
                    if let Some(sku) = &p.sku {
                        map.insert("sku".to_string(), json!(sku));
                    }
                }
                obj
            })
            .collect(),
    )
}
