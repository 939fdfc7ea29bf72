use std::collections::HashMap;

use pricewatch_core::Product;

use super::{non_blank, parse_available, Field, FieldMapping, RawFields};
use crate::error::IngestError;

/// Header-driven CSV catalog parser.
#[derive(Debug, Clone)]
pub struct CsvFeedParser {
    store_name: String,
    mapping: FieldMapping,
}

impl CsvFeedParser {
    #[must_use]
    pub fn new(store_name: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
            mapping: FieldMapping::default(),
        }
    }

    #[must_use]
    pub fn with_mapping(mut self, mapping: FieldMapping) -> Self {
        self.mapping = mapping;
        self
    }

    /// Parses CSV text with a header row. Rows with a bad price or a broken
    /// record shape are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Csv`] if the header row cannot be read.
    pub fn parse_str(&self, content: &str) -> Result<Vec<Product>, IngestError> {
        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(::csv::Trim::All)
            .from_reader(content.trim().as_bytes());

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut products = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(store = %self.store_name, row = index + 1, error = %e, "skipping unreadable CSV row");
                    continue;
                }
            };

            let row: HashMap<&str, &str> = headers
                .iter()
                .map(String::as_str)
                .zip(record.iter())
                .collect();

            match self.extract(&row).into_product(&self.store_name) {
                Ok(product) => products.push(product),
                Err(reason) => {
                    tracing::debug!(store = %self.store_name, row = index + 1, reason = %reason, "skipping CSV row");
                }
            }
        }

        Ok(products)
    }

    fn extract(&self, row: &HashMap<&str, &str>) -> RawFields {
        let text = |field: Field| {
            self.mapping
                .resolve(field, |key| row.get(key).and_then(|v| non_blank(v)))
        };

        RawFields {
            name: text(Field::Name),
            price: text(Field::Price),
            price_value: None,
            url: text(Field::Url),
            image: text(Field::Image),
            category: text(Field::Category),
            sku: text(Field::Sku),
            currency: text(Field::Currency),
            available: text(Field::Available).and_then(|v| parse_available(&v)),
        }
    }
}
