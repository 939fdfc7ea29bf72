use std::collections::HashMap;

use pricewatch_core::Product;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use super::{non_blank, RawFields};
use crate::error::IngestError;

const ATOM_NS: &[u8] = b"http://www.w3.org/2005/Atom";
const GOOGLE_NS: &[u8] = b"http://base.google.com/ns/1.0";

/// Parser for XML catalogs.
///
/// Google Merchant feeds (Atom `<entry>` elements carrying `g:` fields) are
/// preferred. Only when that yields nothing are generic `<product>` elements
/// with flat `<name>/<price>/<url>/<image>/<category>/<sku>` children used.
#[derive(Debug, Clone)]
pub struct XmlFeedParser {
    store_name: String,
}

/// Element currently collecting fields, and the depth it opened at.
struct OpenItem {
    depth: usize,
    fields: HashMap<String, String>,
}

impl XmlFeedParser {
    #[must_use]
    pub fn new(store_name: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
        }
    }

    /// # Errors
    ///
    /// Returns [`IngestError::Xml`] when the document is not well-formed.
    pub fn parse_str(&self, content: &str) -> Result<Vec<Product>, IngestError> {
        let (entries, generic) = collect_items(content)?;

        let merchant = self.build(entries, "title", "link", "image_link", "product_type", "id");
        if !merchant.is_empty() {
            return Ok(merchant);
        }
        Ok(self.build(generic, "name", "url", "image", "category", "sku"))
    }

    fn build(
        &self,
        items: Vec<HashMap<String, String>>,
        name: &str,
        url: &str,
        image: &str,
        category: &str,
        sku: &str,
    ) -> Vec<Product> {
        items
            .into_iter()
            .enumerate()
            .filter_map(|(index, mut fields)| {
                if !fields.contains_key(name) {
                    tracing::debug!(store = %self.store_name, index, "skipping XML item without a name");
                    return None;
                }
                let raw = RawFields {
                    name: fields.remove(name),
                    price: fields.remove("price"),
                    url: fields.remove(url),
                    image: fields.remove(image),
                    category: fields.remove(category),
                    sku: fields.remove(sku),
                    ..RawFields::default()
                };
                match raw.into_product(&self.store_name) {
                    Ok(product) => Some(product),
                    Err(reason) => {
                        tracing::debug!(store = %self.store_name, index, reason = %reason, "skipping XML item");
                        None
                    }
                }
            })
            .collect()
    }
}

/// Walks the document once, collecting `g:` fields under each Atom `entry`
/// (at any depth) and unqualified direct children of each `<product>`.
fn collect_items(
    content: &str,
) -> Result<(Vec<HashMap<String, String>>, Vec<HashMap<String, String>>), IngestError> {
    let mut reader = NsReader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut products = Vec::new();
    let mut entry: Option<OpenItem> = None;
    let mut product: Option<OpenItem> = None;
    let mut depth = 0usize;
    let mut text_target: Option<(bool, String)> = None;

    loop {
        match reader.read_resolved_event()? {
            (ns, Event::Start(e)) => {
                depth += 1;
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                text_target = None;

                if is_ns(&ns, ATOM_NS) && local == "entry" {
                    entry = Some(OpenItem {
                        depth,
                        fields: HashMap::new(),
                    });
                } else if matches!(ns, ResolveResult::Unbound) && local == "product" {
                    product = Some(OpenItem {
                        depth,
                        fields: HashMap::new(),
                    });
                } else if entry.is_some() && is_ns(&ns, GOOGLE_NS) {
                    text_target = Some((true, local));
                } else if product
                    .as_ref()
                    .is_some_and(|p| depth == p.depth + 1)
                    && matches!(ns, ResolveResult::Unbound)
                {
                    text_target = Some((false, local));
                }
            }
            (_, Event::Text(e)) => {
                if let Some((in_entry, key)) = &text_target {
                    let text = e.unescape()?;
                    store_text(&mut entry, &mut product, *in_entry, key, &text);
                }
            }
            (_, Event::CData(e)) => {
                if let Some((in_entry, key)) = &text_target {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    store_text(&mut entry, &mut product, *in_entry, key, &text);
                }
            }
            (_, Event::End(_)) => {
                text_target = None;
                if entry.as_ref().is_some_and(|o| o.depth == depth) {
                    if let Some(done) = entry.take() {
                        entries.push(done.fields);
                    }
                }
                if product.as_ref().is_some_and(|o| o.depth == depth) {
                    if let Some(done) = product.take() {
                        products.push(done.fields);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            (_, Event::Eof) => break,
            _ => {}
        }
    }

    Ok((entries, products))
}

fn is_ns(ns: &ResolveResult<'_>, uri: &[u8]) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(bound)) if *bound == uri)
}

/// First occurrence of a field wins.
fn store_text(
    entry: &mut Option<OpenItem>,
    product: &mut Option<OpenItem>,
    in_entry: bool,
    key: &str,
    text: &str,
) {
    let target = if in_entry { entry } else { product };
    if let (Some(item), Some(value)) = (target.as_mut(), non_blank(text)) {
        item.fields.entry(key.to_string()).or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MERCHANT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:g="http://base.google.com/ns/1.0">
  <title>Sears catalog</title>
  <entry>
    <g:id>SRS-100</g:id>
    <g:title>Refrigerador Whirlpool</g:title>
    <g:price>15,999.00 MXN</g:price>
    <g:link>https://www.sears.com.mx/p/100</g:link>
    <g:image_link>https://img.sears.com.mx/100.jpg</g:image_link>
    <g:product_type>Hogar &amp; Cocina</g:product_type>
  </entry>
  <entry>
    <g:id>SRS-101</g:id>
    <g:title><![CDATA[Pantalla  LG 50"]]></g:title>
    <g:price>$8,499</g:price>
    <g:link>https://www.sears.com.mx/p/101</g:link>
  </entry>
  <entry>
    <g:id>SRS-102</g:id>
    <g:title>Sin precio</g:title>
  </entry>
</feed>"#;

    #[test]
    fn parses_google_merchant_entries() {
        let products = XmlFeedParser::new("Sears").parse_str(MERCHANT).unwrap();
        assert_eq!(products.len(), 2);

        let fridge = &products[0];
        assert_eq!(fridge.name, "Refrigerador Whirlpool");
        assert!((fridge.price - 15_999.0).abs() < f64::EPSILON);
        assert_eq!(fridge.store_url, "https://www.sears.com.mx/p/100");
        assert_eq!(fridge.image_url, "https://img.sears.com.mx/100.jpg");
        assert_eq!(fridge.category.as_deref(), Some("Hogar & Cocina"));
        assert_eq!(fridge.sku.as_deref(), Some("SRS-100"));

        let tv = &products[1];
        assert_eq!(tv.name, "Pantalla LG 50\"");
        assert!(tv.image_url.is_empty());
    }

    #[test]
    fn atom_title_is_not_mistaken_for_product_title() {
        let products = XmlFeedParser::new("Sears").parse_str(MERCHANT).unwrap();
        assert!(products.iter().all(|p| p.name != "Sears catalog"));
    }

    #[test]
    fn parses_generic_products_when_no_entries() {
        let xml = r"<catalog>
  <product>
    <name>Consola Xbox Series S</name>
    <price>$6,999.00</price>
    <url>https://s/xbox</url>
    <image>https://img/xbox.jpg</image>
    <category>Videojuegos</category>
    <sku>XB-S</sku>
  </product>
  <product>
    <name>Control</name>
    <price>abc</price>
    <url>https://s/control</url>
  </product>
</catalog>";
        let products = XmlFeedParser::new("Sears").parse_str(xml).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Consola Xbox Series S");
        assert_eq!(products[0].sku.as_deref(), Some("XB-S"));
        assert_eq!(products[0].category.as_deref(), Some("Videojuegos"));
    }

    #[test]
    fn generic_only_reads_direct_children() {
        let xml = r"<catalog><product>
  <name>Tablet</name>
  <price>2999</price>
  <url>https://s/t</url>
  <details><sku>NESTED</sku></details>
</product></catalog>";
        let products = XmlFeedParser::new("S").parse_str(xml).unwrap();
        assert_eq!(products.len(), 1);
        assert!(products[0].sku.is_none());
    }

    #[test]
    fn merchant_mode_excludes_generic_products() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:g="http://base.google.com/ns/1.0">
  <entry><g:title>A</g:title><g:price>10</g:price><g:link>https://s/a</g:link></entry>
  <extra xmlns=""><product><name>B</name><price>5</price><url>https://s/b</url></product></extra>
</feed>"#;
        let products = XmlFeedParser::new("S").parse_str(xml).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "A");
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let err = XmlFeedParser::new("S")
            .parse_str("<catalog><product></catalog>")
            .unwrap_err();
        assert!(matches!(err, IngestError::Xml(_)));
    }
}
