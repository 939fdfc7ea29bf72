//! Sequential page-number/offset pagination for JSON search APIs.
//!
//! Pages are fetched one at a time, starting at page 1, until a page parses
//! to zero records, the page cap is reached, the "has more" check says no,
//! or a request fails. A failure keeps what was already collected.

use pricewatch_core::Product;
use serde_json::Value;

use crate::client::ApiClient;

/// How the page position is sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageParam {
    /// `name=1`, `name=2`, ...
    Number { name: String },
    /// `name=0`, `name=page_size`, `name=2*page_size`, ...
    Offset { name: String, page_size: usize },
}

impl PageParam {
    fn pair(&self, page: usize) -> (String, String) {
        match self {
            PageParam::Number { name } => (name.clone(), page.to_string()),
            PageParam::Offset { name, page_size } => (
                name.clone(),
                page.saturating_sub(1).saturating_mul(*page_size).to_string(),
            ),
        }
    }
}

pub type HasMoreFn = fn(&Value, usize) -> bool;

pub struct PageRequest<'a> {
    pub endpoint: &'a str,
    pub params: Vec<(String, String)>,
    pub page_param: PageParam,
    pub max_pages: usize,
    /// Decides whether another page exists after `page`; defaults to
    /// [`has_more_pages`].
    pub has_more: HasMoreFn,
}

impl<'a> PageRequest<'a> {
    #[must_use]
    pub fn new(endpoint: &'a str, params: Vec<(String, String)>, page_param: PageParam) -> Self {
        Self {
            endpoint,
            params,
            page_param,
            max_pages: 10,
            has_more: has_more_pages,
        }
    }

    #[must_use]
    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    #[must_use]
    pub fn has_more(mut self, has_more: HasMoreFn) -> Self {
        self.has_more = has_more;
        self
    }
}

/// Why pagination ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStop {
    EmptyPage,
    NoMorePages,
    MaxPages,
    RequestFailed(String),
}

#[derive(Debug)]
pub struct PagedFetch {
    pub products: Vec<Product>,
    pub pages_fetched: usize,
    pub stop: PageStop,
}

/// Checks a raw page response for a "there is another page" signal.
///
/// Tried in order, first present signal wins:
/// 1. `has_next` boolean
/// 2. `next_page` (non-null means more)
/// 3. `total_pages` compared with `current_page`
/// 4. the same `next`/`total_pages` checks under a `paging` object
///
/// When none are present this returns `false`: pagination stops after the
/// current page rather than looping on an unknown response shape.
#[must_use]
pub fn has_more_pages(response: &Value, current_page: usize) -> bool {
    let Some(obj) = response.as_object() else {
        return false;
    };

    if let Some(flag) = obj.get("has_next") {
        return flag.as_bool().unwrap_or(false);
    }
    if let Some(next) = obj.get("next_page") {
        return !next.is_null();
    }
    if let Some(total) = obj.get("total_pages") {
        return total_pages_exceeds(total, current_page);
    }
    if let Some(paging) = obj.get("paging").and_then(Value::as_object) {
        if let Some(next) = paging.get("next") {
            return !next.is_null();
        }
        if let Some(total) = paging.get("total_pages") {
            return total_pages_exceeds(total, current_page);
        }
    }

    false
}

fn total_pages_exceeds(total: &Value, current_page: usize) -> bool {
    total
        .as_u64()
        .and_then(|t| usize::try_from(t).ok())
        .is_some_and(|t| current_page < t)
}

/// Fetches pages sequentially and parses each with `parse`.
///
/// Never fails: a request error on any page is logged and ends pagination
/// with the records gathered so far and [`PageStop::RequestFailed`].
pub async fn fetch_all_pages<F>(
    client: &ApiClient,
    request: PageRequest<'_>,
    parse: F,
) -> PagedFetch
where
    F: Fn(&Value) -> Vec<Product>,
{
    let mut products = Vec::new();
    let mut page = 1usize;
    let mut pages_fetched = 0usize;

    let stop = loop {
        if page > request.max_pages {
            break PageStop::MaxPages;
        }

        let mut params = request.params.clone();
        params.push(request.page_param.pair(page));

        let response = match client.get_json(request.endpoint, &params).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    endpoint = request.endpoint,
                    page,
                    error = %e,
                    "page request failed, keeping results so far"
                );
                break PageStop::RequestFailed(e.to_string());
            }
        };
        pages_fetched += 1;

        let page_products = parse(&response);
        if page_products.is_empty() {
            break PageStop::EmptyPage;
        }
        tracing::debug!(
            endpoint = request.endpoint,
            page,
            count = page_products.len(),
            "page fetched"
        );
        products.extend(page_products);

        if !(request.has_more)(&response, page) {
            break PageStop::NoMorePages;
        }
        page += 1;
    };

    PagedFetch {
        products,
        pages_fetched,
        stop,
    }
}
