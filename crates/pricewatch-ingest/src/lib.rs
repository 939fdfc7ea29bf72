//! Provider ingestion: HTTP transport, feed parsers, pagination, and the
//! store adapters that turn upstream catalogs into validated [`Product`]s.
//!
//! [`Product`]: pricewatch_core::Product

pub mod adapters;
pub mod client;
pub mod error;
pub mod html;
pub mod pagination;
pub mod parsers;
pub mod rate_limit;

pub use adapters::{
    build_adapter, AmazonPaapiAdapter, FeedAdapter, FetchOutcome, FetchStatus,
    MercadoLibreAdapter, MlCategory, StoreAdapter, UnsupportedAdapter,
};
pub use client::{ApiClient, Auth, HttpSettings};
pub use error::IngestError;
pub use html::HtmlFetcher;
pub use pagination::{fetch_all_pages, has_more_pages, PageParam, PageRequest, PageStop, PagedFetch};
pub use parsers::{
    parse_price, to_feed_json, CsvFeedParser, FeedFormat, FeedParser, FieldMapping,
    JsonFeedParser, XmlFeedParser,
};
pub use rate_limit::RateLimiter;
