//! Store adapter behavior against `wiremock` servers: no real network.

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pricewatch_core::{parse_stores, StoreConfig};
use pricewatch_ingest::{
    AmazonPaapiAdapter, ApiClient, Auth, CsvFeedParser, FeedAdapter, FeedParser, FetchStatus,
    HttpSettings, IngestError, JsonFeedParser, MercadoLibreAdapter, StoreAdapter,
};

fn store(yaml_entry: &str) -> StoreConfig {
    let yaml = format!("stores:\n{yaml_entry}");
    parse_stores(&yaml)
        .expect("invalid test store yaml")
        .stores
        .remove(0)
}

fn http() -> HttpSettings {
    HttpSettings {
        timeout_secs: 5,
        user_agent: "pricewatch-test/0.1".to_string(),
        html_max_retries: 0,
        html_backoff_base_secs: 0,
    }
}

// ---------------------------------------------------------------------------
// Mercado Libre
// ---------------------------------------------------------------------------

fn ml_store() -> StoreConfig {
    store(
        "  - key: mercadolibre\n    name: Mercado Libre\n    url: https://www.mercadolibre.com.mx\n    adapter: mercadolibre\n    rate_limit: 50\n",
    )
}

fn ml_item(id: &str, price: f64, quantity: i64) -> Value {
    json!({
        "id": id,
        "title": format!("Laptop  {id}"),
        "price": price,
        "currency_id": "MXN",
        "permalink": format!("https://articulo.mercadolibre.com.mx/{id}"),
        "thumbnail": format!("http://http2.mlstatic.com/D_{id}-I.jpg"),
        "available_quantity": quantity,
        "category_id": "MLM1652"
    })
}

fn ml_page(offset: u64, total: u64, items: Vec<Value>) -> Value {
    json!({
        "paging": {"total": total, "offset": offset, "limit": 50},
        "results": items
    })
}

#[tokio::test]
async fn mercadolibre_single_page_maps_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sites/MLM/search"))
        .and(query_param("q", "laptop"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ml_page(
            0,
            2,
            vec![
                ml_item("MLM1", 12_999.0, 3),
                ml_item("MLM2", 8_499.0, 0),
                json!({"id": "MLM3", "title": "Sin precio", "permalink": "https://x/3"}),
            ],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = MercadoLibreAdapter::from_config(&ml_store(), &http())
        .unwrap()
        .with_base_url(&server.uri());
    let outcome = adapter.fetch_products(Some("laptop"), None, 10).await;

    assert_eq!(outcome.status, FetchStatus::Complete);
    assert_eq!(outcome.products.len(), 2);
    let first = &outcome.products[0];
    assert_eq!(first.name, "Laptop MLM1");
    assert_eq!(first.sku.as_deref(), Some("MLM1"));
    assert_eq!(first.image_url, "http://http2.mlstatic.com/D_MLM1-O.jpg");
    assert_eq!(first.category.as_deref(), Some("MLM1652"));
    assert!(first.available);
    assert!(!outcome.products[1].available);
}

#[tokio::test]
async fn mercadolibre_large_limit_paginates_by_offset() {
    let server = MockServer::start().await;
    for (offset, ids) in [("0", ["A1", "A2"]), ("50", ["B1", "B2"]), ("100", ["C1", "C2"])] {
        let offset_num: u64 = offset.parse().unwrap();
        Mock::given(method("GET"))
            .and(path("/sites/MLM/search"))
            .and(query_param("offset", offset))
            .and(query_param("limit", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ml_page(
                offset_num,
                120,
                ids.iter().map(|id| ml_item(id, 100.0, 1)).collect(),
            )))
            .expect(1)
            .mount(&server)
            .await;
    }

    let adapter = MercadoLibreAdapter::from_config(&ml_store(), &http())
        .unwrap()
        .with_base_url(&server.uri());
    let outcome = adapter.fetch_products(Some("laptop"), None, 120).await;

    assert_eq!(outcome.status, FetchStatus::Complete);
    let skus: Vec<_> = outcome
        .products
        .iter()
        .filter_map(|p| p.sku.as_deref())
        .collect();
    assert_eq!(skus, vec!["A1", "A2", "B1", "B2", "C1", "C2"]);
}

#[tokio::test]
async fn mercadolibre_failure_after_first_page_is_partial() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sites/MLM/search"))
        .and(query_param("offset", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ml_page(0, 500, vec![ml_item("A1", 100.0, 1)])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sites/MLM/search"))
        .and(query_param("offset", "50"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let adapter = MercadoLibreAdapter::from_config(&ml_store(), &http())
        .unwrap()
        .with_base_url(&server.uri());
    let outcome = adapter.fetch_products(Some("laptop"), None, 200).await;

    assert!(matches!(outcome.status, FetchStatus::Partial(_)));
    assert_eq!(outcome.products.len(), 1);
    assert!(outcome.is_success());
}

#[tokio::test]
async fn mercadolibre_request_failure_is_reported_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sites/MLM/search"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "5"))
        .mount(&server)
        .await;

    let adapter = MercadoLibreAdapter::from_config(&ml_store(), &http())
        .unwrap()
        .with_base_url(&server.uri());
    let outcome = adapter.fetch_products(Some("laptop"), None, 10).await;

    assert!(outcome.products.is_empty());
    assert!(
        matches!(outcome.status, FetchStatus::Failed(ref reason) if reason.contains("rate limited")),
        "unexpected status: {:?}",
        outcome.status
    );
}

#[tokio::test]
async fn mercadolibre_lists_categories_and_tests_connection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sites/MLM/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "MLM1051", "name": "Celulares y Teléfonos"},
            {"id": "MLM1648", "name": "Computación"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sites/MLM"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "MLM", "name": "Mexico"})),
        )
        .mount(&server)
        .await;

    let adapter = MercadoLibreAdapter::from_config(&ml_store(), &http())
        .unwrap()
        .with_base_url(&server.uri());

    let categories = adapter.list_categories().await.unwrap();
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[1].name, "Computación");
    assert!(adapter.test_connection().await);
}

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

#[tokio::test]
async fn json_feed_downloads_with_api_key_and_filters_locally() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.json"))
        .and(header("X-API-Key", "s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"products": [
                {"title": "Pantalla TCL 50", "price": {"amount": 6999}, "link": "https://l/1", "category": "Electrónica"},
                {"title": "Lavadora LG", "price": "$9,999.00", "link": "https://l/2", "category": "Línea blanca"},
                {"title": "Pantalla Hisense 32", "price": 0, "link": "https://l/3"}
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let entry = format!(
        "  - key: liverpool\n    name: Liverpool\n    url: https://www.liverpool.com.mx\n    adapter: json_feed\n    settings:\n      feed_url: {}/feed.json\n      product_path: data.products\n      api_key: s3cret\n",
        server.uri()
    );
    let adapter = FeedAdapter::from_config(&store(&entry), &http()).unwrap();
    let outcome = adapter.fetch_products(Some("pantalla"), None, 10).await;

    assert_eq!(outcome.status, FetchStatus::Complete);
    assert_eq!(outcome.products.len(), 1);
    assert_eq!(outcome.products[0].name, "Pantalla TCL 50");
    assert!((outcome.products[0].price - 6999.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn xml_feed_uses_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/merchant.xml"))
        .and(header("Authorization", "Bearer tok"))
        .and(header("Accept", "*/*"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:g="http://base.google.com/ns/1.0">
  <entry><g:id>S1</g:id><g:title>Refrigerador Mabe</g:title><g:price>11,499 MXN</g:price><g:link>https://s/1</g:link><g:product_type>Hogar</g:product_type></entry>
  <entry><g:id>S2</g:id><g:title>Estufa Mabe</g:title><g:price>7,999 MXN</g:price><g:link>https://s/2</g:link></entry>
</feed>"#,
        ))
        .mount(&server)
        .await;

    let entry = format!(
        "  - key: sears\n    name: Sears\n    url: https://www.sears.com.mx\n    adapter: xml_feed\n    settings:\n      feed_url: {}/merchant.xml\n      access_token: tok\n",
        server.uri()
    );
    let adapter = FeedAdapter::from_config(&store(&entry), &http()).unwrap();

    let outcome = adapter.fetch_products(None, Some("hogar"), 10).await;
    assert_eq!(outcome.products.len(), 1);
    assert_eq!(outcome.products[0].sku.as_deref(), Some("S1"));

    assert!(adapter.test_connection().await);
}

#[tokio::test]
async fn csv_feed_with_column_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/export.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "descripcion,precio,liga,clave\nHorno Whirlpool,\"$3,299\",https://o/h,HW1\nTostador,abc,https://o/t,T1\n",
        ))
        .mount(&server)
        .await;

    let entry = format!(
        "  - key: outlet\n    name: Outlet\n    url: https://outlet.example.mx\n    adapter: csv_feed\n    settings:\n      feed_url: {}/export.csv\n      column_mapping: {{name: descripcion, price: precio, url: liga, sku: clave}}\n",
        server.uri()
    );
    let adapter = FeedAdapter::from_config(&store(&entry), &http()).unwrap();
    let outcome = adapter.fetch_products(None, None, 10).await;

    assert_eq!(outcome.products.len(), 1);
    assert_eq!(outcome.products[0].sku.as_deref(), Some("HW1"));
    assert!((outcome.products[0].price - 3299.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn feed_parser_reads_from_url_with_store_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalog.json"))
        .and(header("X-Feed-Key", "k1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "Bocina JBL", "price": "$1,299.00", "url": "https://s/jbl"},
            {"name": "Audifonos Sony", "price": 0, "url": "https://s/sony"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let auth = Auth::ApiKey {
        header: "X-Feed-Key".to_string(),
        key: "k1".to_string(),
    };
    let client = ApiClient::new(&http(), &server.uri(), auth, 10).unwrap();
    let parser = FeedParser::Json(JsonFeedParser::new("Tienda"));

    let products = parser
        .parse_from_url(&client, &format!("{}/catalog.json", server.uri()))
        .await
        .unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].name, "Bocina JBL");
    assert!((products[0].price - 1299.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn feed_parser_surfaces_download_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = ApiClient::new(&http(), &server.uri(), Auth::None, 10).unwrap();
    let parser = FeedParser::Csv(CsvFeedParser::new("Tienda"));
    let err = parser.parse_from_url(&client, "/export.csv").await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::UnexpectedStatus { status: 503, .. }
    ));
}

#[tokio::test]
async fn feed_without_url_is_not_configured() {
    let adapter = FeedAdapter::from_config(
        &store("  - key: coppel\n    name: Coppel\n    url: https://www.coppel.com\n    adapter: json_feed\n"),
        &http(),
    )
    .unwrap();

    let outcome = adapter.fetch_products(Some("tv"), None, 10).await;
    assert!(matches!(outcome.status, FetchStatus::NotConfigured(_)));
    assert!(outcome.products.is_empty());
    assert!(!adapter.test_connection().await);
}

#[tokio::test]
async fn feed_download_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let entry = format!(
        "  - key: coppel\n    name: Coppel\n    url: https://www.coppel.com\n    adapter: json_feed\n    settings:\n      feed_url: {}/feed.json\n",
        server.uri()
    );
    let adapter = FeedAdapter::from_config(&store(&entry), &http()).unwrap();
    let outcome = adapter.fetch_products(None, None, 10).await;

    assert!(matches!(outcome.status, FetchStatus::Failed(ref r) if r.contains("not found")));
}

// ---------------------------------------------------------------------------
// Amazon PA-API
// ---------------------------------------------------------------------------

#[tokio::test]
async fn amazon_sends_signed_search_items_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/paapi5/searchitems"))
        .and(header(
            "x-amz-target",
            "com.amazon.paapi5.v1.ProductAdvertisingAPIv1.SearchItems",
        ))
        .and(header("content-encoding", "amz-1.0"))
        .and(header_exists("x-amz-date"))
        .and(header_exists("authorization"))
        .and(body_partial_json(json!({
            "Keywords": "echo",
            "ItemCount": 10,
            "PartnerTag": "tienda-20",
            "PartnerType": "Associates",
            "Marketplace": "www.amazon.com.mx"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "SearchResult": {"Items": [{
                "ASIN": "B0ECHO",
                "DetailPageURL": "https://www.amazon.com.mx/dp/B0ECHO",
                "ItemInfo": {"Title": {"DisplayValue": "Echo Dot 5a gen"}},
                "Offers": {"Listings": [{"Price": {"Amount": 1099.0, "Currency": "MXN"}}]},
                "Images": {"Primary": {"Large": {"URL": "https://m.media-amazon.com/e.jpg"}}}
            }]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = store(
        "  - key: amazon\n    name: Amazon MX\n    url: https://www.amazon.com.mx\n    adapter: amazon_paapi\n    settings: {access_key: AKID, secret_key: SECRET, partner_tag: tienda-20}\n",
    );
    let adapter = AmazonPaapiAdapter::from_config(&config, &http())
        .unwrap()
        .with_base_url(&format!("{}/paapi5", server.uri()));

    let outcome = adapter.fetch_products(Some("echo"), None, 25).await;

    assert_eq!(outcome.status, FetchStatus::Complete);
    assert_eq!(outcome.products.len(), 1);
    assert_eq!(outcome.products[0].sku.as_deref(), Some("B0ECHO"));
    assert_eq!(
        outcome.products[0].store_url,
        "https://www.amazon.com.mx/dp/B0ECHO"
    );
}

#[tokio::test]
async fn amazon_without_credentials_never_calls_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = store(
        "  - key: amazon\n    name: Amazon MX\n    url: https://www.amazon.com.mx\n    adapter: amazon_paapi\n    settings: {access_key: AKID}\n",
    );
    let adapter = AmazonPaapiAdapter::from_config(&config, &http())
        .unwrap()
        .with_base_url(&format!("{}/paapi5", server.uri()));

    let outcome = adapter.fetch_products(Some("echo"), None, 10).await;
    assert!(matches!(outcome.status, FetchStatus::NotConfigured(_)));
    assert!(!adapter.test_connection().await);
}
