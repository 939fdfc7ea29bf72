//! Integration tests for `fetch_all_pages` against a local mock server.

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pricewatch_ingest::{
    fetch_all_pages, ApiClient, Auth, HttpSettings, JsonFeedParser, PageParam, PageRequest,
    PageStop,
};

fn test_client(base: &str) -> ApiClient {
    ApiClient::new(&HttpSettings::default(), base, Auth::None, 100)
        .expect("failed to build test ApiClient")
}

fn product(name: &str, price: f64) -> Value {
    json!({"name": name, "price": price, "url": format!("https://tienda.example.mx/{name}")})
}

async fn mount_page(server: &MockServer, page: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("page", page))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn stops_at_empty_page_and_keeps_earlier_pages_only() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "1",
        json!({"has_next": true, "products": [product("a", 1.0), product("b", 2.0)]}),
    )
    .await;
    mount_page(
        &server,
        "2",
        json!({"has_next": true, "products": [product("c", 3.0)]}),
    )
    .await;
    mount_page(&server, "3", json!({"has_next": true, "products": []})).await;

    let client = test_client(&server.uri());
    let parser = JsonFeedParser::new("Tienda");
    let request = PageRequest::new(
        "/products",
        vec![("q".to_string(), "tv".to_string())],
        PageParam::Number {
            name: "page".to_string(),
        },
    );

    let fetched = fetch_all_pages(&client, request, |v| parser.parse_value(v)).await;

    let names: Vec<_> = fetched.products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert_eq!(fetched.pages_fetched, 3);
    assert_eq!(fetched.stop, PageStop::EmptyPage);
}

#[tokio::test]
async fn nested_paging_total_pages_stops_after_last_page() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "1",
        json!({"paging": {"total_pages": 2}, "items": [product("a", 1.0)]}),
    )
    .await;
    mount_page(
        &server,
        "2",
        json!({"paging": {"total_pages": 2}, "items": [product("b", 2.0)]}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let parser = JsonFeedParser::new("Tienda");
    let request = PageRequest::new(
        "/products",
        Vec::new(),
        PageParam::Number {
            name: "page".to_string(),
        },
    );

    let fetched = fetch_all_pages(&client, request, |v| parser.parse_value(v)).await;

    assert_eq!(fetched.products.len(), 2);
    assert_eq!(fetched.pages_fetched, 2);
    assert_eq!(fetched.stop, PageStop::NoMorePages);
}

#[tokio::test]
async fn unknown_response_shape_stops_after_first_page() {
    let server = MockServer::start().await;
    mount_page(&server, "1", json!({"products": [product("a", 1.0)]})).await;

    let client = test_client(&server.uri());
    let parser = JsonFeedParser::new("Tienda");
    let request = PageRequest::new(
        "/products",
        Vec::new(),
        PageParam::Number {
            name: "page".to_string(),
        },
    );

    let fetched = fetch_all_pages(&client, request, |v| parser.parse_value(v)).await;

    assert_eq!(fetched.products.len(), 1);
    assert_eq!(fetched.stop, PageStop::NoMorePages);
}

#[tokio::test]
async fn failed_page_returns_partial_results() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "1",
        json!({"next_page": 2, "products": [product("a", 1.0)]}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let parser = JsonFeedParser::new("Tienda");
    let request = PageRequest::new(
        "/products",
        Vec::new(),
        PageParam::Number {
            name: "page".to_string(),
        },
    );

    let fetched = fetch_all_pages(&client, request, |v| parser.parse_value(v)).await;

    assert_eq!(fetched.products.len(), 1);
    assert_eq!(fetched.pages_fetched, 1);
    assert!(
        matches!(fetched.stop, PageStop::RequestFailed(ref reason) if reason.contains("503")),
        "unexpected stop: {:?}",
        fetched.stop
    );
}

#[tokio::test]
async fn page_cap_is_respected() {
    let server = MockServer::start().await;
    for page in ["1", "2"] {
        mount_page(
            &server,
            page,
            json!({"has_next": true, "products": [product(page, 1.0)]}),
        )
        .await;
    }

    let client = test_client(&server.uri());
    let parser = JsonFeedParser::new("Tienda");
    let request = PageRequest::new(
        "/products",
        Vec::new(),
        PageParam::Number {
            name: "page".to_string(),
        },
    )
    .max_pages(2);

    let fetched = fetch_all_pages(&client, request, |v| parser.parse_value(v)).await;

    assert_eq!(fetched.products.len(), 2);
    assert_eq!(fetched.stop, PageStop::MaxPages);
}
