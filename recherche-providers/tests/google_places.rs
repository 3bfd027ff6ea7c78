use httpmock::prelude::*;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use recherche_core::{RechercheProvider, SearchQuery};
use recherche_providers::GooglePlacesProvider;

fn place(i: usize) -> Value {
    json!({
        "id": format!("gp-{i}"),
        "displayName": { "text": format!("Ristorante {i}") },
        "formattedAddress": format!("Beispielstraße {i}, 44135 Dortmund"),
        "websiteUri": format!("https://ristorante-{i}.example"),
        "location": { "latitude": 51.5, "longitude": 7.25 },
        "rating": 4.2,
        "userRatingCount": 17,
        "primaryType": "restaurant",
        "types": ["restaurant", "food"]
    })
}

fn page_body(max_result_count: usize, page_token: Option<&str>) -> Value {
    let mut body = json!({
        "includedTypes": ["restaurant"],
        "languageCode": "de",
        "locationRestriction": {
            "circle": {
                "center": { "latitude": 51.5, "longitude": 7.25 },
                "radius": 3000.0,
            }
        },
        "maxResultCount": max_result_count,
    });
    if let Some(token) = page_token {
        body["pageToken"] = json!(token);
    }
    body
}

fn query() -> SearchQuery {
    SearchQuery::new(51.5, 7.25, 3000, "Restaurant").with_max_results(25)
}

#[tokio::test]
async fn paginates_until_max_results_and_accounts_per_request() {
    let server = MockServer::start_async().await;

    let page1 = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/places:searchNearby")
                .header("X-Goog-Api-Key", "test-key")
                .json_body(page_body(20, None));
            then.status(200).json_body(json!({
                "places": (0..20).map(place).collect::<Vec<_>>(),
                "nextPageToken": "tok2",
            }));
        })
        .await;
    let page2 = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/places:searchNearby")
                .json_body(page_body(5, Some("tok2")));
            then.status(200).json_body(json!({
                "places": (20..25).map(place).collect::<Vec<_>>(),
            }));
        })
        .await;

    let provider = GooglePlacesProvider::with_base_url("test-key", server.base_url()).unwrap();
    let outcome = provider.search(&query()).await.unwrap();

    page1.assert_async().await;
    page2.assert_async().await;
    assert_eq!(outcome.records.len(), 25);
    assert_eq!(outcome.api_cost_usd, Decimal::new(64, 3)); // 2 requests x $0.032
    let first = &outcome.records[0];
    assert_eq!(first.source, "google_places");
    assert_eq!(first.external_id.as_deref(), Some("gp-0"));
    assert_eq!(first.payload["rating"], json!(4.2));
}

#[tokio::test]
async fn mid_pagination_failure_returns_partial_collection() {
    let server = MockServer::start_async().await;

    // Only the first page is mocked; the pageToken follow-up 404s and the
    // driver keeps what it already collected.
    let page1 = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/places:searchNearby")
                .json_body(page_body(20, None));
            then.status(200).json_body(json!({
                "places": (0..20).map(place).collect::<Vec<_>>(),
                "nextPageToken": "tok2",
            }));
        })
        .await;

    let provider = GooglePlacesProvider::with_base_url("test-key", server.base_url()).unwrap();
    let outcome = provider.search(&query()).await.unwrap();

    page1.assert_async().await;
    assert_eq!(outcome.records.len(), 20);
    assert_eq!(outcome.api_cost_usd, Decimal::new(32, 3));
}

#[tokio::test]
async fn server_error_yields_empty_outcome_at_no_cost() {
    let server = MockServer::start_async().await;
    let failing = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/places:searchNearby");
            then.status(503).body("backend unavailable");
        })
        .await;

    let provider = GooglePlacesProvider::with_base_url("test-key", server.base_url()).unwrap();
    let outcome = provider.search(&query()).await.unwrap();

    failing.assert_async().await;
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.api_cost_usd, Decimal::ZERO);
}

#[tokio::test]
async fn short_page_terminates_the_loop() {
    let server = MockServer::start_async().await;
    let page = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/places:searchNearby");
            then.status(200).json_body(json!({
                "places": (0..3).map(place).collect::<Vec<_>>(),
            }));
        })
        .await;

    let provider = GooglePlacesProvider::with_base_url("test-key", server.base_url()).unwrap();
    let outcome = provider
        .search(&SearchQuery::new(51.5, 7.25, 3000, "Restaurant"))
        .await
        .unwrap();

    assert_eq!(page.hits_async().await, 1);
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.api_cost_usd, Decimal::new(32, 3));
}

#[tokio::test]
async fn missing_api_key_means_not_configured_and_no_requests() {
    let server = MockServer::start_async().await;
    let catch_all = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({ "places": [] }));
        })
        .await;

    let provider = GooglePlacesProvider::with_base_url("", server.base_url()).unwrap();
    assert!(!provider.configured());

    let outcome = provider.search(&query()).await.unwrap();
    assert!(outcome.records.is_empty());
    assert_eq!(catch_all.hits_async().await, 0);
}
