//! Google Places API (New) driver.
//!
//! Field-masked nearby search against the Places v1 API. Rich data (ratings,
//! opening hours, stable place ids) at roughly 0.032 USD per request, which
//! is why the premium tier runs on it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use recherche_core::{RawRecord, RechercheError, RechercheProvider, SearchOutcome, SearchQuery};

const PLACES_API_BASE: &str = "https://places.googleapis.com";
const SEARCH_NEARBY_PATH: &str = "/v1/places:searchNearby";

/// The API rejects circles wider than 50 km.
const MAX_RADIUS_M: u32 = 50_000;
/// Nearby search returns at most 20 places per page.
const PAGE_SIZE: usize = 20;

/// Response projection; the API bills by field family, so this stays minimal.
const FIELD_MASK: &str = "places.id,places.displayName,places.formattedAddress,\
places.nationalPhoneNumber,places.internationalPhoneNumber,\
places.websiteUri,places.googleMapsUri,\
places.location,places.rating,places.userRatingCount,\
places.primaryType,places.types,\
places.regularOpeningHours";

/// Driver for the Google Places API (New) nearby search.
pub struct GooglePlacesProvider {
    api_key: String,
    base_url: String,
    client: Client,
}

impl GooglePlacesProvider {
    /// Build a driver against the production endpoint.
    ///
    /// # Errors
    /// `Provider` when the HTTP client cannot be constructed.
    pub fn new(api_key: impl Into<String>) -> Result<Self, RechercheError> {
        Self::with_base_url(api_key, PLACES_API_BASE)
    }

    /// Build a driver against a custom endpoint (tests).
    ///
    /// # Errors
    /// `Provider` when the HTTP client cannot be constructed.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, RechercheError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RechercheError::provider("google_places", e.to_string()))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            client,
        })
    }

    fn request_body(&self, query: &SearchQuery, collected: usize, page_token: Option<&str>) -> serde_json::Value {
        let mut body = json!({
            "locationRestriction": {
                "circle": {
                    "center": { "latitude": query.lat, "longitude": query.lng },
                    "radius": f64::from(query.radius_m.min(MAX_RADIUS_M)),
                }
            },
            "maxResultCount": PAGE_SIZE.min(query.max_results - collected),
            "languageCode": "de",
            "includedTypes": [included_type(&query.term)],
        });
        if let Some(token) = page_token {
            body["pageToken"] = json!(token);
        }
        body
    }
}

/// Nearby search requires `includedTypes`; map common German search terms
/// onto place types and fall back to "restaurant".
fn included_type(term: &str) -> &'static str {
    match term.to_lowercase().as_str() {
        "restaurant" | "imbiss" => "restaurant",
        "café" | "cafe" => "cafe",
        "bar" => "bar",
        "bäckerei" => "bakery",
        "metzgerei" => "butcher_shop",
        "hotel" => "hotel",
        "apotheke" => "pharmacy",
        _ => "restaurant",
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchNearbyResponse {
    #[serde(default)]
    places: Vec<Place>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Place {
    id: Option<String>,
    display_name: Option<DisplayName>,
    formatted_address: Option<String>,
    national_phone_number: Option<String>,
    international_phone_number: Option<String>,
    website_uri: Option<String>,
    google_maps_uri: Option<String>,
    location: Option<LatLng>,
    rating: Option<f64>,
    user_rating_count: Option<u32>,
    primary_type: Option<String>,
    #[serde(default)]
    types: Vec<String>,
    regular_opening_hours: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DisplayName {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

fn normalize(place: Place) -> Option<RawRecord> {
    let name = place
        .display_name
        .as_ref()
        .and_then(|d| d.text.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty())?
        .to_string();

    let payload = json!({
        "place_id": place.id.clone(),
        "rating": place.rating,
        "user_rating_count": place.user_rating_count,
        "types": place.types,
        "google_maps_uri": place.google_maps_uri,
        "opening_hours": place.regular_opening_hours,
    });

    Some(RawRecord {
        source: "google_places".to_string(),
        external_id: place.id,
        name,
        address: place.formatted_address,
        postal_code: None,
        city: None,
        phone: place
            .national_phone_number
            .or(place.international_phone_number),
        email: None,
        website: place.website_uri,
        category: place.primary_type,
        lat: place.location.as_ref().and_then(|l| l.latitude),
        lng: place.location.as_ref().and_then(|l| l.longitude),
        payload,
    })
}

#[async_trait]
impl RechercheProvider for GooglePlacesProvider {
    fn name(&self) -> &'static str {
        "google_places"
    }

    fn configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn cost_per_request(&self) -> Decimal {
        // ~$0.032 per nearby-search request.
        Decimal::new(32, 3)
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome, RechercheError> {
        if !self.configured() {
            tracing::warn!("google places api key not configured, skipping");
            return Ok(SearchOutcome::default());
        }

        let url = format!("{}{}", self.base_url, SEARCH_NEARBY_PATH);
        let mut records: Vec<RawRecord> = Vec::new();
        let mut page_token: Option<String> = None;
        let mut request_count = 0u32;

        while records.len() < query.max_results {
            let body = self.request_body(query, records.len(), page_token.as_deref());
            let response = match self
                .client
                .post(&url)
                .header("X-Goog-Api-Key", &self.api_key)
                .header("X-Goog-FieldMask", FIELD_MASK)
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(error = %e, "google places request error");
                    break;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                tracing::error!(%status, body = %text, "google places api error");
                break;
            }
            request_count += 1;

            let page: SearchNearbyResponse = match response.json().await {
                Ok(p) => p,
                Err(e) => {
                    tracing::error!(error = %e, "google places response parse error");
                    break;
                }
            };

            if page.places.is_empty() {
                break;
            }
            records.extend(page.places.into_iter().filter_map(normalize));

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        // The API reports no cost in the response; estimate from request count.
        let api_cost_usd = Decimal::from(request_count) * self.cost_per_request();
        tracing::info!(
            results = records.len(),
            requests = request_count,
            term = %query.term,
            lat = query.lat,
            lng = query.lng,
            radius_m = query.radius_m,
            cost_usd = %api_cost_usd,
            "google places search finished"
        );
        Ok(SearchOutcome::new(records, api_cost_usd))
    }
}
