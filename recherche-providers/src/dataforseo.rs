//! DataForSEO Business Listings driver.
//!
//! Bulk listings over HTTP Basic auth at roughly 0.002 USD per result.
//! Coarser data than Google Places, which is why it backs the standard
//! tier and pads out the komplett tier.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use recherche_core::{RawRecord, RechercheError, RechercheProvider, SearchOutcome, SearchQuery};

const DATAFORSEO_API_BASE: &str = "https://api.dataforseo.com";
const SEARCH_LIVE_PATH: &str = "/v3/business_data/business_listings/search/live";

/// The API returns at most 100 listings per request.
const PAGE_SIZE: usize = 100;
/// Task-level success code; anything else is an upstream failure.
const TASK_STATUS_OK: u32 = 20_000;

/// Driver for the DataForSEO Business Listings search endpoint.
pub struct DataForSeoProvider {
    login: String,
    password: String,
    base_url: String,
    client: Client,
}

impl DataForSeoProvider {
    /// Build a driver against the production endpoint.
    ///
    /// # Errors
    /// `Provider` when the HTTP client cannot be constructed.
    pub fn new(
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, RechercheError> {
        Self::with_base_url(login, password, DATAFORSEO_API_BASE)
    }

    /// Build a driver against a custom endpoint (tests).
    ///
    /// # Errors
    /// `Provider` when the HTTP client cannot be constructed.
    pub fn with_base_url(
        login: impl Into<String>,
        password: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, RechercheError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RechercheError::provider("dataforseo", e.to_string()))?;
        Ok(Self {
            login: login.into(),
            password: password.into(),
            base_url: base_url.into(),
            client,
        })
    }

    fn auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.login, self.password);
        format!("Basic {}", STANDARD.encode(credentials))
    }

    fn request_body(&self, query: &SearchQuery, limit: usize, offset: usize) -> serde_json::Value {
        let mut task = json!({
            "categories": [query.term],
            "location_coordinate": format!("{},{},{}", query.lat, query.lng, query.radius_m),
            "language_code": "de",
            "limit": limit,
            "offset": offset,
        });
        if let Some(category) = &query.category {
            task["filters"] = json!([["category", "like", format!("%{category}%")]]);
        }
        json!([task])
    }
}

#[derive(Debug, Deserialize)]
struct LiveResponse {
    #[serde(default)]
    tasks: Vec<Task>,
}

#[derive(Debug, Deserialize)]
struct Task {
    status_code: u32,
    status_message: Option<String>,
    #[serde(default)]
    result: Vec<TaskResult>,
}

#[derive(Debug, Deserialize)]
struct TaskResult {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    items: Vec<Listing>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    title: Option<String>,
    cid: Option<serde_json::Value>,
    address: Option<String>,
    address_info: Option<AddressInfo>,
    phone: Option<String>,
    url: Option<String>,
    domain: Option<String>,
    email: Option<String>,
    category: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    rating: Option<serde_json::Value>,
    reviews_count: Option<u64>,
    #[serde(default)]
    category_ids: Vec<String>,
    is_claimed: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct AddressInfo {
    zip: Option<String>,
    city: Option<String>,
}

/// The API serves `cid` as a string or a bare number depending on the
/// listing's age; stringify either form.
fn id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn normalize(listing: Listing) -> Option<RawRecord> {
    let name = listing
        .title
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())?
        .to_string();

    let external_id = listing.cid.as_ref().and_then(id_string);
    let payload = json!({
        "cid": external_id.clone(),
        "rating": listing.rating,
        "reviews_count": listing.reviews_count,
        "category_ids": listing.category_ids,
        "is_claimed": listing.is_claimed,
    });

    Some(RawRecord {
        source: "dataforseo".to_string(),
        external_id,
        name,
        address: listing.address,
        postal_code: listing.address_info.as_ref().and_then(|a| a.zip.clone()),
        city: listing.address_info.as_ref().and_then(|a| a.city.clone()),
        phone: listing.phone,
        email: listing.email,
        website: listing.url.or(listing.domain),
        category: listing.category,
        lat: listing.latitude,
        lng: listing.longitude,
        payload,
    })
}

#[async_trait]
impl RechercheProvider for DataForSeoProvider {
    fn name(&self) -> &'static str {
        "dataforseo"
    }

    fn configured(&self) -> bool {
        !self.login.is_empty() && !self.password.is_empty()
    }

    fn cost_per_request(&self) -> Decimal {
        // ~$0.002 per returned listing.
        Decimal::new(2, 3)
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome, RechercheError> {
        if !self.configured() {
            tracing::warn!("dataforseo credentials not configured, skipping");
            return Ok(SearchOutcome::default());
        }

        let url = format!("{}{}", self.base_url, SEARCH_LIVE_PATH);
        let batch_size = PAGE_SIZE.min(query.max_results);
        let mut records: Vec<RawRecord> = Vec::new();
        let mut offset = 0usize;

        while records.len() < query.max_results {
            let body = self.request_body(query, batch_size, offset);
            let response = match self
                .client
                .post(&url)
                .header("Authorization", self.auth_header())
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(error = %e, "dataforseo request error");
                    break;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                let text: String = text.chars().take(500).collect();
                tracing::error!(%status, body = %text, "dataforseo api error");
                break;
            }

            let parsed: LiveResponse = match response.json().await {
                Ok(p) => p,
                Err(e) => {
                    tracing::error!(error = %e, "dataforseo response parse error");
                    break;
                }
            };

            let Some(task) = parsed.tasks.into_iter().next() else {
                break;
            };
            if task.status_code != TASK_STATUS_OK {
                tracing::error!(
                    status_code = task.status_code,
                    message = task.status_message.as_deref().unwrap_or(""),
                    "dataforseo task error"
                );
                break;
            }
            let Some(page) = task.result.into_iter().next() else {
                break;
            };
            if page.items.is_empty() {
                break;
            }

            let item_count = page.items.len();
            records.extend(page.items.into_iter().filter_map(normalize));

            offset += batch_size;
            if item_count < batch_size || offset as u64 >= page.total_count {
                break;
            }
        }

        let api_cost_usd = Decimal::from(records.len() as u64) * self.cost_per_request();
        tracing::info!(
            results = records.len(),
            term = %query.term,
            lat = query.lat,
            lng = query.lng,
            radius_m = query.radius_m,
            cost_usd = %api_cost_usd,
            "dataforseo search finished"
        );
        Ok(SearchOutcome::new(records, api_cost_usd))
    }
}
