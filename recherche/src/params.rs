//! Search-parameter resolution: turns an order's geo reference (place,
//! district, or postal code) into a center, radius, and search term.

use recherche_core::{Order, RechercheError};
use recherche_store::Store;

/// Fallback center when no geo reference resolves (roughly the middle of
/// the Ruhr area).
const FALLBACK_LAT: f64 = 51.4;
const FALLBACK_LNG: f64 = 7.0;

/// Radius for a single place.
const ORT_RADIUS_M: u32 = 3000;
/// Radius for a postal code.
const PLZ_RADIUS_M: u32 = 5000;
/// Radius for a district without population data.
const KREIS_DEFAULT_RADIUS_M: u32 = 15_000;
/// Population-derived district radius is clamped into this range.
const KREIS_MIN_RADIUS_M: u32 = 5000;
const KREIS_MAX_RADIUS_M: u32 = 50_000;

/// Default search term when neither free text nor a category resolves.
const DEFAULT_TERM: &str = "Restaurant";

/// Resolved search parameters for one order.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    /// Center latitude.
    pub lat: f64,
    /// Center longitude.
    pub lng: f64,
    /// Search radius in meters.
    pub radius_m: u32,
    /// Search term handed to the providers.
    pub term: String,
}

/// Resolve an order's search parameters. Geo references are tried in
/// priority order (place, district, postal code); a resolvable Google
/// category overrides the free-text term.
///
/// # Errors
/// `Database` on persistence failure.
pub fn resolve_search_params(
    store: &Store,
    order: &Order,
) -> Result<SearchParams, RechercheError> {
    let mut center: Option<(f64, f64)> = None;
    let mut radius_m = PLZ_RADIUS_M;

    if let Some(ort_id) = &order.geo_ort_id {
        if let Some(ort) = store.ort_by_id(ort_id)? {
            center = Some((ort.lat, ort.lng));
            radius_m = ORT_RADIUS_M;
        }
    } else if let Some(kreis_id) = &order.geo_kreis_id {
        if let Some(ort) = store.hauptort_for_kreis(kreis_id)? {
            center = Some((ort.lat, ort.lng));
        }
        radius_m = match store.kreis_by_id(kreis_id)?.and_then(|k| k.einwohner) {
            // Rough proxy: one meter of radius per ten inhabitants.
            Some(einwohner) => u32::try_from(einwohner / 10)
                .unwrap_or(KREIS_MAX_RADIUS_M)
                .clamp(KREIS_MIN_RADIUS_M, KREIS_MAX_RADIUS_M),
            None => KREIS_DEFAULT_RADIUS_M,
        };
    } else if let Some(plz) = &order.plz {
        if let Some(ort) = store.ort_by_plz(plz)? {
            center = Some((ort.lat, ort.lng));
            radius_m = PLZ_RADIUS_M;
        }
    }

    let mut term = order
        .freitext
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TERM.to_string());
    if let Some(gcid) = &order.category_gcid {
        if let Some(category) = store.category_by_gcid(gcid)? {
            if let Some(name) = category.name_de.or(category.name).filter(|n| !n.is_empty()) {
                term = name;
            }
        }
    }

    let (lat, lng) = center.unwrap_or((FALLBACK_LAT, FALLBACK_LNG));
    Ok(SearchParams {
        lat,
        lng,
        radius_m,
        term,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use recherche_core::QualityTier;
    use recherche_store::{GeoKreis, GeoOrt, GoogleCategory, NewOrder, NewPartner};

    fn seeded_store() -> (Store, String) {
        let store = Store::open_in_memory().unwrap();
        let partner = store.create_partner(&NewPartner::new("P")).unwrap();
        store
            .insert_kreis(&GeoKreis {
                id: "k-do".to_string(),
                name: "Dortmund".to_string(),
                einwohner: Some(600_000),
            })
            .unwrap();
        store
            .insert_ort(&GeoOrt {
                id: "o-do".to_string(),
                name: "Dortmund".to_string(),
                plz: Some("44135".to_string()),
                kreis_id: Some("k-do".to_string()),
                lat: 51.5136,
                lng: 7.4653,
                ist_hauptort: true,
            })
            .unwrap();
        store
            .insert_category(&GoogleCategory {
                gcid: "gcid:bakery".to_string(),
                name: Some("Bakery".to_string()),
                name_de: Some("Bäckerei".to_string()),
            })
            .unwrap();
        (store, partner.id)
    }

    #[test]
    fn ort_takes_priority_with_small_radius() {
        let (store, partner_id) = seeded_store();
        let mut new = NewOrder::new(&partner_id, QualityTier::Standard);
        new.geo_ort_id = Some("o-do".to_string());
        new.plz = Some("99999".to_string());
        let order = store.create_order(&new).unwrap();

        let params = resolve_search_params(&store, &order).unwrap();
        assert_eq!(params.radius_m, 3000);
        assert!((params.lat - 51.5136).abs() < 1e-9);
        assert_eq!(params.term, "Restaurant");
    }

    #[test]
    fn kreis_radius_scales_with_population() {
        let (store, partner_id) = seeded_store();
        let mut new = NewOrder::new(&partner_id, QualityTier::Standard);
        new.geo_kreis_id = Some("k-do".to_string());
        let order = store.create_order(&new).unwrap();

        let params = resolve_search_params(&store, &order).unwrap();
        // 600_000 / 10 clamped to 50 km.
        assert_eq!(params.radius_m, 50_000);
        assert!((params.lng - 7.4653).abs() < 1e-9);
    }

    #[test]
    fn category_overrides_freitext_and_unresolved_geo_falls_back() {
        let (store, partner_id) = seeded_store();
        let mut new = NewOrder::new(&partner_id, QualityTier::Standard);
        new.freitext = Some("Konditorei".to_string());
        new.category_gcid = Some("gcid:bakery".to_string());
        let order = store.create_order(&new).unwrap();

        let params = resolve_search_params(&store, &order).unwrap();
        assert_eq!(params.term, "Bäckerei");
        assert!((params.lat - 51.4).abs() < 1e-9);
        assert_eq!(params.radius_m, 5000);
    }

    #[test]
    fn unknown_category_keeps_freitext() {
        let (store, partner_id) = seeded_store();
        let mut new = NewOrder::new(&partner_id, QualityTier::Standard);
        new.freitext = Some("Konditorei".to_string());
        new.category_gcid = Some("gcid:unknown".to_string());
        let order = store.create_order(&new).unwrap();

        let params = resolve_search_params(&store, &order).unwrap();
        assert_eq!(params.term, "Konditorei");
    }
}
