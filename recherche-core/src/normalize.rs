//! Normalization helpers shared by the dedup engine and the store.
//!
//! Dedup signals compare normalized forms, never raw provider fields. The
//! store persists the normalized website and phone alongside the raw values
//! so matching stays a plain indexed equality lookup.

/// Normalize a website URL to a comparable `host/path` form: strip the
/// scheme, a leading `www.`, and any trailing `/`, then lowercase.
///
/// Returns `None` for empty or fragment-only inputs.
#[must_use]
pub fn normalize_website(raw: &str) -> Option<String> {
    let mut s = raw.trim().to_lowercase();
    for scheme in ["https://", "http://"] {
        if let Some(rest) = s.strip_prefix(scheme) {
            s = rest.to_string();
            break;
        }
    }
    if let Some(rest) = s.strip_prefix("www.") {
        s = rest.to_string();
    }
    let s = s.trim_end_matches('/');
    if s.is_empty() {
        return None;
    }
    Some(s.to_string())
}

/// Normalize a phone number to local-prefix digit form: strip everything
/// but digits, then map an international prefix (`+CC` / `00CC`) onto the
/// local `0` prefix. The detected country defaults to Germany (49).
///
/// Returns `None` when fewer than four digits remain.
#[must_use]
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let had_plus = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 4 {
        return None;
    }

    let country_code = "49";
    let normalized = if had_plus && digits.starts_with(country_code) {
        format!("0{}", &digits[country_code.len()..])
    } else if let Some(rest) = digits.strip_prefix("00") {
        match rest.strip_prefix(country_code) {
            Some(national) => format!("0{national}"),
            // Foreign country: keep the digits as dialed.
            None => format!("00{rest}"),
        }
    } else {
        digits
    };
    Some(normalized)
}

/// Lowercase alphanumeric tokens of a business name, for set comparison.
#[must_use]
pub fn name_tokens(name: &str) -> Vec<String> {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Token-set ratio of two names: `2·|A∩B| / (|A| + |B|)` over the distinct
/// token sets. 1.0 means identical sets, 0.0 means disjoint.
#[must_use]
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    use std::collections::HashSet;
    let set_a: HashSet<_> = name_tokens(a).into_iter().collect();
    let set_b: HashSet<_> = name_tokens(b).into_iter().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let shared = set_a.intersection(&set_b).count();
    #[allow(clippy::cast_precision_loss)]
    {
        (2 * shared) as f64 / (set_a.len() + set_b.len()) as f64
    }
}

/// Great-circle distance between two coordinates, in meters.
#[must_use]
pub fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn website_strips_scheme_www_and_trailing_slash() {
        assert_eq!(
            normalize_website("https://www.Beispiel.de/"),
            Some("beispiel.de".to_string())
        );
        assert_eq!(
            normalize_website("http://beispiel.de/kontakt/"),
            Some("beispiel.de/kontakt".to_string())
        );
        assert_eq!(
            normalize_website("beispiel.de"),
            Some("beispiel.de".to_string())
        );
        assert_eq!(normalize_website("  "), None);
    }

    #[test]
    fn phone_maps_international_prefixes_to_local_form() {
        assert_eq!(
            normalize_phone("+49 231 12345"),
            Some("023112345".to_string())
        );
        assert_eq!(
            normalize_phone("0049 231 12345"),
            Some("023112345".to_string())
        );
        assert_eq!(
            normalize_phone("0231 / 123 45"),
            Some("023112345".to_string())
        );
        assert_eq!(normalize_phone("+43 1 5550"), Some("4315550".to_string()));
        assert_eq!(normalize_phone("12"), None);
    }

    #[test]
    fn token_set_ratio_ignores_order_and_punctuation() {
        assert!(token_set_ratio("Bäckerei Schmidt GmbH", "Schmidt Bäckerei GmbH") > 0.99);
        assert!(token_set_ratio("Bäckerei Schmidt", "Bäckerei Müller") < 0.85);
        assert_eq!(token_set_ratio("", "Schmidt"), 0.0);
    }

    #[test]
    fn haversine_is_roughly_correct_at_city_scale() {
        // Dortmund U-Tower to Dortmund main station: ~550 m.
        let d = haversine_m(51.515, 7.462, 51.5175, 7.4585);
        assert!((400.0..700.0).contains(&d), "distance was {d}");
        assert!(haversine_m(51.5, 7.25, 51.5, 7.25) < f64::EPSILON);
    }
}
