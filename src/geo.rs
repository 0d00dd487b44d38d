//! Geographic and text-sanitization primitives shared by the normalizer,
//! matcher, and persistence layer.

use std::sync::OnceLock;

use regex::Regex;

/// Mean Earth radius in meters, per the WGS-84 sphere approximation.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two WGS-84 points, in meters.
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

fn wikidata_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bQ[1-9]\d*\b").expect("valid regex"))
}

/// Normalizes a raw `wikidata` tag value to canonical `Q<digits>` form.
///
/// Case-insensitive match anywhere in the string; returns `None` if no
/// Wikidata-style identifier is present.
pub fn normalize_wikidata(raw: &str) -> Option<String> {
    wikidata_regex()
        .find(raw)
        .map(|m| m.as_str().to_uppercase())
}

/// Trims whitespace and truncates to `max_len` bytes at a char boundary.
/// Returns `None` for an empty (post-trim) string.
pub fn sanitize_text(raw: &str, max_len: usize) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.len() <= max_len {
        return Some(trimmed.to_owned());
    }

    let mut end = max_len;
    while end > 0 && !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    Some(trimmed[..end].to_owned())
}

/// Rounds a coordinate to 6 decimal places for dedup-key purposes
/// (~0.11 m of precision at the equator).
pub fn round_coord(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_known_distance() {
        // Toronto (43.6532, -79.3832) to Princess Margaret Cancer Centre area.
        let d = haversine_meters(43.6582, -79.3907, 43.66, -79.39);
        assert!((200.0..260.0).contains(&d), "got {d}");
    }

    #[test]
    fn haversine_zero_for_same_point() {
        assert_eq!(haversine_meters(43.0, -79.0, 43.0, -79.0), 0.0);
    }

    #[test]
    fn wikidata_normalizes_case_and_strips_noise() {
        assert_eq!(normalize_wikidata("q42"), Some("Q42".to_owned()));
        assert_eq!(
            normalize_wikidata("see also q123456 (company)"),
            Some("Q123456".to_owned())
        );
        assert_eq!(normalize_wikidata("not a wikidata id"), None);
        assert_eq!(normalize_wikidata("Q0"), None);
    }

    #[test]
    fn sanitize_text_trims_and_truncates() {
        assert_eq!(sanitize_text("  hello  ", 10), Some("hello".to_owned()));
        assert_eq!(sanitize_text("   ", 10), None);
        assert_eq!(sanitize_text("abcdef", 3), Some("abc".to_owned()));
    }

    #[test]
    fn round_coord_six_decimals() {
        assert_eq!(round_coord(43.658_212_34), 43.658_212);
    }
}
