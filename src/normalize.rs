//! Turns raw Overpass elements into canonical [`CandidateOffice`] records:
//! drops unnamed elements, sanitizes tag text, marks low-confidence
//! offices, and dedupes near-duplicates within a single response.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::geo::{normalize_wikidata, round_coord, sanitize_text};
use crate::models::{CandidateOffice, OsmType};
use crate::overpass::OverpassElement;

/// Normalizes and dedupes a batch of raw Overpass elements.
pub fn normalize_elements(elements: Vec<OverpassElement>) -> Vec<CandidateOffice> {
    let mut by_key: HashMap<(String, i64, i64), CandidateOffice> = HashMap::new();

    for element in elements {
        let Some(candidate) = normalize_one(element) else {
            continue;
        };

        let key = dedup_key(&candidate);
        match by_key.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
            Entry::Occupied(mut slot) => {
                if candidate.evidence_score() > slot.get().evidence_score() {
                    slot.insert(candidate);
                }
            }
        }
    }

    by_key.into_values().collect()
}

fn normalize_one(element: OverpassElement) -> Option<CandidateOffice> {
    let osm_type = OsmType::parse(&element.element_type)?;

    let (lat, lon) = match (element.lat, element.lon, &element.center) {
        (Some(lat), Some(lon), _) => (lat, lon),
        (_, _, Some(center)) => (center.lat, center.lon),
        _ => return None,
    };

    let name = element.tags.get("name").and_then(|v| sanitize_text(v, 250))?;
    let brand = element.tags.get("brand").and_then(|v| sanitize_text(v, 250));
    let operator = element.tags.get("operator").and_then(|v| sanitize_text(v, 250));
    let website = element.tags.get("website").and_then(|v| sanitize_text(v, 500));
    let wikidata = element.tags.get("wikidata").and_then(|v| sanitize_text(v, 128));
    let wikidata_entity_id = wikidata.as_deref().and_then(normalize_wikidata);

    let low_confidence = website.is_none() && wikidata.is_none() && brand.is_none() && operator.is_none();

    let tags_json = if element.tags.is_empty() {
        None
    } else {
        serde_json::to_string(&element.tags).ok()
    };

    Some(CandidateOffice {
        osm_type,
        osm_id: element.id,
        name,
        brand,
        operator,
        website,
        wikidata,
        wikidata_entity_id,
        lat,
        lon,
        low_confidence,
        tags_json,
    })
}

/// Dedup key: lowercased/collapsed name + coordinates rounded to 6 places
/// (represented as scaled integers so the key is hashable).
fn dedup_key(office: &CandidateOffice) -> (String, i64, i64) {
    let collapsed = office
        .name
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let lat_key = (round_coord(office.lat) * 1_000_000.0).round() as i64;
    let lon_key = (round_coord(office.lon) * 1_000_000.0).round() as i64;
    (collapsed, lat_key, lon_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overpass::OverpassCenter;
    use std::collections::HashMap as StdHashMap;

    fn element(id: i64, name: Option<&str>, lat: f64, lon: f64) -> OverpassElement {
        let mut tags = StdHashMap::new();
        if let Some(n) = name {
            tags.insert("name".to_owned(), n.to_owned());
        }
        OverpassElement {
            element_type: "node".to_owned(),
            id,
            lat: Some(lat),
            lon: Some(lon),
            center: None,
            tags,
        }
    }

    #[test]
    fn drops_elements_without_name() {
        let elements = vec![element(1, None, 43.0, -79.0)];
        assert!(normalize_elements(elements).is_empty());
    }

    #[test]
    fn uses_center_when_lat_lon_absent() {
        let mut el = element(1, Some("Acme"), 0.0, 0.0);
        el.lat = None;
        el.lon = None;
        el.center = Some(OverpassCenter { lat: 43.5, lon: -79.5 });
        let offices = normalize_elements(vec![el]);
        assert_eq!(offices.len(), 1);
        assert_eq!(offices[0].lat, 43.5);
    }

    #[test]
    fn marks_low_confidence_with_no_evidence_tags() {
        let el = element(1, Some("Acme"), 43.0, -79.0);
        let offices = normalize_elements(vec![el]);
        assert!(offices[0].low_confidence);
    }

    #[test]
    fn dedupes_near_duplicates_keeping_richer_evidence() {
        let mut rich = element(1, Some("Acme Corp"), 43.123456, -79.654321);
        rich.tags.insert("website".to_owned(), "https://acme.example".to_owned());
        let poor = element(2, Some("Acme Corp"), 43.1234561, -79.6543211);

        let offices = normalize_elements(vec![poor, rich]);
        assert_eq!(offices.len(), 1);
        assert_eq!(offices[0].osm_id, 1);
        assert!(offices[0].website.is_some());
    }
}
