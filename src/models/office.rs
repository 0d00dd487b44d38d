use chrono::{DateTime, Utc};
use serde::Serialize;

/// OSM element kind. Stored as its lowercase string form in SQLite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsmType {
    Node,
    Way,
    Relation,
}

impl OsmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "node" => Some(Self::Node),
            "way" => Some(Self::Way),
            "relation" => Some(Self::Relation),
            _ => None,
        }
    }
}

impl std::fmt::Display for OsmType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite identity of an office: `(osm_type, osm_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OfficeKey {
    pub osm_type: OsmType,
    pub osm_id: i64,
}

/// A canonical office record, after normalization, matching, and
/// (optionally) Wikidata enrichment. Mirrors the `offices` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Office {
    pub osm_type: String,
    pub osm_id: i64,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub operator: Option<String>,
    pub website: Option<String>,
    pub wikidata: Option<String>,
    pub wikidata_entity_id: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub low_confidence: bool,
    pub tags_json: Option<String>,
    pub employee_count: Option<i64>,
    pub employee_count_as_of: Option<String>,
    pub market_cap: Option<f64>,
    pub market_cap_currency_qid: Option<String>,
    pub market_cap_as_of: Option<String>,
    pub wikidata_enriched_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// An office joined with its link to a particular center, as returned by
/// `GET /api/centers/{id}/offices`.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct OfficeWithDistance {
    pub osm_type: String,
    pub osm_id: i64,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub operator: Option<String>,
    pub website: Option<String>,
    pub wikidata: Option<String>,
    pub wikidata_entity_id: Option<String>,
    pub employee_count: Option<i64>,
    pub employee_count_as_of: Option<String>,
    pub market_cap: Option<f64>,
    pub market_cap_currency_qid: Option<String>,
    pub market_cap_as_of: Option<String>,
    pub wikidata_enriched_at: Option<DateTime<Utc>>,
    pub lat: f64,
    pub lon: f64,
    pub low_confidence: bool,
    pub distance_m: f64,
}

/// A candidate office surfaced by the normalizer, prior to company
/// matching and persistence. Not yet assigned a distance.
#[derive(Debug, Clone)]
pub struct CandidateOffice {
    pub osm_type: OsmType,
    pub osm_id: i64,
    pub name: String,
    pub brand: Option<String>,
    pub operator: Option<String>,
    pub website: Option<String>,
    pub wikidata: Option<String>,
    pub wikidata_entity_id: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub low_confidence: bool,
    pub tags_json: Option<String>,
}

impl CandidateOffice {
    pub fn key(&self) -> OfficeKey {
        OfficeKey {
            osm_type: self.osm_type,
            osm_id: self.osm_id,
        }
    }

    /// Evidence score used to break dedup ties: richer tagging wins.
    pub fn evidence_score(&self) -> u32 {
        let mut score = 0;
        if self.website.is_some() {
            score += 4;
        }
        if self.wikidata.is_some() {
            score += 3;
        }
        if self.brand.is_some() {
            score += 2;
        }
        if self.operator.is_some() {
            score += 1;
        }
        score
    }
}
