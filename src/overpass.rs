//! Overpass client: builds a radius query for a center and POSTs it to a
//! configurable, comma-separated list of upstream endpoints with
//! retry+failover.

use serde::Deserialize;

use crate::http_retry::{self, RetryOutcome};

/// Raw element as returned by Overpass's `out center tags;` clause.
#[derive(Debug, Clone, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type")]
    pub element_type: String,
    pub id: i64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub center: Option<OverpassCenter>,
    #[serde(default)]
    pub tags: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverpassCenter {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

/// Builds the Overpass-QL query text for a radius search around
/// `(lat, lon)` with radius `radius_m` meters.
pub fn build_query(lat: f64, lon: f64, radius_m: i64) -> String {
    format!(
        "[out:json][timeout:25];\n\
         ( nwr(around:{radius_m}, {lat}, {lon})[\"office\"];\n\
         \x20 nwr(around:{radius_m}, {lat}, {lon})[\"building\"=\"office\"]; );\n\
         out center tags;"
    )
}

/// Executes the radius query against the configured upstream list,
/// returning the raw elements on success.
pub async fn fetch_elements(
    client: &reqwest::Client,
    urls: &[String],
    lat: f64,
    lon: f64,
    radius_m: i64,
) -> anyhow::Result<Vec<OverpassElement>> {
    let query = build_query(lat, lon, radius_m);
    let mut last_error: Option<anyhow::Error> = None;

    for url in urls {
        match http_retry::post_text_with_retry(client, url, &query, 3).await {
            RetryOutcome::Success(body) => {
                let parsed: OverpassResponse = serde_json::from_str(&body)
                    .map_err(|e| anyhow::anyhow!("invalid Overpass JSON from {url}: {e}"))?;
                return Ok(parsed.elements);
            }
            RetryOutcome::Failed(err) => {
                tracing::warn!(url = %url, error = %err, "Overpass endpoint failed, trying next");
                last_error = Some(err);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("no Overpass URLs configured")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_embeds_radius_and_coordinates() {
        let q = build_query(43.6582, -79.3907, 25000);
        assert!(q.contains("around:25000, 43.6582, -79.3907"));
        assert!(q.contains("[\"office\"]"));
        assert!(q.contains("[\"building\"=\"office\"]"));
        assert!(q.contains("out center tags;"));
    }
}
