//! Wikidata enrichment client: batches `Q`-id lookups against the
//! `wbgetentities` claims API and extracts employee-count (`P1128`) and
//! market-cap (`P2226`) facts, each with its most recent "as of" (`P585`)
//! qualifier.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::http_retry::{self, RetryOutcome};

const EMPLOYEE_COUNT_PROPERTY: &str = "P1128";
const MARKET_CAP_PROPERTY: &str = "P2226";
const AS_OF_QUALIFIER: &str = "P585";
const DEFAULT_CHUNK_SIZE: usize = 30;

/// Enriched facts for a single entity. Fields are `None` when the entity
/// had no valid (non-deprecated) claim for that property.
#[derive(Debug, Clone, Default)]
pub struct EntityFacts {
    pub employee_count: Option<i64>,
    pub employee_count_as_of: Option<String>,
    pub market_cap: Option<f64>,
    pub market_cap_currency_qid: Option<String>,
    pub market_cap_as_of: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WbGetEntitiesResponse {
    #[serde(default)]
    entities: HashMap<String, WbEntity>,
}

#[derive(Debug, Deserialize)]
struct WbEntity {
    #[serde(default)]
    claims: HashMap<String, Vec<WbClaim>>,
}

#[derive(Debug, Deserialize)]
struct WbClaim {
    #[serde(default)]
    rank: String,
    mainsnak: WbSnak,
    #[serde(default)]
    qualifiers: HashMap<String, Vec<WbSnak>>,
}

#[derive(Debug, Deserialize)]
struct WbSnak {
    #[serde(default)]
    datavalue: Option<Value>,
}

/// Fetches facts for every `q_ids` entry, chunking requests at
/// `DEFAULT_CHUNK_SIZE` and retrying each chunk up to 3 times on 429/5xx.
/// A chunk that fails after retries is logged and its entities are simply
/// absent from the result map; it does not fail the whole call.
pub async fn fetch_entity_facts(
    client: &reqwest::Client,
    api_url: &str,
    q_ids: &[String],
    throttle: std::time::Duration,
) -> HashMap<String, EntityFacts> {
    let mut out = HashMap::new();

    for (i, chunk) in q_ids.chunks(DEFAULT_CHUNK_SIZE).enumerate() {
        if i > 0 {
            tokio::time::sleep(throttle).await;
        }

        let url = build_url(api_url, chunk);
        match http_retry::get_with_retry(client, &url, 3).await {
            RetryOutcome::Success(body) => match parse_response(&body) {
                Ok(facts) => out.extend(facts),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to parse Wikidata response chunk");
                }
            },
            RetryOutcome::Failed(err) => {
                tracing::warn!(error = %err, "Wikidata entity fetch failed for chunk");
            }
        }
    }

    out
}

fn build_url(api_url: &str, ids: &[String]) -> String {
    format!(
        "{api_url}?action=wbgetentities&ids={}&props=claims&format=json",
        ids.join("%7C")
    )
}

fn parse_response(body: &str) -> anyhow::Result<HashMap<String, EntityFacts>> {
    let parsed: WbGetEntitiesResponse = serde_json::from_str(body)?;

    let mut out = HashMap::new();
    for (entity_id, entity) in parsed.entities {
        let mut facts = EntityFacts::default();

        if let Some((count, as_of, _unit)) = best_quantity_claim(&entity, EMPLOYEE_COUNT_PROPERTY) {
            facts.employee_count = Some(count.round() as i64);
            facts.employee_count_as_of = as_of;
        }

        if let Some((amount, as_of, unit)) = best_quantity_claim(&entity, MARKET_CAP_PROPERTY) {
            facts.market_cap = Some(amount);
            facts.market_cap_as_of = as_of;
            facts.market_cap_currency_qid = unit;
        }

        out.insert(entity_id, facts);
    }

    Ok(out)
}

fn claim_rank_order(rank: &str) -> u8 {
    match rank {
        "preferred" => 2,
        "normal" => 1,
        _ => 0,
    }
}

/// Selects the best non-deprecated claim for `property` by rank, tie-broken
/// by most recent `as-of` qualifier. Returns the quantity amount, its
/// canonicalized as-of timestamp, and its unit Q-id — all from that same
/// selected claim, if present.
fn best_quantity_claim(
    entity: &WbEntity,
    property: &str,
) -> Option<(f64, Option<String>, Option<String>)> {
    let claims = entity.claims.get(property)?;

    let mut best: Option<(u8, Option<String>, f64, Option<String>)> = None;
    for claim in claims {
        if claim.rank == "deprecated" {
            continue;
        }
        let Some(amount) = quantity_amount(&claim.mainsnak) else {
            continue;
        };
        let as_of = latest_as_of(&claim.qualifiers);
        let unit = quantity_unit_qid(&claim.mainsnak);
        let rank_order = claim_rank_order(&claim.rank);

        let is_better = match &best {
            None => true,
            Some((best_rank, best_as_of, _, _)) => {
                rank_order > *best_rank || (rank_order == *best_rank && as_of > *best_as_of)
            }
        };
        if is_better {
            best = Some((rank_order, as_of, amount, unit));
        }
    }

    best.map(|(_, as_of, amount, unit)| (amount, as_of, unit))
}

fn quantity_amount(snak: &WbSnak) -> Option<f64> {
    let value = snak.datavalue.as_ref()?.get("value")?;
    let amount_str = value.get("amount")?.as_str()?;
    amount_str.trim_start_matches('+').parse::<f64>().ok()
}

fn quantity_unit_qid(snak: &WbSnak) -> Option<String> {
    let value = snak.datavalue.as_ref()?.get("value")?;
    let unit = value.get("unit")?.as_str()?;
    unit.rsplit('/').next().map(|s| s.to_owned())
}

/// Returns the most recent canonicalized `P585` qualifier timestamp
/// among a claim's qualifiers, if any.
fn latest_as_of(qualifiers: &HashMap<String, Vec<WbSnak>>) -> Option<String> {
    let snaks = qualifiers.get(AS_OF_QUALIFIER)?;
    snaks
        .iter()
        .filter_map(|snak| time_value(snak))
        .filter_map(|raw| canonicalize_time(&raw))
        .max()
}

fn time_value(snak: &WbSnak) -> Option<String> {
    let value = snak.datavalue.as_ref()?.get("value")?;
    value.get("time")?.as_str().map(|s| s.to_owned())
}

/// Canonicalizes a Wikidata `+YYYY-MM-DDT00:00:00Z` timestamp to ISO 8601,
/// rewriting zeroed month/day components to `01`.
fn canonicalize_time(raw: &str) -> Option<String> {
    let trimmed = raw.trim_start_matches('+');
    let (date_part, time_part) = trimmed.split_once('T')?;
    let mut segments: Vec<&str> = date_part.splitn(3, '-').collect();
    if segments.len() != 3 {
        return None;
    }
    let year = segments.remove(0);
    let month = if segments[0] == "00" { "01" } else { segments[0] };
    let day = if segments[1] == "00" { "01" } else { segments[1] };

    Some(format!("{year}-{month}-{day}T{time_part}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_zeroed_month_and_day() {
        assert_eq!(
            canonicalize_time("+2020-00-00T00:00:00Z"),
            Some("2020-01-01T00:00:00Z".to_owned())
        );
        assert_eq!(
            canonicalize_time("+2020-05-17T00:00:00Z"),
            Some("2020-05-17T00:00:00Z".to_owned())
        );
    }

    #[test]
    fn parses_employee_count_and_market_cap_with_rank_preference() {
        let body = serde_json::json!({
            "entities": {
                "Q42": {
                    "claims": {
                        "P1128": [
                            {
                                "rank": "normal",
                                "mainsnak": {"datavalue": {"value": {"amount": "+100"}}},
                                "qualifiers": {}
                            },
                            {
                                "rank": "preferred",
                                "mainsnak": {"datavalue": {"value": {"amount": "+250"}}},
                                "qualifiers": {}
                            }
                        ],
                        "P2226": [
                            {
                                "rank": "normal",
                                "mainsnak": {"datavalue": {"value": {
                                    "amount": "+1500000",
                                    "unit": "http://www.wikidata.org/entity/Q4917"
                                }}},
                                "qualifiers": {
                                    "P585": [
                                        {"datavalue": {"value": {"time": "+2021-00-00T00:00:00Z"}}}
                                    ]
                                }
                            }
                        ]
                    }
                }
            }
        })
        .to_string();

        let facts = parse_response(&body).expect("parses");
        let q42 = facts.get("Q42").expect("present");
        assert_eq!(q42.employee_count, Some(250));
        assert_eq!(q42.market_cap, Some(1_500_000.0));
        assert_eq!(q42.market_cap_currency_qid.as_deref(), Some("Q4917"));
        assert_eq!(q42.market_cap_as_of.as_deref(), Some("2021-01-01T00:00:00Z"));
    }

    #[test]
    fn deprecated_claims_are_skipped() {
        let body = serde_json::json!({
            "entities": {
                "Q7": {
                    "claims": {
                        "P1128": [
                            {
                                "rank": "deprecated",
                                "mainsnak": {"datavalue": {"value": {"amount": "+999"}}},
                                "qualifiers": {}
                            }
                        ]
                    }
                }
            }
        })
        .to_string();

        let facts = parse_response(&body).expect("parses");
        let q7 = facts.get("Q7").expect("present");
        assert_eq!(q7.employee_count, None);
    }

    #[test]
    fn market_cap_currency_comes_from_the_same_claim_as_the_amount() {
        let body = serde_json::json!({
            "entities": {
                "Q99": {
                    "claims": {
                        "P2226": [
                            {
                                "rank": "normal",
                                "mainsnak": {"datavalue": {"value": {
                                    "amount": "+2000000",
                                    "unit": "http://www.wikidata.org/entity/Q4916"
                                }}},
                                "qualifiers": {
                                    "P585": [
                                        {"datavalue": {"value": {"time": "+2019-01-01T00:00:00Z"}}}
                                    ]
                                }
                            },
                            {
                                "rank": "preferred",
                                "mainsnak": {"datavalue": {"value": {
                                    "amount": "+3000000",
                                    "unit": "http://www.wikidata.org/entity/Q4917"
                                }}},
                                "qualifiers": {
                                    "P585": [
                                        {"datavalue": {"value": {"time": "+2022-01-01T00:00:00Z"}}}
                                    ]
                                }
                            }
                        ]
                    }
                }
            }
        })
        .to_string();

        let facts = parse_response(&body).expect("parses");
        let q99 = facts.get("Q99").expect("present");
        // The preferred claim (amount 3000000, unit Q4917) wins over the
        // normal-rank claim, and the currency must match that same claim,
        // not the first one parsed.
        assert_eq!(q99.market_cap, Some(3_000_000.0));
        assert_eq!(q99.market_cap_currency_qid.as_deref(), Some("Q4917"));
    }

    #[test]
    fn entity_with_no_claims_still_emits_a_row() {
        let body = serde_json::json!({"entities": {"Q1": {"claims": {}}}}).to_string();
        let facts = parse_response(&body).expect("parses");
        assert!(facts.contains_key("Q1"));
    }
}
