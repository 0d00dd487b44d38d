use std::collections::HashMap;

use super::{field, missing_headers, read_header_map, CsvIssue, CsvParseError};
use crate::geo::sanitize_text;
use crate::matcher::normalize_company_name;

const REQUIRED_HEADERS: &[&str] = &["company_name"];
const OPTIONAL_HEADERS: &[&str] = &[
    "known_aliases",
    "hq_country",
    "desc",
    "type",
    "geography",
    "industry",
    "suitability_tier",
];

#[derive(Debug, Clone)]
pub struct CompanyCsvRow {
    pub company_name: String,
    pub company_name_normalized: String,
    pub known_aliases: Option<String>,
    pub hq_country: Option<String>,
    pub description: Option<String>,
    pub company_type: Option<String>,
    pub geography: Option<String>,
    pub industry: Option<String>,
    pub suitability_tier: Option<String>,
}

pub struct ParsedCompanies {
    pub rows: Vec<CompanyCsvRow>,
    pub issues: Vec<CsvIssue>,
}

/// Parses a companies CSV body. Only `company_name` is required; all other
/// recognized columns are optional. Rows are deduped on the normalized
/// company name, with later rows overwriting earlier ones.
pub fn parse_companies_csv(bytes: &[u8]) -> Result<ParsedCompanies, CsvParseError> {
    let (mut reader, map) = read_header_map(bytes)?;

    let missing = missing_headers(&map, REQUIRED_HEADERS);
    if !missing.is_empty() {
        return Err(CsvParseError::MissingHeaders(missing.join(", ")));
    }

    let mut issues = Vec::new();
    let mut by_normalized: HashMap<String, CompanyCsvRow> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for (i, result) in reader.records().enumerate() {
        let row_number = i + 1;
        let record = result?;

        match validate_row(&record, &map) {
            Ok(row) => {
                if !by_normalized.contains_key(&row.company_name_normalized) {
                    order.push(row.company_name_normalized.clone());
                }
                by_normalized.insert(row.company_name_normalized.clone(), row);
            }
            Err(reason) => issues.push(CsvIssue { row_number, reason }),
        }
    }

    let rows = order
        .into_iter()
        .filter_map(|key| by_normalized.remove(&key))
        .collect();

    Ok(ParsedCompanies { rows, issues })
}

fn validate_row(
    record: &csv::StringRecord,
    map: &HashMap<String, usize>,
) -> Result<CompanyCsvRow, String> {
    let company_name = sanitize_text(field(record, map, "company_name").unwrap_or(""), 250)
        .ok_or_else(|| "company_name is required".to_owned())?;

    let company_name_normalized = normalize_company_name(&company_name);
    if company_name_normalized.is_empty() {
        return Err("company_name has no meaningful content after normalization".to_owned());
    }

    let known_aliases = field(record, map, OPTIONAL_HEADERS[0])
        .map(|raw| sanitize_aliases(raw, &company_name_normalized))
        .filter(|s| !s.is_empty());

    let hq_country = sanitize_text(field(record, map, "hq_country").unwrap_or(""), 120);
    let description = sanitize_text(field(record, map, "desc").unwrap_or(""), 2000);
    let company_type = sanitize_text(field(record, map, "type").unwrap_or(""), 60);
    let geography = sanitize_text(field(record, map, "geography").unwrap_or(""), 120);
    let industry = sanitize_text(field(record, map, "industry").unwrap_or(""), 120);
    let suitability_tier = sanitize_text(field(record, map, "suitability_tier").unwrap_or(""), 60);

    Ok(CompanyCsvRow {
        company_name,
        company_name_normalized,
        known_aliases,
        hq_country,
        description,
        company_type,
        geography,
        industry,
        suitability_tier,
    })
}

/// Splits a `|`-delimited alias list, sanitizes each entry, drops entries
/// that duplicate each other or are empty, drops any alias that normalizes
/// to the same value as the company name itself, and rejoins on `|`.
fn sanitize_aliases(raw: &str, company_name_normalized: &str) -> String {
    let mut seen = std::collections::HashSet::new();
    let mut aliases = Vec::new();

    for part in raw.split('|') {
        let Some(cleaned) = sanitize_text(part, 250) else {
            continue;
        };
        if normalize_company_name(&cleaned) == company_name_normalized {
            continue;
        }
        let key = cleaned.to_lowercase();
        if seen.insert(key) {
            aliases.push(cleaned);
        }
    }

    aliases.join("|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_row_with_only_required_header() {
        let csv = "company_name\nAcme Corp\n";
        let parsed = parse_companies_csv(csv.as_bytes()).expect("parses");
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].company_name_normalized, "acme");
    }

    #[test]
    fn dedupes_by_normalized_name_keeping_last() {
        let csv = "company_name,hq_country\nAcme Inc,US\nACME INC.,CA\n";
        let parsed = parse_companies_csv(csv.as_bytes()).expect("parses");
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].hq_country.as_deref(), Some("CA"));
    }

    #[test]
    fn aliases_are_split_sanitized_and_deduped() {
        let csv = "company_name,known_aliases\nAcme Corp,Acme Holdings| Acme Holdings |Acme USA\n";
        let parsed = parse_companies_csv(csv.as_bytes()).expect("parses");
        assert_eq!(
            parsed.rows[0].known_aliases.as_deref(),
            Some("Acme Holdings|Acme USA")
        );
    }

    #[test]
    fn alias_matching_company_name_itself_is_dropped() {
        let csv = "company_name,known_aliases\nAcme Corp,Acme| Acme Inc |Acme USA\n";
        let parsed = parse_companies_csv(csv.as_bytes()).expect("parses");
        // "Acme" and "Acme Inc" both normalize to "acme" (same as the
        // company name), so only "Acme USA" survives.
        assert_eq!(parsed.rows[0].known_aliases.as_deref(), Some("Acme USA"));
    }

    #[test]
    fn missing_company_name_header_is_a_parser_error() {
        let csv = "hq_country\nUS\n";
        assert!(matches!(
            parse_companies_csv(csv.as_bytes()),
            Err(CsvParseError::MissingHeaders(_))
        ));
    }

    #[test]
    fn blank_company_name_is_a_row_issue() {
        let csv = "company_name\n\n";
        let parsed = parse_companies_csv(csv.as_bytes()).expect("parses");
        assert!(parsed.rows.is_empty());
        assert_eq!(parsed.issues.len(), 1);
    }
}
