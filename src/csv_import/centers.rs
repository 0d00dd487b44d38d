use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use super::{field, missing_headers, read_header_map, CsvIssue, CsvParseError};
use crate::geo::sanitize_text;

const REQUIRED_HEADERS: &[&str] = &[
    "center_code",
    "name",
    "lat",
    "lon",
    "country",
    "region",
    "tier",
    "source_url",
];

fn center_code_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"))
}

#[derive(Debug, Clone)]
pub struct CenterCsvRow {
    pub center_code: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub country: Option<String>,
    pub region: Option<String>,
    pub tier: Option<String>,
    pub source_url: Option<String>,
}

pub struct ParsedCenters {
    pub rows: Vec<CenterCsvRow>,
    pub issues: Vec<CsvIssue>,
}

/// Parses a centers CSV body into accepted rows plus per-row issues.
/// Later rows sharing a `center_code` overwrite earlier ones.
pub fn parse_centers_csv(bytes: &[u8]) -> Result<ParsedCenters, CsvParseError> {
    let (mut reader, map) = read_header_map(bytes)?;

    let missing = missing_headers(&map, REQUIRED_HEADERS);
    if !missing.is_empty() {
        return Err(CsvParseError::MissingHeaders(missing.join(", ")));
    }

    let mut issues = Vec::new();
    let mut by_code: HashMap<String, CenterCsvRow> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for (i, result) in reader.records().enumerate() {
        let row_number = i + 1;
        let record = result?;

        match validate_row(&record, &map) {
            Ok(row) => {
                if !by_code.contains_key(&row.center_code) {
                    order.push(row.center_code.clone());
                }
                by_code.insert(row.center_code.clone(), row);
            }
            Err(reason) => issues.push(CsvIssue { row_number, reason }),
        }
    }

    let rows = order
        .into_iter()
        .filter_map(|code| by_code.remove(&code))
        .collect();

    Ok(ParsedCenters { rows, issues })
}

fn validate_row(
    record: &csv::StringRecord,
    map: &HashMap<String, usize>,
) -> Result<CenterCsvRow, String> {
    let center_code = field(record, map, "center_code").unwrap_or("").trim();
    if !center_code_pattern().is_match(center_code) {
        return Err(format!(
            "center_code '{center_code}' must match ^[A-Za-z0-9_-]+$"
        ));
    }

    let name = sanitize_text(field(record, map, "name").unwrap_or(""), 250)
        .ok_or_else(|| "name is required".to_owned())?;

    let lat: f64 = field(record, map, "lat")
        .unwrap_or("")
        .trim()
        .parse()
        .map_err(|_| "lat is not a number".to_owned())?;
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err("lat must be within [-90, 90]".to_owned());
    }

    let lon: f64 = field(record, map, "lon")
        .unwrap_or("")
        .trim()
        .parse()
        .map_err(|_| "lon is not a number".to_owned())?;
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err("lon must be within [-180, 180]".to_owned());
    }

    let country = sanitize_text(field(record, map, "country").unwrap_or(""), 120);
    let region = sanitize_text(field(record, map, "region").unwrap_or(""), 120);
    let tier = sanitize_text(field(record, map, "tier").unwrap_or(""), 60);

    let source_url = sanitize_text(field(record, map, "source_url").unwrap_or(""), 500);
    if let Some(url) = &source_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err("source_url must start with http:// or https://".to_owned());
        }
    }

    Ok(CenterCsvRow {
        center_code: center_code.to_owned(),
        name,
        lat,
        lon,
        country,
        region,
        tier,
        source_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_row() {
        let csv = "center_code,name,lat,lon,country,region,tier,source_url\n\
                    PM,Princess Margaret,43.6582,-79.3907,CA,ON,1,https://example.com\n";
        let parsed = parse_centers_csv(csv.as_bytes()).expect("parses");
        assert_eq!(parsed.rows.len(), 1);
        assert!(parsed.issues.is_empty());
        assert_eq!(parsed.rows[0].center_code, "PM");
    }

    #[test]
    fn later_row_overwrites_earlier_same_code() {
        let csv = "center_code,name,lat,lon,country,region,tier,source_url\n\
                    PM,First,43.0,-79.0,,,,\n\
                    PM,Second,44.0,-80.0,,,,\n";
        let parsed = parse_centers_csv(csv.as_bytes()).expect("parses");
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].name, "Second");
    }

    #[test]
    fn rejects_bad_lat_as_row_issue() {
        let csv = "center_code,name,lat,lon,country,region,tier,source_url\n\
                    PM,Princess Margaret,999,-79.3907,,,,\n";
        let parsed = parse_centers_csv(csv.as_bytes()).expect("parses");
        assert!(parsed.rows.is_empty());
        assert_eq!(parsed.issues.len(), 1);
    }

    #[test]
    fn missing_header_is_a_parser_error() {
        let csv = "name,lat,lon\nX,1,1\n";
        assert!(matches!(
            parse_centers_csv(csv.as_bytes()),
            Err(CsvParseError::MissingHeaders(_))
        ));
    }

    #[test]
    fn unterminated_quote_is_a_parser_error() {
        let csv = "center_code,name,lat,lon,country,region,tier,source_url\n\
                    PM,\"Unterminated,43.0,-79.0,,,,\n";
        assert!(matches!(
            parse_centers_csv(csv.as_bytes()),
            Err(CsvParseError::Malformed(_))
        ));
    }
}
