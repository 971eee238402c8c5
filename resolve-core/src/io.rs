//! Batch input/output: CSV and JSON framing for `CompanyInput` and
//! `ResolvedRecord`, per the external interface contract.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::CompanyInput;
use crate::record::ResolvedRecord;

/// Read company rows from a CSV with columns `name, city, phone, address,
/// context`, assigning row index as `id` when no `id` column is present.
pub fn read_companies_csv(data: &str) -> Result<Vec<CompanyInput>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| Error::parse_error(format!("reading CSV headers: {e}")))?
        .clone();
    let has_id_column = headers.iter().any(|h| h == "id");

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| Error::parse_error(format!("reading CSV row {idx}: {e}")))?;
        let get = |col: &str| -> Option<String> {
            headers
                .iter()
                .position(|h| h == col)
                .and_then(|i| record.get(i))
                .map(|s| s.to_string())
                .filter(|s| !s.is_empty())
        };

        let name = get("name").ok_or_else(|| Error::input_invalid(format!("row {idx} missing name")))?;
        let id = if has_id_column {
            get("id").unwrap_or_else(|| idx.to_string())
        } else {
            idx.to_string()
        };

        let mut input = CompanyInput::new(id, name);
        input.city = get("city");
        input.state = get("state");
        input.phone = get("phone");
        input.address = get("address");
        input.category = get("category");
        input.context = get("context");
        rows.push(input);
    }
    Ok(rows)
}

pub fn read_companies_json(data: &str) -> Result<Vec<CompanyInput>> {
    serde_json::from_str(data).map_err(Error::Serialization)
}

/// One flattened output row: the record's top valid contact (if any) plus
/// a flag noting whether more contacts were found.
#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    company_name: String,
    domain: &'a str,
    confidence: f64,
    source: &'a str,
    needs_manual_review: bool,
    contact_name: &'a str,
    contact_title: &'a str,
    contact_email: &'a str,
    contact_phone: &'a str,
    linkedin_url: &'a str,
    is_valid: bool,
    has_additional_contacts: bool,
    stages_completed: String,
    error_message: String,
}

pub fn write_records_csv(records: &[(String, ResolvedRecord)]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for (name, record) in records {
        let best = record.best_contact();
        let row = OutputRow {
            company_name: name.clone(),
            domain: record.domain.as_deref().unwrap_or(""),
            confidence: record.domain_confidence,
            source: record.domain_source.unwrap_or(""),
            needs_manual_review: record.needs_manual_review,
            contact_name: best.and_then(|c| c.name.as_deref()).unwrap_or(""),
            contact_title: best.and_then(|c| c.title.as_deref()).unwrap_or(""),
            contact_email: best.and_then(|c| c.email.as_deref()).unwrap_or(""),
            contact_phone: best.and_then(|c| c.phone.as_deref()).unwrap_or(""),
            linkedin_url: best.and_then(|c| c.linkedin_url.as_deref()).unwrap_or(""),
            is_valid: best.map(|c| c.is_valid).unwrap_or(false),
            has_additional_contacts: record.has_additional_contacts(),
            stages_completed: record.stages_completed.join(";"),
            error_message: record
                .errors
                .first()
                .map(|e| e.chars().take(1000).collect())
                .unwrap_or_default(),
        };
        writer
            .serialize(row)
            .map_err(|e| Error::persistence_error(format!("writing CSV row: {e}")))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::persistence_error(format!("flushing CSV writer: {e}")))?;
    String::from_utf8(bytes).map_err(|e| Error::persistence_error(e.to_string()))
}

pub fn write_records_json(records: &[ResolvedRecord]) -> Result<String> {
    serde_json::to_string_pretty(records).map_err(Error::Serialization)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_minimal_csv() {
        let csv = "name,city,phone\nAcme Co,Boston,6175551234\n";
        let rows = read_companies_csv(csv).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Acme Co");
        assert_eq!(rows[0].city.as_deref(), Some("Boston"));
    }

    #[test]
    fn missing_name_column_is_input_invalid() {
        let csv = "city,phone\nBoston,6175551234\n";
        let err = read_companies_csv(csv).unwrap_err();
        assert_eq!(err.kind(), "input_invalid");
    }

    #[test]
    fn round_trips_json() {
        let record = ResolvedRecord::new(
            "1",
            Some("acme.com".to_string()),
            80.0,
            Some("web_search_kg"),
            vec![],
            vec!["web_search_kg"],
            0.01,
            vec![],
            false,
        );
        let json = write_records_json(&[record]).unwrap();
        let parsed: Vec<ResolvedRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].domain.as_deref(), Some("acme.com"));
    }
}
