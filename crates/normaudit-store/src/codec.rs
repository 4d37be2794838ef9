//! Row <-> domain conversions

use crate::StoreError;
use normaudit_domain::{
    CheckMethod, FragmentId, FragmentStatus, Modality, Parameter, PipelineRun, RawFragment,
    Requirement, RequirementSet, RequirementType, RunId, RunKind, RunStatus, SetStatus, Severity,
    SourceDocument, SourceFile, SourceId, SourceStatus,
};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

pub(crate) const FRAGMENT_COLUMNS: &str = "source_id, seq, source_section, source_clause, raw_text, \
     detected_modality, detected_conditions, detected_parameters, predicted_type, confidence, \
     status, reviewed_by, tags, check_method, converted_requirement_id, chunk_index, created_at";

pub(crate) const SOURCE_COLUMNS: &str =
    "id, jurisdiction, code, title, edition_date, status, created_at";

pub(crate) const SET_COLUMNS: &str = "id, code, name, version, source_id, status, created_at";

pub(crate) const REQUIREMENT_COLUMNS: &str = "requirement_id, requirement_set_id, source_id, \
     system_id, clause, text_short, text_full, check_method, severity_hint, tags, must_check, \
     source_fragment_id, created_at";

pub(crate) const RUN_COLUMNS: &str = "id, source_id, kind, status, units_done, units_total, \
     items_written, error, created_at, updated_at";

#[derive(Serialize, Deserialize)]
struct StoredParameter {
    value: String,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    context: Option<String>,
}

/// Wrap a conversion failure so it can travel through rusqlite row mapping
fn conversion_error(column: usize, ty: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, ty, Box::new(StoreError::InvalidData(message)))
}

pub(crate) fn id_to_bytes(value: u128) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

pub(crate) fn source_to_bytes(id: SourceId) -> Vec<u8> {
    id_to_bytes(id.value())
}

fn bytes_to_u128(bytes: &[u8], column: usize) -> rusqlite::Result<u128> {
    if bytes.len() != 16 {
        return Err(conversion_error(
            column,
            Type::Blob,
            format!("Expected 16 bytes for an id, got {}", bytes.len()),
        ));
    }
    let mut arr = [0u8; 16];
    arr.copy_from_slice(bytes);
    Ok(u128::from_be_bytes(arr))
}

fn source_at(row: &Row<'_>, column: usize) -> rusqlite::Result<SourceId> {
    let bytes: Vec<u8> = row.get(column)?;
    bytes_to_u128(&bytes, column).map(SourceId::from_value)
}

fn json_list<T: serde::de::DeserializeOwned>(row: &Row<'_>, column: usize) -> rusqlite::Result<Vec<T>> {
    let text: String = row.get(column)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(column, Type::Text, e.to_string()))
}

pub(crate) fn strings_to_json(values: &[String]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(values)?)
}

pub(crate) fn parameters_to_json(values: &[Parameter]) -> Result<String, StoreError> {
    let stored: Vec<StoredParameter> = values
        .iter()
        .map(|p| StoredParameter {
            value: p.value.clone(),
            unit: p.unit.clone(),
            context: p.context.clone(),
        })
        .collect();
    Ok(serde_json::to_string(&stored)?)
}

fn parse_column<T>(
    row: &Row<'_>,
    column: usize,
    what: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let text: String = row.get(column)?;
    parse(&text).ok_or_else(|| conversion_error(column, Type::Text, format!("Unknown {}: {}", what, text)))
}

fn timestamp(row: &Row<'_>, column: usize) -> rusqlite::Result<u64> {
    Ok(row.get::<_, i64>(column)?.max(0) as u64)
}

pub(crate) fn row_to_source(row: &Row<'_>) -> rusqlite::Result<SourceDocument> {
    Ok(SourceDocument {
        id: source_at(row, 0)?,
        jurisdiction: row.get(1)?,
        code: row.get(2)?,
        title: row.get(3)?,
        edition_date: row.get(4)?,
        status: parse_column(row, 5, "source status", SourceStatus::parse)?,
        created_at: timestamp(row, 6)?,
    })
}

pub(crate) fn row_to_file(row: &Row<'_>) -> rusqlite::Result<SourceFile> {
    Ok(SourceFile {
        id: row.get(0)?,
        source_id: source_at(row, 1)?,
        filename: row.get(2)?,
        content: row.get(3)?,
        attached_at: timestamp(row, 4)?,
    })
}

pub(crate) fn row_to_fragment(row: &Row<'_>) -> rusqlite::Result<RawFragment> {
    let source = source_at(row, 0)?;
    let seq: i64 = row.get(1)?;
    let modality: Option<String> = row.get(5)?;
    let parameters: Vec<StoredParameter> = json_list(row, 7)?;
    let check_method: Option<String> = row.get(13)?;

    Ok(RawFragment {
        id: FragmentId::new(source, seq as u32),
        source_section: row.get(2)?,
        source_clause: row.get(3)?,
        raw_text: row.get(4)?,
        detected_modality: modality.as_deref().and_then(Modality::parse),
        detected_conditions: json_list(row, 6)?,
        detected_parameters: parameters
            .into_iter()
            .map(|p| Parameter {
                value: p.value,
                unit: p.unit,
                context: p.context,
            })
            .collect(),
        predicted_type: parse_column(row, 8, "requirement type", |s| {
            Some(RequirementType::parse_or_base(s))
        })?,
        confidence: row.get(9)?,
        status: parse_column(row, 10, "fragment status", FragmentStatus::parse)?,
        reviewed_by: row.get(11)?,
        tags: json_list(row, 12)?,
        check_method: check_method.as_deref().and_then(CheckMethod::parse),
        converted_requirement_id: row.get(14)?,
        chunk_index: row.get::<_, i64>(15)?.max(0) as usize,
        created_at: timestamp(row, 16)?,
    })
}

pub(crate) fn row_to_set(row: &Row<'_>) -> rusqlite::Result<RequirementSet> {
    let source: Option<Vec<u8>> = row.get(4)?;
    let source_id = match source {
        Some(bytes) => Some(SourceId::from_value(bytes_to_u128(&bytes, 4)?)),
        None => None,
    };
    Ok(RequirementSet {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        version: row.get(3)?,
        source_id,
        status: parse_column(row, 5, "set status", SetStatus::parse)?,
        created_at: timestamp(row, 6)?,
    })
}

pub(crate) fn row_to_requirement(row: &Row<'_>) -> rusqlite::Result<Requirement> {
    let fragment: Option<String> = row.get(11)?;
    let source_fragment_id = match fragment {
        Some(text) => Some(
            FragmentId::parse(&text).map_err(|e| conversion_error(11, Type::Text, e))?,
        ),
        None => None,
    };
    Ok(Requirement {
        requirement_id: row.get(0)?,
        requirement_set_id: row.get(1)?,
        source_id: source_at(row, 2)?,
        system_id: row.get(3)?,
        clause: row.get(4)?,
        text_short: row.get(5)?,
        text_full: row.get(6)?,
        check_method: parse_column(row, 7, "check method", CheckMethod::parse)?,
        severity_hint: parse_column(row, 8, "severity", Severity::parse)?,
        tags: json_list(row, 9)?,
        must_check: row.get(10)?,
        source_fragment_id,
        created_at: timestamp(row, 12)?,
    })
}

pub(crate) fn row_to_run(row: &Row<'_>) -> rusqlite::Result<PipelineRun> {
    let id: Vec<u8> = row.get(0)?;
    Ok(PipelineRun {
        id: RunId::from_value(bytes_to_u128(&id, 0)?),
        source_id: source_at(row, 1)?,
        kind: parse_column(row, 2, "run kind", RunKind::parse)?,
        status: parse_column(row, 3, "run status", RunStatus::parse)?,
        units_done: row.get::<_, i64>(4)?.max(0) as usize,
        units_total: row.get::<_, i64>(5)?.max(0) as usize,
        items_written: row.get::<_, i64>(6)?.max(0) as usize,
        error: row.get(7)?,
        created_at: timestamp(row, 8)?,
        updated_at: timestamp(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_bytes_round_trip() {
        let id = SourceId::new();
        let bytes = source_to_bytes(id);
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes_to_u128(&bytes, 0).unwrap(), id.value());
    }

    #[test]
    fn test_short_id_bytes_rejected() {
        assert!(bytes_to_u128(&[1, 2, 3], 0).is_err());
    }

    #[test]
    fn test_parameters_json_shape() {
        let json = parameters_to_json(&[Parameter {
            value: "1.5".to_string(),
            unit: Some("m".to_string()),
            context: None,
        }])
        .unwrap();
        assert_eq!(json, r#"[{"value":"1.5","unit":"m","context":null}]"#);
    }
}
