//! Parse oracle output into fragment candidates
//!
//! Oracle output is untrusted. The JSON may be wrapped in a markdown fence or
//! surrounded by prose, and the list may come bare or under a named key. Each
//! item is validated on its own, so one bad item never costs the whole chunk.

use crate::error::ExtractorError;
use crate::types::FragmentCandidate;
use normaudit_domain::{Modality, Parameter, RequirementType};
use serde_json::{Map, Value};
use tracing::warn;

/// Candidates of one response plus the number of items that were dropped
#[derive(Debug, Clone, Default)]
pub struct ParsedResponse {
    /// Items that passed validation
    pub candidates: Vec<FragmentCandidate>,
    /// Items that were present but invalid
    pub invalid: usize,
}

/// Parse an extraction response
pub fn parse_llm_response(response: &str) -> Result<ParsedResponse, ExtractorError> {
    let items = parse_json_items(response, "fragments")?;

    let mut parsed = ParsedResponse::default();
    for (idx, item) in items.iter().enumerate() {
        match parse_fragment_json(item).and_then(|c| c.validate().map(|_| c)) {
            Ok(candidate) => parsed.candidates.push(candidate),
            Err(e) => {
                warn!("Dropping fragment candidate {}: {}", idx, e);
                parsed.invalid += 1;
            }
        }
    }
    Ok(parsed)
}

/// Recover the list of items from a response
///
/// Accepts `{"<key>": [...]}` or a bare `[...]`, optionally fenced or
/// surrounded by text.
pub fn parse_json_items(response: &str, key: &str) -> Result<Vec<Value>, ExtractorError> {
    let value = extract_json(response)?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => match obj.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(ExtractorError::InvalidFormat(format!("'{}' is not an array", key))),
            None => Err(ExtractorError::InvalidFormat(format!(
                "expected an array or an object with '{}'",
                key
            ))),
        },
        _ => Err(ExtractorError::InvalidFormat(
            "expected a JSON array or object".to_string(),
        )),
    }
}

/// Find the JSON value in a response
fn extract_json(response: &str) -> Result<Value, ExtractorError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(ExtractorError::InvalidFormat("empty response".to_string()));
    }

    let mut attempts = vec![trimmed];
    if let Some(fenced) = fenced_block(trimmed) {
        attempts.push(fenced);
    }
    if let Some(span) = outer_json_span(trimmed) {
        attempts.push(span);
    }

    let mut last_error = None;
    for attempt in attempts {
        match serde_json::from_str::<Value>(attempt) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Some(e),
        }
    }
    Err(ExtractorError::InvalidFormat(format!(
        "no parsable JSON in response: {}",
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}

/// Content of the first ``` fence (language tag skipped)
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after = &text[open + 3..];
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let close = body.find("```").unwrap_or(body.len());
    Some(body[..close].trim())
}

/// From the first `{` or `[` to the last `}` or `]`
fn outer_json_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let end = text.rfind(['}', ']'])?;
    (end > start).then(|| &text[start..=end])
}

/// Text field; numbers are accepted and written out
fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn string_list(obj: &Map<String, Value>, key: &str) -> Result<Vec<String>, String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.trim().to_string()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.trim().to_string()),
                other => Err(format!("'{}' item is not a string: {}", key, other)),
            })
            .collect(),
        Some(other) => Err(format!("'{}' is not a list: {}", key, other)),
    }
}

fn parse_parameter(value: &Value) -> Result<Parameter, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "parameter is not a JSON object".to_string())?;
    let value = text_field(obj, &["value"]).ok_or_else(|| "parameter without a value".to_string())?;
    Ok(Parameter {
        value,
        unit: text_field(obj, &["unit"]),
        context: text_field(obj, &["context"]),
    })
}

/// Parse a single fragment from JSON
fn parse_fragment_json(json: &Value) -> Result<FragmentCandidate, String> {
    let obj = json
        .as_object()
        .ok_or_else(|| "fragment is not a JSON object".to_string())?;

    let raw_text = match obj.get("raw_text").or_else(|| obj.get("text")) {
        Some(Value::String(s)) => s.clone(),
        _ => return Err("missing or invalid 'raw_text'".to_string()),
    };

    let parameters = match obj.get("parameters") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(parse_parameter).collect::<Result<_, _>>()?,
        Some(other) => return Err(format!("'parameters' is not a list: {}", other)),
    };

    let confidence = match obj.get("confidence") {
        None | Some(Value::Null) => 0.5,
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| "invalid 'confidence'".to_string())?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("invalid 'confidence': {}", s))?,
        Some(other) => return Err(format!("invalid 'confidence': {}", other)),
    };

    Ok(FragmentCandidate {
        raw_text,
        section: text_field(obj, &["section", "source_section"]),
        clause: text_field(obj, &["clause", "source_clause"]),
        modality: text_field(obj, &["modality"]).and_then(|m| Modality::parse(&m)),
        conditions: string_list(obj, "conditions")?,
        parameters,
        predicted_type: text_field(obj, &["predicted_type", "type"])
            .map(|t| RequirementType::parse_or_base(&t))
            .unwrap_or(RequirementType::Base),
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wrapped_object() {
        let response = r#"{"fragments": [
            {"raw_text": "Detectors must be installed.", "clause": "4.1", "modality": "must", "confidence": 0.9}
        ]}"#;
        let parsed = parse_llm_response(response).unwrap();
        assert_eq!(parsed.candidates.len(), 1);
        assert_eq!(parsed.candidates[0].clause.as_deref(), Some("4.1"));
        assert_eq!(parsed.candidates[0].modality, Some(Modality::Must));
        assert_eq!(parsed.invalid, 0);
    }

    #[test]
    fn test_parse_bare_array_in_fence() {
        let response = "```json\n[{\"raw_text\": \"Doors shall open outward.\"}]\n```";
        let parsed = parse_llm_response(response).unwrap();
        assert_eq!(parsed.candidates.len(), 1);
        assert_eq!(parsed.candidates[0].confidence, 0.5);
        assert_eq!(parsed.candidates[0].predicted_type, RequirementType::Base);
    }

    #[test]
    fn test_parse_with_surrounding_prose() {
        let response = "Here are the fragments:\n{\"fragments\": [{\"raw_text\": \"A\"}]}\nHope this helps!";
        let parsed = parse_llm_response(response).unwrap();
        assert_eq!(parsed.candidates.len(), 1);
    }

    #[test]
    fn test_numeric_values_are_stringified() {
        let response = r#"[{"raw_text": "Spacing not more than 9 m.", "clause": 4.2,
            "parameters": [{"value": 9, "unit": "m"}]}]"#;
        let parsed = parse_llm_response(response).unwrap();
        let candidate = &parsed.candidates[0];
        assert_eq!(candidate.clause.as_deref(), Some("4.2"));
        assert_eq!(candidate.parameters[0].value, "9");
        assert_eq!(candidate.parameters[0].unit.as_deref(), Some("m"));
    }

    #[test]
    fn test_invalid_items_dropped_individually() {
        let response = r#"{"fragments": [
            {"raw_text": "Valid must text."},
            {"clause": "4.2"},
            {"raw_text": "Bad confidence.", "confidence": 1.7},
            {"raw_text": "Bad conditions.", "conditions": [1, 2]},
            "not an object",
            {"raw_text": "Also valid.", "conditions": "when heated"}
        ]}"#;
        let parsed = parse_llm_response(response).unwrap();
        assert_eq!(parsed.candidates.len(), 2);
        assert_eq!(parsed.invalid, 4);
        assert_eq!(parsed.candidates[1].conditions, vec!["when heated".to_string()]);
    }

    #[test]
    fn test_empty_list_is_ok() {
        let parsed = parse_llm_response(r#"{"fragments": []}"#).unwrap();
        assert!(parsed.candidates.is_empty());
    }

    #[test]
    fn test_not_json_is_invalid_format() {
        assert!(matches!(
            parse_llm_response("I could not find anything."),
            Err(ExtractorError::InvalidFormat(_))
        ));
        assert!(matches!(parse_llm_response(""), Err(ExtractorError::InvalidFormat(_))));
    }

    #[test]
    fn test_object_without_key_is_invalid_format() {
        assert!(matches!(
            parse_llm_response(r#"{"items": []}"#),
            Err(ExtractorError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_other_key_for_conversion() {
        let items = parse_json_items(r#"{"requirements": [{"a": 1}]}"#, "requirements").unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_fenced_block_without_language() {
        assert_eq!(fenced_block("```\n[1]\n```"), Some("[1]"));
    }
}
