//! Validate oracle output for one conversion batch
//!
//! Unlike extraction, nothing is dropped here: one bad item makes the whole
//! batch malformed, which aborts the run before anything is written.

use crate::error::ConversionError;
use normaudit_domain::{
    CheckMethod, FragmentId, Modality, RawFragment, Requirement, Severity, SourceId,
};
use normaudit_extractor::parse_json_items;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A validated requirement that has no identifier yet
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementDraft {
    /// Fragment the requirement comes from
    pub fragment_id: FragmentId,
    /// Clause reference
    pub clause: String,
    /// Checklist summary
    pub text_short: String,
    /// Verbatim fragment text
    pub text_full: String,
    /// How the requirement is verified
    pub check_method: CheckMethod,
    /// Canonical severity
    pub severity_hint: Severity,
    /// Reviewer tags followed by oracle tags
    pub tags: Vec<String>,
    /// Whether every audit must check this requirement
    pub must_check: bool,
}

impl RequirementDraft {
    /// Turn the draft into a requirement with its final identifier
    pub fn into_requirement(
        self,
        requirement_id: String,
        requirement_set_id: &str,
        source_id: SourceId,
        system_id: &str,
    ) -> Requirement {
        Requirement {
            requirement_id,
            requirement_set_id: requirement_set_id.to_string(),
            source_id,
            system_id: system_id.to_string(),
            clause: self.clause,
            text_short: self.text_short,
            text_full: self.text_full,
            check_method: self.check_method,
            severity_hint: self.severity_hint,
            tags: self.tags,
            must_check: self.must_check,
            source_fragment_id: Some(self.fragment_id),
            created_at: normaudit_domain::current_timestamp(),
        }
    }
}

/// Parse and validate the response for `batch`
///
/// Drafts are returned in the order of `batch`, whatever order the oracle
/// answered in.
pub fn parse_conversion_response(
    response: &str,
    batch: &[RawFragment],
    batch_index: usize,
) -> Result<Vec<RequirementDraft>, ConversionError> {
    let malformed = |reason: String| ConversionError::OracleMalformed {
        batch: batch_index,
        reason,
    };

    let items = parse_json_items(response, "requirements").map_err(|e| malformed(e.to_string()))?;

    let by_id: HashMap<String, &RawFragment> =
        batch.iter().map(|f| (f.id.to_string(), f)).collect();
    let mut drafts: HashMap<FragmentId, RequirementDraft> = HashMap::with_capacity(batch.len());

    for (idx, item) in items.iter().enumerate() {
        let obj = item
            .as_object()
            .ok_or_else(|| malformed(format!("item {} is not a JSON object", idx)))?;
        let fragment_key = text_field(obj, "fragment_id")
            .ok_or_else(|| malformed(format!("item {} has no fragment_id", idx)))?;
        let fragment = by_id
            .get(&fragment_key)
            .ok_or_else(|| malformed(format!("item {} names unknown fragment {}", idx, fragment_key)))?;

        let draft = build_draft(obj, fragment).map_err(|reason| malformed(format!("{}: {}", fragment_key, reason)))?;
        if drafts.insert(fragment.id, draft).is_some() {
            return Err(malformed(format!("fragment {} converted twice", fragment_key)));
        }
    }

    batch
        .iter()
        .map(|fragment| {
            drafts
                .remove(&fragment.id)
                .ok_or_else(|| malformed(format!("fragment {} was not converted", fragment.id)))
        })
        .collect()
}

fn build_draft(obj: &Map<String, Value>, fragment: &RawFragment) -> Result<RequirementDraft, String> {
    let text_short = text_field(obj, "text_short").ok_or_else(|| "empty text_short".to_string())?;

    let oracle_method = match text_field(obj, "check_method") {
        Some(raw) => Some(CheckMethod::parse(&raw).ok_or_else(|| format!("unknown check_method '{}'", raw))?),
        None => None,
    };
    let check_method = fragment
        .check_method
        .or(oracle_method)
        .unwrap_or(CheckMethod::Visual);

    let severity_hint = match text_field(obj, "severity_hint").or_else(|| text_field(obj, "severity")) {
        Some(raw) => Severity::parse(&raw).ok_or_else(|| format!("unknown severity_hint '{}'", raw))?,
        None => Severity::Medium,
    };

    let mut tags = fragment.tags.clone();
    for tag in oracle_tags(obj)? {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    let must_check = match obj.get("must_check") {
        None | Some(Value::Null) => matches!(
            fragment.detected_modality,
            Some(Modality::Must) | Some(Modality::MustNot)
        ),
        Some(Value::Bool(b)) => *b,
        Some(other) => return Err(format!("must_check is not a boolean: {}", other)),
    };

    let clause = fragment
        .source_clause
        .clone()
        .or_else(|| text_field(obj, "clause"))
        .unwrap_or_default();

    Ok(RequirementDraft {
        fragment_id: fragment.id,
        clause,
        text_short,
        text_full: fragment.raw_text.clone(),
        check_method,
        severity_hint,
        tags,
        must_check,
    })
}

fn oracle_tags(obj: &Map<String, Value>) -> Result<Vec<String>, String> {
    match obj.get("tags") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.trim().to_lowercase()),
                other => Err(format!("tag is not a string: {}", other)),
            })
            .filter(|tag| !matches!(tag, Ok(t) if t.is_empty()))
            .collect(),
        Some(other) => Err(format!("tags is not a list: {}", other)),
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
