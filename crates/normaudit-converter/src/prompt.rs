//! Prompts for requirement conversion

use normaudit_domain::RawFragment;
use serde_json::{json, Value};

/// Output contract sent as the system prompt with every batch
pub const CONVERSION_SYSTEM_PROMPT: &str = r#"You turn reviewed normative fragments into audit checklist requirements.

For EVERY fragment you receive, produce exactly one requirement:
- "fragment_id": copy the fragment_id you were given, unchanged
- "clause": clause number of the fragment
- "text_short": one or two sentences an inspector can check on site, in the language of the fragment
- "check_method": visual | measurement | testing | documentation
- "severity_hint": CRITICAL | HIGH | MEDIUM | LOW (how dangerous a violation is)
- "tags": short lowercase keywords
- "must_check": true when every audit has to verify it

Do not skip fragments, do not merge them, and do not invent fragments.

Respond with JSON only, no commentary:
{"requirements": [
  {"fragment_id": "...", "clause": "4.1", "text_short": "...", "check_method": "visual", "severity_hint": "HIGH", "tags": ["detectors"], "must_check": true}
]}"#;

/// Builds the user prompt for one batch
pub struct BatchPromptBuilder<'a> {
    fragments: &'a [RawFragment],
    system_id: &'a str,
    batch_index: usize,
    total: usize,
}

impl<'a> BatchPromptBuilder<'a> {
    /// Create a new prompt builder
    pub fn new(fragments: &'a [RawFragment], system_id: &'a str, batch_index: usize, total: usize) -> Self {
        Self {
            fragments,
            system_id,
            batch_index,
            total,
        }
    }

    /// Build the prompt
    pub fn build(&self) -> String {
        let items: Vec<Value> = self.fragments.iter().map(fragment_json).collect();
        let body = serde_json::to_string_pretty(&json!({ "fragments": items }))
            .unwrap_or_else(|_| "{}".to_string());
        format!(
            "Inspection discipline: {}\nBatch {} of {}, {} fragments.\n\n{}\n",
            self.system_id,
            self.batch_index + 1,
            self.total,
            self.fragments.len(),
            body
        )
    }
}

fn fragment_json(fragment: &RawFragment) -> Value {
    json!({
        "fragment_id": fragment.id.to_string(),
        "clause": fragment.source_clause,
        "section": fragment.source_section,
        "text": fragment.raw_text,
        "modality": fragment.detected_modality.map(|m| m.as_str()),
        "conditions": fragment.detected_conditions,
        "parameters": fragment
            .detected_parameters
            .iter()
            .map(|p| json!({"value": p.value, "unit": p.unit, "context": p.context}))
            .collect::<Vec<_>>(),
        "type": fragment.predicted_type.as_str(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use normaudit_domain::{FragmentId, Modality, SourceId};

    #[test]
    fn test_prompt_lists_every_fragment() {
        let source = SourceId::new();
        let mut first = RawFragment::pending(FragmentId::new(source, 1), "Detectors must be installed.");
        first.detected_modality = Some(Modality::Must);
        let second = RawFragment::pending(FragmentId::new(source, 2), "Doors must close.");
        let fragments = vec![first, second];

        let prompt = BatchPromptBuilder::new(&fragments, "fire_alarm", 0, 3).build();

        assert!(prompt.contains("Inspection discipline: fire_alarm"));
        assert!(prompt.contains("Batch 1 of 3, 2 fragments."));
        assert!(prompt.contains(&fragments[0].id.to_string()));
        assert!(prompt.contains(&fragments[1].id.to_string()));
        assert!(prompt.contains("\"must\""));
    }

    #[test]
    fn test_system_prompt_states_contract() {
        assert!(CONVERSION_SYSTEM_PROMPT.contains("\"requirements\""));
        assert!(CONVERSION_SYSTEM_PROMPT.contains("exactly one requirement"));
    }
}
