//! Prompts for fragment extraction

use crate::chunking::Chunk;

/// Output contract sent as the system prompt with every chunk
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You extract normative statements from fire-safety and building-code documents.

Select ONLY spans that state an obligation, a prohibition, a permission, a recommendation, a condition, or a quantitative limit (words such as "must", "shall", "is not allowed", "should", "may", "at least", "not more than", or their equivalents in the document language).

Rules:
1. Copy raw_text VERBATIM from the document. Do not paraphrase, translate, fix typos, or change punctuation.
2. Never merge two clauses into one fragment. One sentence gives at most one fragment.
3. Skip headings, tables of contents, definitions, and references to other documents that carry no requirement.
4. When unsure whether a span is normative, include it with confidence between 0.4 and 0.6.

Respond with JSON only, no commentary:
{"fragments": [
  {
    "raw_text": "exact text from the document",
    "section": "section heading or null",
    "clause": "clause number such as 4.2.1, or null",
    "modality": "must | must_not | should | may",
    "conditions": ["condition as written"],
    "parameters": [{"value": "30", "unit": "m", "context": "distance between detectors"}],
    "predicted_type": "constructive | functional | parameterized | operational | prohibitive | conditional | base",
    "confidence": 0.0
  }
]}

If the text contains no normative statements, respond with {"fragments": []}."#;

/// Builds the user prompt for one chunk
pub struct PromptBuilder<'a> {
    chunk: &'a Chunk,
    total: usize,
}

impl<'a> PromptBuilder<'a> {
    /// Create a new prompt builder
    pub fn new(chunk: &'a Chunk, total: usize) -> Self {
        Self { chunk, total }
    }

    /// Build the prompt
    pub fn build(&self) -> String {
        let mut prompt = String::with_capacity(self.chunk.text.len() + 256);
        prompt.push_str(&format!(
            "Document part {} of {} (characters {}..{}).\n",
            self.chunk.index + 1,
            self.total,
            self.chunk.start,
            self.chunk.end
        ));
        if self.chunk.index > 0 {
            prompt.push_str(
                "The beginning of this part repeats the end of the previous part; a clause cut at the edges may be incomplete.\n",
            );
        }
        prompt.push_str("\n<document>\n");
        prompt.push_str(&self.chunk.text);
        prompt.push_str("\n</document>\n");
        prompt
    }
}
