//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use normaudit_domain::{
    current_timestamp, FragmentStatus, PipelineRun, RawFragment, Requirement, RunStatus,
    SourceDocument, SourceFile,
};
use normaudit_gatekeeper::{ReviewOutcome, ReviewSummary};
use normaudit_pipeline::PipelineOutcome;
use serde_json::{json, Value};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Widest text cell in a table before it is cut
const TEXT_WIDTH: usize = 60;

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Selected output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format source documents.
    pub fn format_sources(&self, sources: &[SourceDocument]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let values: Vec<Value> = sources.iter().map(source_json).collect();
                Ok(serde_json::to_string_pretty(&values)?)
            }
            OutputFormat::Quiet => Ok(join_ids(sources.iter().map(|s| s.id.to_string()))),
            OutputFormat::Table => {
                if sources.is_empty() {
                    return Ok(self.colorize("No source documents registered.", "yellow"));
                }
                let mut builder = Builder::default();
                builder.push_record(["ID", "Code", "Title", "Jurisdiction", "Status", "Added"]);
                for source in sources {
                    builder.push_record([
                        source.id.short(),
                        source.code.clone(),
                        truncate(&source.title, 40),
                        source.jurisdiction.clone(),
                        source.status.as_str().to_string(),
                        format_age(source.created_at),
                    ]);
                }
                Ok(render(builder))
            }
        }
    }

    /// Format one source document with its files and review counts.
    pub fn format_source_detail(
        &self,
        source: &SourceDocument,
        files: &[SourceFile],
        summary: &ReviewSummary,
        requirements: usize,
    ) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let mut value = source_json(source);
                value["files"] = Value::Array(
                    files
                        .iter()
                        .map(|f| {
                            json!({
                                "id": f.id,
                                "filename": f.filename,
                                "bytes": f.content.len(),
                                "attached_at": f.attached_at,
                            })
                        })
                        .collect(),
                );
                value["fragments"] = serde_json::to_value(summary)?;
                value["requirements"] = json!(requirements);
                Ok(serde_json::to_string_pretty(&value)?)
            }
            OutputFormat::Quiet => Ok(source.id.to_string()),
            OutputFormat::Table => {
                let mut lines = vec![
                    format!("{} {}", self.colorize(&source.code, "cyan"), source.title),
                    format!("  id:           {}", source.id),
                    format!("  jurisdiction: {}", source.jurisdiction),
                    format!(
                        "  edition:      {}",
                        source.edition_date.as_deref().unwrap_or("-")
                    ),
                    format!("  status:       {}", source.status.as_str()),
                    format!(
                        "  fragments:    {} pending, {} approved, {} rejected, {} processed",
                        summary.pending, summary.approved, summary.rejected, summary.processed
                    ),
                    format!("  requirements: {}", requirements),
                ];
                if files.is_empty() {
                    lines.push(self.colorize("  no files attached", "yellow"));
                } else {
                    lines.push("  files:".to_string());
                    for file in files {
                        lines.push(format!(
                            "    [{}] {} ({} bytes)",
                            file.id,
                            file.filename,
                            file.content.len()
                        ));
                    }
                }
                Ok(lines.join("\n"))
            }
        }
    }

    /// Format fragments.
    pub fn format_fragments(&self, fragments: &[RawFragment]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let values: Vec<Value> = fragments.iter().map(fragment_json).collect();
                Ok(serde_json::to_string_pretty(&values)?)
            }
            OutputFormat::Quiet => Ok(join_ids(fragments.iter().map(|f| f.id.to_string()))),
            OutputFormat::Table => {
                if fragments.is_empty() {
                    return Ok(self.colorize("No fragments found.", "yellow"));
                }
                let mut builder = Builder::default();
                builder.push_record(["#", "Clause", "Modality", "Type", "Status", "Text"]);
                for fragment in fragments {
                    builder.push_record([
                        fragment.id.seq.to_string(),
                        fragment.source_clause.clone().unwrap_or_default(),
                        fragment
                            .detected_modality
                            .map(|m| m.as_str().to_string())
                            .unwrap_or_default(),
                        fragment.predicted_type.as_str().to_string(),
                        self.status(fragment.status),
                        truncate(&fragment.raw_text, TEXT_WIDTH),
                    ]);
                }
                Ok(render(builder))
            }
        }
    }

    /// Full view of one fragment, used while reviewing.
    pub fn format_fragment_detail(&self, fragment: &RawFragment) -> String {
        let mut lines = vec![format!(
            "{} {}",
            self.colorize(&format!("#{}", fragment.id.seq), "cyan"),
            self.status(fragment.status)
        )];
        if let Some(section) = &fragment.source_section {
            lines.push(format!("  section:   {}", section));
        }
        if let Some(clause) = &fragment.source_clause {
            lines.push(format!("  clause:    {}", clause));
        }
        if let Some(modality) = fragment.detected_modality {
            lines.push(format!("  modality:  {}", modality.as_str()));
        }
        lines.push(format!(
            "  type:      {} (confidence {:.2})",
            fragment.predicted_type.as_str(),
            fragment.confidence
        ));
        if !fragment.detected_conditions.is_empty() {
            lines.push(format!("  when:      {}", fragment.detected_conditions.join("; ")));
        }
        for parameter in &fragment.detected_parameters {
            lines.push(format!(
                "  parameter: {}{}",
                parameter.value,
                parameter
                    .unit
                    .as_ref()
                    .map(|u| format!(" {}", u))
                    .unwrap_or_default()
            ));
        }
        if !fragment.tags.is_empty() {
            lines.push(format!("  tags:      {}", fragment.tags.join(", ")));
        }
        if let Some(method) = fragment.check_method {
            lines.push(format!("  check:     {}", method.as_str()));
        }
        lines.push(String::new());
        lines.push(format!("  {}", fragment.raw_text.replace('\n', "\n  ")));
        lines.join("\n")
    }

    /// Format requirements.
    pub fn format_requirements(&self, requirements: &[Requirement]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let values: Vec<Value> = requirements.iter().map(requirement_json).collect();
                Ok(serde_json::to_string_pretty(&values)?)
            }
            OutputFormat::Quiet => Ok(join_ids(
                requirements.iter().map(|r| r.requirement_id.clone()),
            )),
            OutputFormat::Table => {
                if requirements.is_empty() {
                    return Ok(self.colorize("No requirements found.", "yellow"));
                }
                let mut builder = Builder::default();
                builder.push_record(["ID", "System", "Clause", "Severity", "Check", "Requirement"]);
                for requirement in requirements {
                    builder.push_record([
                        requirement.requirement_id.clone(),
                        requirement.system_id.clone(),
                        requirement.clause.clone(),
                        requirement.severity_hint.as_str().to_string(),
                        requirement.check_method.as_str().to_string(),
                        truncate(&requirement.text_short, TEXT_WIDTH),
                    ]);
                }
                Ok(render(builder))
            }
        }
    }

    /// Format pipeline runs.
    pub fn format_runs(&self, runs: &[PipelineRun]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let values: Vec<Value> = runs.iter().map(run_json).collect();
                Ok(serde_json::to_string_pretty(&values)?)
            }
            OutputFormat::Quiet => Ok(join_ids(runs.iter().map(|r| r.id.to_string()))),
            OutputFormat::Table => {
                if runs.is_empty() {
                    return Ok(self.colorize("No runs recorded.", "yellow"));
                }
                let mut builder = Builder::default();
                builder.push_record(["Run", "Kind", "Status", "Progress", "Written", "Started", "Error"]);
                for run in runs {
                    builder.push_record([
                        run.id.to_string().chars().take(8).collect(),
                        run.kind.as_str().to_string(),
                        self.run_status(run.status),
                        format!("{}/{}", run.units_done, run.units_total),
                        run.items_written.to_string(),
                        format_age(run.created_at),
                        truncate(run.error.as_deref().unwrap_or(""), 40),
                    ]);
                }
                Ok(render(builder))
            }
        }
    }

    /// One-line progress report of a watched run.
    pub fn run_progress(&self, run: &PipelineRun) -> String {
        let unit = match run.kind {
            normaudit_domain::RunKind::Extraction => "chunk",
            normaudit_domain::RunKind::Conversion => "batch",
        };
        format!(
            "{} {} {}/{} ({} written)",
            self.run_status(run.status),
            unit,
            run.units_done,
            run.units_total,
            run.items_written
        )
    }

    /// Format the result of a foreground pipeline stage.
    pub fn format_outcome(&self, outcome: &PipelineOutcome) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(outcome)?),
            OutputFormat::Quiet => Ok(outcome.requirement_ids.join("\n")),
            OutputFormat::Table => {
                let mut lines = Vec::new();
                let heading = if outcome.dry_run {
                    format!("{} (dry run)", outcome.summary())
                } else {
                    outcome.summary()
                };
                lines.push(if outcome.success {
                    self.success(&heading)
                } else {
                    self.error(&heading)
                });
                if let Some(isolation) = &outcome.isolation {
                    lines.push(format!("  isolation: {}", isolation));
                }
                if outcome.chunk_failures > 0 {
                    lines.push(self.warning(&format!(
                        "{} of {} chunk(s) skipped",
                        outcome.chunk_failures, outcome.chunk_count
                    )));
                }
                for item in &outcome.preview {
                    lines.push(format!("  - {}", truncate(item, 100)));
                }
                Ok(lines.join("\n"))
            }
        }
    }

    /// Format per-fragment results of approve/reject.
    pub fn format_review_outcomes(&self, outcomes: &[ReviewOutcome]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let values: Vec<Value> = outcomes
                    .iter()
                    .map(|o| match &o.result {
                        Ok(status) => json!({"id": o.id.to_string(), "status": status.as_str()}),
                        Err(e) => json!({"id": o.id.to_string(), "error": e.to_string()}),
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&values)?)
            }
            OutputFormat::Quiet => Ok(join_ids(
                outcomes
                    .iter()
                    .filter(|o| o.result.is_ok())
                    .map(|o| o.id.to_string()),
            )),
            OutputFormat::Table => Ok(outcomes
                .iter()
                .map(|o| match &o.result {
                    Ok(status) => self.success(&format!("{} {}", o.id, status.as_str())),
                    Err(e) => self.error(&e.to_string()),
                })
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn status(&self, status: FragmentStatus) -> String {
        let color = match status {
            FragmentStatus::Pending => "yellow",
            FragmentStatus::Approved => "green",
            FragmentStatus::Rejected => "red",
            FragmentStatus::Processed => "blue",
        };
        self.colorize(status.as_str(), color)
    }

    fn run_status(&self, status: RunStatus) -> String {
        let color = match status {
            RunStatus::Queued | RunStatus::Running => "cyan",
            RunStatus::Succeeded => "green",
            RunStatus::Failed => "red",
            RunStatus::Cancelled => "magenta",
        };
        self.colorize(status.as_str(), color)
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            "magenta" => text.magenta().to_string(),
            _ => text.to_string(),
        }
    }
}

fn render(builder: Builder) -> String {
    let mut table = builder.build();
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
    table.to_string()
}

fn join_ids(ids: impl Iterator<Item = String>) -> String {
    ids.collect::<Vec<_>>().join("\n")
}

/// Cut `text` to `width` characters on one line.
pub fn truncate(text: &str, width: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= width {
        return flat;
    }
    let mut cut: String = flat.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Age of a timestamp as `42s`, `5m`, `3h` or `2d`.
pub fn format_age(timestamp: u64) -> String {
    let age = current_timestamp().saturating_sub(timestamp);
    match age {
        0..=59 => format!("{}s ago", age),
        60..=3599 => format!("{}m ago", age / 60),
        3600..=86_399 => format!("{}h ago", age / 3600),
        _ => format!("{}d ago", age / 86_400),
    }
}

fn source_json(source: &SourceDocument) -> Value {
    json!({
        "id": source.id.to_string(),
        "jurisdiction": source.jurisdiction,
        "code": source.code,
        "title": source.title,
        "edition_date": source.edition_date,
        "status": source.status.as_str(),
        "created_at": source.created_at,
    })
}

fn fragment_json(fragment: &RawFragment) -> Value {
    json!({
        "id": fragment.id.to_string(),
        "seq": fragment.id.seq,
        "section": fragment.source_section,
        "clause": fragment.source_clause,
        "raw_text": fragment.raw_text,
        "modality": fragment.detected_modality.map(|m| m.as_str()),
        "conditions": fragment.detected_conditions,
        "parameters": fragment.detected_parameters.iter().map(|p| json!({
            "value": p.value,
            "unit": p.unit,
            "context": p.context,
        })).collect::<Vec<_>>(),
        "predicted_type": fragment.predicted_type.as_str(),
        "confidence": fragment.confidence,
        "status": fragment.status.as_str(),
        "reviewed_by": fragment.reviewed_by,
        "tags": fragment.tags,
        "check_method": fragment.check_method.map(|m| m.as_str()),
        "requirement_id": fragment.converted_requirement_id,
        "chunk_index": fragment.chunk_index,
        "created_at": fragment.created_at,
    })
}

fn requirement_json(requirement: &Requirement) -> Value {
    json!({
        "requirement_id": requirement.requirement_id,
        "requirement_set_id": requirement.requirement_set_id,
        "source_id": requirement.source_id.to_string(),
        "system_id": requirement.system_id,
        "clause": requirement.clause,
        "text_short": requirement.text_short,
        "text_full": requirement.text_full,
        "check_method": requirement.check_method.as_str(),
        "severity_hint": requirement.severity_hint.as_str(),
        "tags": requirement.tags,
        "must_check": requirement.must_check,
        "source_fragment_id": requirement.source_fragment_id.map(|id| id.to_string()),
        "created_at": requirement.created_at,
    })
}

fn run_json(run: &PipelineRun) -> Value {
    json!({
        "id": run.id.to_string(),
        "source_id": run.source_id.to_string(),
        "kind": run.kind.as_str(),
        "status": run.status.as_str(),
        "units_done": run.units_done,
        "units_total": run.units_total,
        "items_written": run.items_written,
        "error": run.error,
        "created_at": run.created_at,
        "updated_at": run.updated_at,
    })
}
