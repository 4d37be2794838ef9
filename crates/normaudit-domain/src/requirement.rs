//! Requirement sets and requirements - the authoritative audit units

use crate::{CheckMethod, FragmentId, Severity, SourceId};

/// Lifecycle of a requirement set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetStatus {
    /// Being assembled, not visible to checklists
    Draft,
    /// Released for use in audits
    Published,
    /// Retired
    Archived,
}

impl SetStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            SetStatus::Draft => "draft",
            SetStatus::Published => "published",
            SetStatus::Archived => "archived",
        }
    }

    /// Parse a status from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(SetStatus::Draft),
            "published" => Some(SetStatus::Published),
            "archived" => Some(SetStatus::Archived),
            _ => None,
        }
    }

    /// Get the next status in the lifecycle
    pub fn next(&self) -> Option<Self> {
        match self {
            SetStatus::Draft => Some(SetStatus::Published),
            SetStatus::Published => Some(SetStatus::Archived),
            SetStatus::Archived => None,
        }
    }
}

/// A named, versioned collection of requirements
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementSet {
    /// Unique identifier (UUIDv7 string)
    pub id: String,

    /// Human-facing code, e.g. `RS-0189a1b2` for auto sets
    pub code: String,

    /// Display name
    pub name: String,

    /// Version label
    pub version: String,

    /// Source document this set derives from (None for manual curation)
    pub source_id: Option<SourceId>,

    /// Lifecycle status
    pub status: SetStatus,

    /// When the set was created (timestamp)
    pub created_at: u64,
}

impl RequirementSet {
    /// Create a new draft set
    pub fn draft(code: impl Into<String>, name: impl Into<String>, source_id: Option<SourceId>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            code: code.into(),
            name: name.into(),
            version: "1".to_string(),
            source_id,
            status: SetStatus::Draft,
            created_at: crate::current_timestamp(),
        }
    }
}

/// A reviewed, checklist-ready normative statement
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    /// Globally unique identifier, `<prefix>-<NNNN>`
    pub requirement_id: String,

    /// Owning requirement set
    pub requirement_set_id: String,

    /// Source document namespace of the identifier
    pub source_id: SourceId,

    /// Inspection discipline code
    pub system_id: String,

    /// Clause reference
    pub clause: String,

    /// One or two sentence summary
    pub text_short: String,

    /// Verbatim clause text
    pub text_full: String,

    /// How the requirement is verified
    pub check_method: CheckMethod,

    /// Canonical severity
    pub severity_hint: Severity,

    /// Free-form tags
    pub tags: Vec<String>,

    /// Whether every audit must check this requirement
    pub must_check: bool,

    /// Fragment this requirement was converted from
    pub source_fragment_id: Option<FragmentId>,

    /// When the requirement was created (timestamp)
    pub created_at: u64,
}

/// Derive the requirement id prefix from a document code
///
/// Uppercases the code and collapses every run of non-alphanumeric characters
/// into a single `-`. An empty result falls back to `REQ`.
///
/// # Examples
///
/// ```
/// use normaudit_domain::requirement_prefix;
///
/// assert_eq!(requirement_prefix("SP RK 2.02-102-2022"), "SP-RK-2-02-102-2022");
/// assert_eq!(requirement_prefix("nfpa 72"), "NFPA-72");
/// assert_eq!(requirement_prefix("  // "), "REQ");
/// ```
pub fn requirement_prefix(code: &str) -> String {
    let mut prefix = String::with_capacity(code.len());
    let mut pending_dash = false;
    for c in code.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !prefix.is_empty() {
                prefix.push('-');
            }
            pending_dash = false;
            prefix.extend(c.to_uppercase());
        } else {
            pending_dash = true;
        }
    }
    if prefix.is_empty() {
        "REQ".to_string()
    } else {
        prefix
    }
}

/// Format a requirement id from its prefix and numeric suffix
pub fn format_requirement_id(prefix: &str, number: u32) -> String {
    format!("{}-{:04}", prefix, number)
}
