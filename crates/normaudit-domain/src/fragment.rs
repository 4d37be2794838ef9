//! Raw fragments - verbatim candidate statements awaiting review

use crate::{CheckMethod, FragmentStatus, Modality, RequirementType, SourceId};
use std::fmt;

/// Deterministic fragment identifier
///
/// The sequence number is assigned per source document in chunk order, so the
/// identifier carries the only meaningful ordering of fragments. The display
/// form is `<source-uuid>#<seq>` with a four digit sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FragmentId {
    /// Owning source document
    pub source: SourceId,
    /// Position in document order, starting at 1
    pub seq: u32,
}

impl FragmentId {
    /// Create a fragment identifier
    pub fn new(source: SourceId, seq: u32) -> Self {
        Self { source, seq }
    }

    /// Parse the `<source-uuid>#<seq>` form
    ///
    /// # Examples
    ///
    /// ```
    /// use normaudit_domain::{FragmentId, SourceId};
    ///
    /// let id = FragmentId::new(SourceId::new(), 7);
    /// let parsed = FragmentId::parse(&id.to_string()).unwrap();
    /// assert_eq!(parsed, id);
    /// assert!(id.to_string().ends_with("#0007"));
    /// ```
    pub fn parse(s: &str) -> Result<Self, String> {
        let (source, seq) = s
            .trim()
            .rsplit_once('#')
            .ok_or_else(|| format!("Invalid fragment id '{}': expected <source>#<seq>", s))?;
        let source = SourceId::from_string(source)?;
        let seq = seq
            .parse::<u32>()
            .map_err(|e| format!("Invalid fragment sequence in '{}': {}", s, e))?;
        Ok(Self { source, seq })
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{:04}", self.source, self.seq)
    }
}

impl std::str::FromStr for FragmentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Quantitative parameter detected in a fragment
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Value as written (numbers are kept as text to preserve formatting)
    pub value: String,
    /// Unit, if any
    pub unit: Option<String>,
    /// What the value constrains
    pub context: Option<String>,
}

/// A candidate normative statement extracted automatically
///
/// `raw_text` is a literal substring of the chunk it was extracted from and is
/// never edited afterwards. Review only touches `status`, `reviewed_by`, and the
/// reviewer metadata (`tags`, `check_method`).
#[derive(Debug, Clone, PartialEq)]
pub struct RawFragment {
    /// Deterministic identifier
    pub id: FragmentId,

    /// Section heading the fragment belongs to
    pub source_section: Option<String>,

    /// Clause number, free text, not guaranteed unique
    pub source_clause: Option<String>,

    /// Verbatim span from the source text
    pub raw_text: String,

    /// Detected obligation strength
    pub detected_modality: Option<Modality>,

    /// Conditions in the order they appear
    pub detected_conditions: Vec<String>,

    /// Quantitative parameters
    pub detected_parameters: Vec<Parameter>,

    /// Predicted requirement type
    pub predicted_type: RequirementType,

    /// Oracle confidence in [0.0, 1.0]
    pub confidence: f64,

    /// Review status
    pub status: FragmentStatus,

    /// Reviewer who approved or rejected the fragment
    pub reviewed_by: Option<String>,

    /// Reviewer tags
    pub tags: Vec<String>,

    /// Reviewer-chosen check method
    pub check_method: Option<CheckMethod>,

    /// Requirement this fragment was converted into
    pub converted_requirement_id: Option<String>,

    /// Index of the chunk the fragment came from
    pub chunk_index: usize,

    /// When the fragment was extracted (timestamp)
    pub created_at: u64,
}

impl RawFragment {
    /// Owning source document
    pub fn source_id(&self) -> SourceId {
        self.id.source
    }

    /// Create a pending fragment with empty detection fields
    pub fn pending(id: FragmentId, raw_text: impl Into<String>) -> Self {
        Self {
            id,
            source_section: None,
            source_clause: None,
            raw_text: raw_text.into(),
            detected_modality: None,
            detected_conditions: Vec::new(),
            detected_parameters: Vec::new(),
            predicted_type: RequirementType::Base,
            confidence: 0.5,
            status: FragmentStatus::Pending,
            reviewed_by: None,
            tags: Vec::new(),
            check_method: None,
            converted_requirement_id: None,
            chunk_index: 0,
            created_at: crate::current_timestamp(),
        }
    }
}

/// Reviewer edit of fragment metadata
///
/// Fields left as `None` are not touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentPatch {
    /// Replacement tag list
    pub tags: Option<Vec<String>>,

    /// Replacement check method
    pub check_method: Option<CheckMethod>,
}

impl FragmentPatch {
    /// Whether the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.tags.is_none() && self.check_method.is_none()
    }
}
