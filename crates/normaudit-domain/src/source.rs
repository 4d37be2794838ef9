//! Source documents - the regulatory texts everything else derives from

use std::fmt;

/// Unique identifier for a source document based on UUIDv7
///
/// UUIDv7 keeps identifiers chronologically sortable, so listings of source
/// documents come back in ingestion order without an extra column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(u128);

impl SourceId {
    /// Generate a new UUIDv7-based SourceId
    ///
    /// # Examples
    ///
    /// ```
    /// use normaudit_domain::SourceId;
    ///
    /// let id = SourceId::new();
    /// assert!(id.value() > 0);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Create a SourceId from a raw u128 value
    ///
    /// This is primarily for storage layer deserialization.
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Parse a SourceId from its hyphenated UUID string
    ///
    /// # Examples
    ///
    /// ```
    /// use normaudit_domain::SourceId;
    ///
    /// let id = SourceId::new();
    /// let parsed = SourceId::from_string(&id.to_string()).unwrap();
    /// assert_eq!(id, parsed);
    /// ```
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s.trim())
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid source id '{}': {}", s, e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }

    /// Last eight hex digits of the hyphenated form
    ///
    /// The leading digits of a UUIDv7 are a timestamp, the tail is random.
    /// Used as the printed handle and for the auto requirement set code.
    ///
    /// # Examples
    ///
    /// ```
    /// use normaudit_domain::SourceId;
    ///
    /// let id = SourceId::from_string("0189a1b2-0000-7000-8000-00000badf00d").unwrap();
    /// assert_eq!(id.short(), "0badf00d");
    /// ```
    pub fn short(&self) -> String {
        format!("{:08x}", self.0 & 0xffff_ffff)
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

impl std::str::FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

/// Processing status of a source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceStatus {
    /// Registered, nothing extracted yet
    Registered,
    /// An extraction run is in progress
    Extracting,
    /// Fragments have been extracted and await review
    Extracted,
    /// At least one conversion has produced requirements
    Converted,
    /// The last run failed
    Failed,
}

impl SourceStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Registered => "registered",
            SourceStatus::Extracting => "extracting",
            SourceStatus::Extracted => "extracted",
            SourceStatus::Converted => "converted",
            SourceStatus::Failed => "failed",
        }
    }

    /// Parse a status from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "registered" => Some(SourceStatus::Registered),
            "extracting" => Some(SourceStatus::Extracting),
            "extracted" => Some(SourceStatus::Extracted),
            "converted" => Some(SourceStatus::Converted),
            "failed" => Some(SourceStatus::Failed),
            _ => None,
        }
    }
}

/// A regulatory text registered for extraction
///
/// Immutable once created except for `status` and its file attachments.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    /// Unique identifier
    pub id: SourceId,

    /// Issuing jurisdiction (e.g. "KZ", "US-NFPA")
    pub jurisdiction: String,

    /// Document code as printed on the cover (e.g. "SP RK 2.02-102-2022")
    pub code: String,

    /// Document title
    pub title: String,

    /// Edition date as printed, free form
    pub edition_date: Option<String>,

    /// Processing status
    pub status: SourceStatus,

    /// When the document was registered (timestamp)
    pub created_at: u64,
}

impl SourceDocument {
    /// Register a new source document
    pub fn new(
        jurisdiction: impl Into<String>,
        code: impl Into<String>,
        title: impl Into<String>,
        edition_date: Option<String>,
    ) -> Self {
        Self {
            id: SourceId::new(),
            jurisdiction: jurisdiction.into(),
            code: code.into(),
            title: title.into(),
            edition_date,
            status: SourceStatus::Registered,
            created_at: crate::current_timestamp(),
        }
    }

    /// Code of the auto requirement set for this document
    ///
    /// # Examples
    ///
    /// ```
    /// use normaudit_domain::{SourceDocument, SourceId};
    ///
    /// let mut doc = SourceDocument::new("KZ", "SP 1", "Fire alarm", None);
    /// doc.id = SourceId::from_string("0189a1b2-0000-7000-8000-00000badf00d").unwrap();
    /// assert_eq!(doc.auto_set_code(), "RS-0badf00d");
    /// ```
    pub fn auto_set_code(&self) -> String {
        format!("RS-{}", self.id.short())
    }
}

/// A binary file attached to a source document
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    /// Row identifier assigned by the store
    pub id: i64,

    /// Owning source document
    pub source_id: SourceId,

    /// Original file name
    pub filename: String,

    /// Raw bytes
    pub content: Vec<u8>,

    /// When the file was attached (timestamp)
    pub attached_at: u64,
}
