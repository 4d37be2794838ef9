//! Controlled vocabularies shared by fragments and requirements
//!
//! Oracle output is free text; every field that feeds a closed vocabulary is
//! normalized here so the rest of the system only ever sees the enums.

/// Obligation strength of a normative clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    /// Mandatory ("must", "shall")
    Must,
    /// Prohibited ("must not", "is not permitted")
    MustNot,
    /// Recommended ("should")
    Should,
    /// Permitted ("may")
    May,
}

impl Modality {
    /// Get the modality name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Must => "must",
            Modality::MustNot => "must_not",
            Modality::Should => "should",
            Modality::May => "may",
        }
    }

    /// Parse a modality, accepting the common phrasings oracles return
    ///
    /// Anything outside the vocabulary yields `None`, which is stored as null.
    ///
    /// # Examples
    ///
    /// ```
    /// use normaudit_domain::Modality;
    ///
    /// assert_eq!(Modality::parse("shall"), Some(Modality::Must));
    /// assert_eq!(Modality::parse("Not permitted"), Some(Modality::MustNot));
    /// assert_eq!(Modality::parse("perhaps"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "must" | "shall" | "required" | "mandatory" | "is required" | "должен"
            | "должны" | "следует обеспечивать" => Some(Modality::Must),
            "must not" | "shall not" | "prohibited" | "forbidden" | "not permitted"
            | "not allowed" | "is not permitted" | "не допускается" | "запрещается" => {
                Some(Modality::MustNot)
            }
            "should" | "recommended" | "should be" | "рекомендуется" => Some(Modality::Should),
            "may" | "permitted" | "allowed" | "can" | "допускается" => Some(Modality::May),
            _ => None,
        }
    }
}

/// Predicted requirement type of a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequirementType {
    /// Physical construction of an element
    Constructive,
    /// Function a system must perform
    Functional,
    /// Carries a quantitative parameter
    Parameterized,
    /// Operation and maintenance duties
    Operational,
    /// Forbids something
    Prohibitive,
    /// Applies only under a stated condition
    Conditional,
    /// General statement with no finer type
    Base,
}

impl RequirementType {
    /// Get the type name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementType::Constructive => "constructive",
            RequirementType::Functional => "functional",
            RequirementType::Parameterized => "parameterized",
            RequirementType::Operational => "operational",
            RequirementType::Prohibitive => "prohibitive",
            RequirementType::Conditional => "conditional",
            RequirementType::Base => "base",
        }
    }

    /// Parse a type from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "constructive" => Some(RequirementType::Constructive),
            "functional" => Some(RequirementType::Functional),
            "parameterized" | "parametrized" | "parametric" => Some(RequirementType::Parameterized),
            "operational" => Some(RequirementType::Operational),
            "prohibitive" => Some(RequirementType::Prohibitive),
            "conditional" => Some(RequirementType::Conditional),
            "base" | "basic" | "general" => Some(RequirementType::Base),
            _ => None,
        }
    }

    /// Parse a type, falling back to `Base` for unknown values
    pub fn parse_or_base(s: &str) -> Self {
        Self::parse(s).unwrap_or(RequirementType::Base)
    }
}

/// How an inspector verifies a requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckMethod {
    /// Visual inspection
    Visual,
    /// Measurement with an instrument
    Measurement,
    /// Functional test
    Testing,
    /// Review of documentation
    Documentation,
}

impl CheckMethod {
    /// Get the check method name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckMethod::Visual => "visual",
            CheckMethod::Measurement => "measurement",
            CheckMethod::Testing => "testing",
            CheckMethod::Documentation => "documentation",
        }
    }

    /// Parse a check method from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "visual" | "inspection" => Some(CheckMethod::Visual),
            "measurement" | "measure" => Some(CheckMethod::Measurement),
            "testing" | "test" => Some(CheckMethod::Testing),
            "documentation" | "document" | "documents" => Some(CheckMethod::Documentation),
            _ => None,
        }
    }
}

impl std::str::FromStr for CheckMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid check method: {}", s))
    }
}

/// Canonical severity of a requirement violation
///
/// Two vocabularies reach the converter: `critical/major/minor` and
/// `CRITICAL/HIGH/MEDIUM/LOW`. Both collapse onto this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// Immediate danger to life
    Critical,
    /// Serious deficiency
    High,
    /// Deficiency to fix in the normal cycle
    Medium,
    /// Minor remark
    Low,
}

impl Severity {
    /// Get the canonical severity name
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }

    /// Parse either vocabulary into the canonical enum
    ///
    /// # Examples
    ///
    /// ```
    /// use normaudit_domain::Severity;
    ///
    /// assert_eq!(Severity::parse("major"), Some(Severity::High));
    /// assert_eq!(Severity::parse("minor"), Some(Severity::Low));
    /// assert_eq!(Severity::parse("MEDIUM"), Some(Severity::Medium));
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" | "major" => Some(Severity::High),
            "medium" | "moderate" => Some(Severity::Medium),
            "low" | "minor" => Some(Severity::Low),
            _ => None,
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid severity: {}", s))
    }
}
