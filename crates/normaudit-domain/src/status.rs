//! Fragment review status - the human-in-the-loop state machine

use std::fmt;

/// Review status of a raw fragment
///
/// Fragments move through the review gate before they can become requirements:
/// - Pending: freshly extracted, awaiting a reviewer
/// - Approved: accepted by a reviewer, waiting for conversion
/// - Rejected: discarded by a reviewer (terminal)
/// - Processed: consumed by the converter (terminal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentStatus {
    /// Awaiting review
    Pending,

    /// Accepted by a reviewer
    Approved,

    /// Discarded by a reviewer
    Rejected,

    /// Converted into a requirement
    Processed,
}

/// Attempted transition that the state machine does not allow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    /// Current status
    pub from: FragmentStatus,
    /// Requested status
    pub to: FragmentStatus,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot move fragment from {} to {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}

impl FragmentStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentStatus::Pending => "pending",
            FragmentStatus::Approved => "approved",
            FragmentStatus::Rejected => "rejected",
            FragmentStatus::Processed => "processed",
        }
    }

    /// Parse a status from a string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(FragmentStatus::Pending),
            "approved" => Some(FragmentStatus::Approved),
            "rejected" => Some(FragmentStatus::Rejected),
            "processed" => Some(FragmentStatus::Processed),
            _ => None,
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, FragmentStatus::Rejected | FragmentStatus::Processed)
    }

    /// Whether reviewer metadata (tags, check method) may still be edited
    pub fn allows_metadata_edit(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether `self -> next` is a legal transition
    ///
    /// # Examples
    ///
    /// ```
    /// use normaudit_domain::FragmentStatus;
    ///
    /// assert!(FragmentStatus::Pending.can_transition_to(FragmentStatus::Approved));
    /// assert!(!FragmentStatus::Pending.can_transition_to(FragmentStatus::Processed));
    /// assert!(!FragmentStatus::Rejected.can_transition_to(FragmentStatus::Approved));
    /// ```
    pub fn can_transition_to(&self, next: FragmentStatus) -> bool {
        matches!(
            (self, next),
            (FragmentStatus::Pending, FragmentStatus::Approved)
                | (FragmentStatus::Pending, FragmentStatus::Rejected)
                | (FragmentStatus::Approved, FragmentStatus::Processed)
        )
    }

    /// Validate `self -> next`, returning the target status on success
    pub fn transition(&self, next: FragmentStatus) -> Result<FragmentStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError { from: *self, to: next })
        }
    }
}

impl fmt::Display for FragmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FragmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid fragment status: {}", s))
    }
}
