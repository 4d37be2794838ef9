//! Review gate error types

use normaudit_domain::{FragmentId, FragmentStatus};
use thiserror::Error;

/// Errors that can occur during review operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReviewError {
    /// The state machine does not allow the move; nothing was written
    #[error("Fragment {fragment} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Fragment
        fragment: FragmentId,
        /// Current status
        from: FragmentStatus,
        /// Requested status
        to: FragmentStatus,
    },

    /// Metadata of a terminal fragment is frozen
    #[error("Fragment {fragment} is {status} and can no longer be edited")]
    NotEditable {
        /// Fragment
        fragment: FragmentId,
        /// Current status
        status: FragmentStatus,
    },

    /// Unknown fragment
    #[error("Fragment not found: {0}")]
    NotFound(FragmentId),

    /// Reviewer name or patch rejected
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Store error
    #[error("Store error: {0}")]
    Store(String),
}
